//! Concurrent stress tests for high-contention scenarios
//! Focused on claim exclusivity, payload integrity and wakeup delivery

mod common;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use bytemuck::{Pod, Zeroable};
use common::ScopedName;
use shmbus::{
    sync::monotonic_now_us, Permission, Publisher, RingBuffer, Segment, SegmentConfig,
    ServiceClient, ServiceServer, Subscriber, TIMESTAMP_WRITING,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct SequencedPair {
    seq: u64,
    check: u64,
}

const CHECK_FACTOR: u64 = 0x9E37_79B9;

/// Every thread gets its own view of the same ring, like independent
/// processes would; a claim must grant exclusive write access.
#[test]
fn stress_claim_exclusivity_across_views() {
    let name = ScopedName::new("stress_claim");
    let element_size = 64usize;
    let slot_count = 3usize;
    let size = RingBuffer::size_for(element_size, slot_count);
    let segment = Segment::open(
        name.as_str(),
        SegmentConfig::writer(Permission::default()),
        size,
    )
    .unwrap();
    let base = unsafe { segment.as_base_ptr() }.unwrap();
    let _ring = unsafe { RingBuffer::init_writer(base, segment.size(), element_size, slot_count) }
        .unwrap();

    let thread_count = 4;
    let iterations = 200;
    let barrier = Arc::new(Barrier::new(thread_count));
    let violations = Arc::new(AtomicUsize::new(0));
    let claims = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..thread_count)
        .map(|worker| {
            let topic = name.0.clone();
            let barrier = Arc::clone(&barrier);
            let violations = Arc::clone(&violations);
            let claims = Arc::clone(&claims);
            thread::spawn(move || {
                let view_segment =
                    Segment::open(&topic, SegmentConfig::reader(), 0).unwrap();
                let view_base = unsafe { view_segment.as_base_ptr() }.unwrap();
                let ring = unsafe {
                    RingBuffer::attach_reader(view_base, view_segment.size()).unwrap()
                };

                let pattern = [worker as u8 + 1; 64];
                barrier.wait();
                for _ in 0..iterations {
                    let index = ring.oldest_slot();
                    if !ring.claim_slot(index) {
                        continue;
                    }
                    claims.fetch_add(1, Ordering::Relaxed);
                    ring.write_slot(index, &pattern);
                    // While the claim is held the slot must stay ours
                    if ring.slot_timestamp(index) != TIMESTAMP_WRITING {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    let mut readback = [0u8; 64];
                    ring.read_slot(index, &mut readback);
                    if readback != pattern {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    ring.publish_slot(index, monotonic_now_us());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(violations.load(Ordering::Relaxed), 0);
    assert!(claims.load(Ordering::Relaxed) > 0);
}

/// One publisher, several subscribers: every successfully subscribed pair
/// must satisfy the publisher's invariant, proving no torn payloads reach
/// the application.
#[test]
fn stress_subscriber_payload_integrity() {
    let name = ScopedName::new("stress_integrity");
    let mut publisher = Publisher::<SequencedPair>::new(name.as_str()).unwrap();
    // Attach readers before the stream starts
    publisher
        .publish(&SequencedPair {
            seq: 0,
            check: 0,
        })
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let topic = name.0.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut subscriber = Subscriber::<SequencedPair>::new(&topic).unwrap();
                let mut observed = 0u64;
                let mut corrupt = 0u64;
                while !stop.load(Ordering::Acquire) {
                    let (pair, ok) = subscriber.subscribe();
                    if ok {
                        observed += 1;
                        if pair.check != pair.seq.wrapping_mul(CHECK_FACTOR) {
                            corrupt += 1;
                        }
                    }
                }
                (observed, corrupt)
            })
        })
        .collect();

    for seq in 1..=500u64 {
        publisher
            .publish(&SequencedPair {
                seq,
                check: seq.wrapping_mul(CHECK_FACTOR),
            })
            .unwrap();
        thread::sleep(Duration::from_micros(100));
    }
    stop.store(true, Ordering::Release);

    for reader in readers {
        let (observed, corrupt) = reader.join().unwrap();
        assert!(observed > 0, "reader never saw a value");
        assert_eq!(corrupt, 0, "reader observed torn payloads");
    }
}

/// Concurrent clients share one serialized server. Responses are unordered
/// across clients but every returned value must be a response the handler
/// actually produced.
#[test]
fn stress_concurrent_service_clients() {
    let name = ScopedName::new("stress_service");
    let _server = ServiceServer::<u64, u64>::new(name.as_str(), |x| x * 2).unwrap();

    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let topic = name.0.clone();
            thread::spawn(move || {
                let mut client = ServiceClient::<u64, u64>::new(&topic).unwrap();
                let base = (worker as u64 + 1) * 1_000;
                let mut answered = 0;
                for offset in 0..20u64 {
                    if let Ok(response) = client.call(&(base + offset), 1_000_000) {
                        // Unordered across clients, but always a doubled input
                        assert_eq!(response % 2, 0);
                        assert!(response >= 2_000);
                        answered += 1;
                    }
                }
                answered
            })
        })
        .collect();

    let mut total = 0;
    for worker in workers {
        total += worker.join().unwrap();
    }
    assert!(total > 0, "no call ever completed");
}

/// Subscribers that are already blocked on the condvar when a publish lands
/// must all wake and observe the value.
#[test]
fn stress_broadcast_reaches_every_waiter() {
    let name = ScopedName::new("stress_broadcast");
    let mut publisher = Publisher::<u64>::new(name.as_str()).unwrap();

    let waiter_count = 4;
    let ready = Arc::new(Barrier::new(waiter_count + 1));
    let waiters: Vec<_> = (0..waiter_count)
        .map(|_| {
            let topic = name.0.clone();
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                let mut subscriber = Subscriber::<u64>::new(&topic).unwrap();
                // Attach and record the current edge before the publish
                let _ = subscriber.subscribe();
                ready.wait();
                if !subscriber.wait_for_update(2_000_000) {
                    return None;
                }
                let (value, ok) = subscriber.subscribe();
                ok.then_some(value)
            })
        })
        .collect();

    ready.wait();
    thread::sleep(Duration::from_millis(50));
    publisher.publish(&4242).unwrap();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Some(4242));
    }
}
