use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmbus::{
    sync::monotonic_now_us, Permission, Publisher, RingBuffer, RingLayout, Segment, SegmentConfig,
    Subscriber, TopicConfig,
};

fn bench_name(tag: &str) -> String {
    format!("/shmbus_bench_{}_{}", tag, std::process::id())
}

fn benchmark_publish_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("Topic_Publish");

    for payload_words in [1usize, 16, 128].iter() {
        group.throughput(Throughput::Bytes((payload_words * 8) as u64));
        group.bench_with_input(
            BenchmarkId::new("publish_u64_words", payload_words),
            payload_words,
            |b, &payload_words| {
                let name = bench_name(&format!("pub{}", payload_words));
                match payload_words {
                    1 => {
                        let mut publisher = Publisher::<u64>::new(&name).unwrap();
                        let mut value = 0u64;
                        b.iter(|| {
                            value = value.wrapping_add(1);
                            publisher.publish(&value).unwrap();
                        });
                    }
                    16 => {
                        let mut publisher = Publisher::<[u64; 16]>::new(&name).unwrap();
                        let payload = [7u64; 16];
                        b.iter(|| publisher.publish(&payload).unwrap());
                    }
                    _ => {
                        let mut publisher = Publisher::<[u64; 128]>::new(&name).unwrap();
                        let payload = [7u64; 128];
                        b.iter(|| publisher.publish(&payload).unwrap());
                    }
                }
                let _ = shmbus::unlink_by_name(&name);
            },
        );
    }
    group.finish();
}

fn benchmark_publish_subscribe_roundtrip(c: &mut Criterion) {
    let name = bench_name("roundtrip");
    let mut publisher = Publisher::<u64>::new(&name).unwrap();
    let mut subscriber = Subscriber::<u64>::new(&name).unwrap();
    subscriber.set_expiry_us(0);

    c.bench_function("Topic_publish_then_subscribe", |b| {
        let mut value = 0u64;
        b.iter(|| {
            value = value.wrapping_add(1);
            publisher.publish(&value).unwrap();
            let (seen, ok) = subscriber.subscribe();
            assert!(ok);
            assert_eq!(seen, value);
        });
    });
    let _ = shmbus::unlink_by_name(&name);
}

fn benchmark_ring_claim_publish(c: &mut Criterion) {
    let name = bench_name("ring");
    let size = RingBuffer::size_for(64, 3);
    let segment = Segment::open(&name, SegmentConfig::writer(Permission::default()), size).unwrap();
    let base = unsafe { segment.as_base_ptr() }.unwrap();
    let ring = unsafe { RingBuffer::init_writer(base, segment.size(), 64, 3).unwrap() };
    let payload = [0u8; 64];

    c.bench_function("Ring_claim_write_publish", |b| {
        b.iter(|| {
            let index = ring.claim_oldest().unwrap();
            ring.write_slot(index, &payload);
            ring.publish_slot(index, monotonic_now_us());
        });
    });
    drop(segment);
    let _ = shmbus::unlink_by_name(&name);
}

fn benchmark_layout_compute(c: &mut Criterion) {
    c.bench_function("RingLayout_compute", |b| {
        b.iter(|| criterion::black_box(RingLayout::compute(criterion::black_box(4096), 3)));
    });
}

fn benchmark_slot_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("Topic_SlotCounts");
    for slot_count in [1usize, 3, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("publish_u64", slot_count),
            slot_count,
            |b, &slot_count| {
                let name = bench_name(&format!("slots{}", slot_count));
                let config = TopicConfig::default().with_slot_count(slot_count);
                let mut publisher = Publisher::<u64>::with_config(&name, &config).unwrap();
                let mut value = 0u64;
                b.iter(|| {
                    value = value.wrapping_add(1);
                    publisher.publish(&value).unwrap();
                });
                let _ = shmbus::unlink_by_name(&name);
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_publish_throughput,
    benchmark_publish_subscribe_roundtrip,
    benchmark_ring_claim_publish,
    benchmark_layout_compute,
    benchmark_slot_counts,
);
criterion_main!(benches);
