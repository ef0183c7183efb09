//! Integration tests for the action state machine

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::ScopedName;
use shmbus::{ActionClient, ActionServer, ActionStatus};

#[test]
fn test_goal_to_succeeded() {
    let name = ScopedName::new("act_success");
    let mut server = ActionServer::<i32, i32, f32>::new(name.as_str()).unwrap();
    let mut client = ActionClient::<i32, i32, f32>::new(name.as_str()).unwrap();

    assert_eq!(client.status(), Some(ActionStatus::Succeeded));

    let worker = thread::spawn(move || {
        server.wait_new_goal_available();
        let goal = server.accept_new_goal();
        assert_eq!(server.status(), ActionStatus::Active);
        server.publish_result(&(goal * goal));
        server
    });

    assert!(client.send_goal(&9));
    assert!(client.wait_for_result(2_000_000));
    assert_eq!(client.status(), Some(ActionStatus::Succeeded));
    assert_eq!(client.result(), Some(81));
    worker.join().unwrap();
}

#[test]
fn test_feedback_stream_and_preemption() {
    let name = ScopedName::new("act_preempt");
    let mut server = ActionServer::<i32, i32, f64>::new(name.as_str()).unwrap();
    let mut client = ActionClient::<i32, i32, f64>::new(name.as_str()).unwrap();

    let worker = thread::spawn(move || {
        server.wait_new_goal_available();
        let goal = server.accept_new_goal();
        assert_eq!(goal, 3);
        // Stream feedback at 100 ms intervals, honoring a preempt between
        // steps
        let mut progress = 0.0f64;
        loop {
            if server.is_preempt_requested() {
                server.set_preempted();
                break;
            }
            server.publish_feedback(&progress);
            progress += 0.1;
            thread::sleep(Duration::from_millis(100));
        }
        server
    });

    assert!(client.send_goal(&3));

    thread::sleep(Duration::from_millis(250));
    let feedback = client.feedback().unwrap();
    assert!((0.0..=0.3).contains(&feedback));

    let cancel_at = Instant::now();
    client.cancel_goal();
    assert!(client.wait_for_result(2_000_000));
    // The server checks between 100 ms feedback steps; the transition must
    // land well within 150 ms of the next check
    assert!(cancel_at.elapsed() < Duration::from_millis(250));
    assert_eq!(client.status(), Some(ActionStatus::Preempted));
    worker.join().unwrap();
}

#[test]
fn test_reject_goal() {
    let name = ScopedName::new("act_reject");
    let mut server = ActionServer::<i32, i32, f32>::new(name.as_str()).unwrap();
    let mut client = ActionClient::<i32, i32, f32>::new(name.as_str()).unwrap();

    let worker = thread::spawn(move || {
        server.wait_new_goal_available();
        server.reject_new_goal();
        server
    });

    assert!(client.send_goal(&-1));
    // Rejection broadcasts the result condvar without advancing the result
    // timestamp; the status is the observable outcome
    let deadline = Instant::now() + Duration::from_secs(2);
    while client.status() != Some(ActionStatus::Rejected) {
        assert!(Instant::now() < deadline, "goal was never rejected");
        thread::sleep(Duration::from_millis(5));
    }
    worker.join().unwrap();
}

#[test]
fn test_cancel_before_accept_is_a_no_op() {
    let name = ScopedName::new("act_cancel_early");
    let mut server = ActionServer::<i32, i32, f32>::new(name.as_str()).unwrap();
    let mut client = ActionClient::<i32, i32, f32>::new(name.as_str()).unwrap();

    // Cancel lands before any goal was accepted
    client.cancel_goal();
    thread::sleep(Duration::from_millis(5));

    let worker = thread::spawn(move || {
        server.wait_new_goal_available();
        let _goal = server.accept_new_goal();
        // The stale cancel must not preempt the goal just accepted
        let preempted = server.is_preempt_requested();
        server.publish_result(&42);
        (server, preempted)
    });

    assert!(client.send_goal(&1));
    assert!(client.wait_for_result(2_000_000));
    let (_server, preempted) = worker.join().unwrap();
    assert!(!preempted);
    assert_eq!(client.status(), Some(ActionStatus::Succeeded));
    assert_eq!(client.result(), Some(42));
}

#[test]
fn test_wait_for_server_polls_until_present() {
    let name = ScopedName::new("act_wait_server");
    let topic = name.0.clone();

    let client_thread = thread::spawn(move || {
        let mut client = ActionClient::<i32, i32, f32>::new(&topic).unwrap();
        assert!(!client.is_server_connected());
        client.wait_for_server(2_000_000)
    });

    thread::sleep(Duration::from_millis(50));
    let _server = ActionServer::<i32, i32, f32>::new(name.as_str()).unwrap();
    assert!(client_thread.join().unwrap());
}

#[test]
fn test_second_goal_after_success() {
    let name = ScopedName::new("act_second_goal");
    let mut server = ActionServer::<i32, i32, f32>::new(name.as_str()).unwrap();
    let mut client = ActionClient::<i32, i32, f32>::new(name.as_str()).unwrap();

    let worker = thread::spawn(move || {
        for _ in 0..2 {
            server.wait_new_goal_available();
            let goal = server.accept_new_goal();
            server.publish_result(&(goal + 1));
        }
        server
    });

    assert!(client.send_goal(&10));
    assert!(client.wait_for_result(2_000_000));
    assert_eq!(client.result(), Some(11));

    assert!(client.send_goal(&20));
    assert!(client.wait_for_result(2_000_000));
    assert_eq!(client.result(), Some(21));
    worker.join().unwrap();
}
