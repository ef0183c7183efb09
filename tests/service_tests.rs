//! Integration tests for request/response services

mod common;

use std::time::{Duration, Instant};

use common::ScopedName;
use shmbus::{ServiceClient, ServiceServer, ShmError};

#[test]
fn test_multiply_service_in_order() {
    let name = ScopedName::new("srv_multiply");
    let _server = ServiceServer::<i32, i32>::new(name.as_str(), |x| x * 2).unwrap();
    let mut client = ServiceClient::<i32, i32>::new(name.as_str()).unwrap();

    for request in 1..=5i32 {
        let started = Instant::now();
        let response = client.call(&request, 1_000_000).unwrap();
        assert_eq!(response, request * 2);
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "call took {:?}",
            started.elapsed()
        );
    }
}

#[test]
fn test_call_without_server_fails_fast() {
    let name = ScopedName::new("srv_absent");
    let mut client = ServiceClient::<i32, i32>::new(name.as_str()).unwrap();
    let result = client.call(&1, 50_000);
    assert!(matches!(
        result,
        Err(ShmError::Segment { .. }) | Err(ShmError::NotConnected { .. })
    ));
}

#[test]
fn test_abandoned_call_response_is_read_by_the_next_call() {
    let name = ScopedName::new("srv_slow");
    let _server = ServiceServer::<u64, u64>::new(name.as_str(), |x| {
        std::thread::sleep(Duration::from_millis(60));
        x + 1
    })
    .unwrap();
    let mut client = ServiceClient::<u64, u64>::new(name.as_str()).unwrap();

    // Deadline shorter than the handler's work
    let result = client.call(&7, 10_000);
    assert!(matches!(result, Err(ShmError::CallTimeout { .. })));

    // Let the abandoned request's response land in the segment
    std::thread::sleep(Duration::from_millis(100));

    // The service offers no per-call correlation: the next call picks up
    // the straggler response, and the call after that sees its successor
    let response = client.call(&10, 1_000_000).unwrap();
    assert_eq!(response, 8);
    let response = client.call(&12, 1_000_000).unwrap();
    assert_eq!(response, 11);
}

#[test]
fn test_two_clients_share_one_server() {
    let name = ScopedName::new("srv_two_clients");
    let _server = ServiceServer::<i32, i32>::new(name.as_str(), |x| -x).unwrap();

    let mut first = ServiceClient::<i32, i32>::new(name.as_str()).unwrap();
    let mut second = ServiceClient::<i32, i32>::new(name.as_str()).unwrap();

    assert_eq!(first.call(&4, 1_000_000).unwrap(), -4);
    assert_eq!(second.call(&9, 1_000_000).unwrap(), -9);
    assert_eq!(first.call(&13, 1_000_000).unwrap(), -13);
}

#[test]
fn test_server_shutdown_is_clean() {
    let name = ScopedName::new("srv_shutdown");
    {
        let _server = ServiceServer::<i32, i32>::new(name.as_str(), |x| x).unwrap();
        // Drop without ever receiving a call; the dispatch thread must join
    }
    // The segment survives the server; a new server reuses it
    let _server = ServiceServer::<i32, i32>::new(name.as_str(), |x| x + 100).unwrap();
    let mut client = ServiceClient::<i32, i32>::new(name.as_str()).unwrap();
    assert_eq!(client.call(&1, 1_000_000).unwrap(), 101);
}

#[test]
fn test_struct_payloads() {
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct PlanRequest {
        start: [f64; 2],
        goal: [f64; 2],
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct PlanResponse {
        length: f64,
        feasible: u32,
        _pad: u32,
    }

    let name = ScopedName::new("srv_struct");
    let _server = ServiceServer::<PlanRequest, PlanResponse>::new(name.as_str(), |req| {
        let dx = req.goal[0] - req.start[0];
        let dy = req.goal[1] - req.start[1];
        PlanResponse {
            length: (dx * dx + dy * dy).sqrt(),
            feasible: 1,
            _pad: 0,
        }
    })
    .unwrap();

    let mut client = ServiceClient::<PlanRequest, PlanResponse>::new(name.as_str()).unwrap();
    let response = client
        .call(
            &PlanRequest {
                start: [0.0, 0.0],
                goal: [3.0, 4.0],
            },
            1_000_000,
        )
        .unwrap();
    assert_eq!(response.length, 5.0);
    assert_eq!(response.feasible, 1);
}
