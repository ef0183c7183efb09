//! # shmbus - Shared-Memory IPC Substrate
//!
//! shmbus is an inter-process communication substrate built on POSIX shared
//! memory, for local low-latency message exchange between cooperating
//! processes on one host. Three patterns share one memory discipline:
//!
//! - **Topics**: many-to-many publish/subscribe, lossy latest-value with a
//!   small slot history
//! - **Services**: synchronous request/response with a server-side dispatch
//!   thread
//! - **Actions**: long-running goals with lossy feedback, cooperative
//!   preemption and a final result
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Topic          Service          Action          │
//! │  Publisher/Subscriber ServiceServer/  ActionServer/    │
//! │  VecPublisher/...     ServiceClient   ActionClient     │
//! ├────────────────────────────────────────────────────────┤
//! │  RingBuffer (slot carousel, claim/publish protocol)    │
//! │  ServiceChannel / ActionChannel (two-slot handshakes)  │
//! ├────────────────────────────────────────────────────────┤
//! │  Segment (shm_open/mmap)   Layout (aligned offsets)    │
//! │  SharedCondPair (process-shared mutex + condvar)       │
//! └────────────────────────────────────────────────────────┘
//!           │
//!           ▼
//! ┌─────────────────┐
//! │   C API Layer   │  (feature "c-api")
//! └─────────────────┘
//! ```
//!
//! Segments are named objects in the host namespace that deliberately
//! survive process restarts; destruction is always explicit. Payload types
//! are restricted to [`bytemuck::Pod`] so a slot copy is a byte copy.

pub mod action;
pub mod error;
pub mod layout;
pub mod ring;
pub mod segment;
pub mod service;
pub mod sync;
pub mod topic;

#[cfg(feature = "c-api")]
pub mod ffi;

// Main API re-exports
pub use action::{ActionClient, ActionServer, ActionStatus};
pub use error::{Result, ShmError};
pub use ring::{RingBuffer, RingLayout, DEFAULT_EXPIRY_US, TIMESTAMP_WRITING};
pub use segment::{segment_exists, unlink_by_name, Permission, Segment, SegmentConfig};
pub use service::{ServiceClient, ServiceServer};
pub use topic::{Publisher, Subscriber, TopicConfig, VecPublisher, VecSubscriber};
