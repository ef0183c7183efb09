//! Publish/subscribe topics over ring segments
//!
//! Topics are lossy latest-value channels: a publisher overwrites the slot
//! with the oldest timestamp, subscribers read the newest valid slot.
//! Fixed-size payloads go through [`Publisher`]/[`Subscriber`]; sequences
//! with a run-time length go through [`VecPublisher`]/[`VecSubscriber`].

pub mod config;
pub mod publisher;
pub mod raw;
pub mod subscriber;
pub mod vector;

pub use config::TopicConfig;
pub use publisher::Publisher;
pub use raw::{RawPublisher, RawSubscriber};
pub use subscriber::Subscriber;
pub use vector::{VecPublisher, VecSubscriber};
