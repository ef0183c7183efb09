//! Fixed-slot ring buffer over a shared segment
//!
//! The ring is a carousel of `slot_count` payload slots, each guarded by a
//! single atomic `u64` timestamp that triple-encodes slot state: `0` means
//! never written, `u64::MAX` means a write is in progress, anything else is
//! the publish time in microseconds on the monotonic clock. Writers claim
//! the oldest slot with one compare-and-swap; readers pick the newest valid
//! slot and are woken through a process-shared condition variable.

pub mod buffer;
pub mod layout;

pub use buffer::{RingBuffer, DEFAULT_EXPIRY_US, TIMESTAMP_WRITING};
pub use layout::RingLayout;
