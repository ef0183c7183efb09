//! Typed fixed-size topic subscriber

use bytemuck::{Pod, Zeroable};

use crate::error::Result;

use super::raw::RawSubscriber;

/// Reads the latest value of type `T` from a named topic.
///
/// Construction never touches the host namespace; the segment is attached
/// on the first subscribe, wait or probe, and re-attached whenever the
/// publisher re-creates it. A failed subscribe replays the last value seen
/// (zeroed before anything was ever received) with the success flag false,
/// never a torn payload.
#[derive(Debug)]
pub struct Subscriber<T: Pod> {
    raw: RawSubscriber,
    last_value: T,
}

impl<T: Pod> Subscriber<T> {
    /// Build a subscriber for `name`
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            raw: RawSubscriber::new(name)?,
            last_value: T::zeroed(),
        })
    }

    /// Copy out the newest value.
    ///
    /// Returns `(value, true)` on success. On failure (no publisher, no
    /// valid slot, data expired) returns `(last value, false)`.
    pub fn subscribe(&mut self) -> (T, bool) {
        let mut value = self.last_value;
        let ok = self.raw.subscribe_into(bytemuck::bytes_of_mut(&mut value));
        if ok {
            self.last_value = value;
        }
        (value, ok)
    }

    /// Block until the topic is updated or `timeout_us` elapses; `true`
    /// when an update arrived
    pub fn wait_for_update(&mut self, timeout_us: u64) -> bool {
        self.raw.wait_for_update(timeout_us)
    }

    /// Configure the staleness cutoff in microseconds (0 disables)
    pub fn set_expiry_us(&mut self, expiry_us: u64) {
        self.raw.set_expiry_us(expiry_us);
    }

    /// True while no live segment is attached
    pub fn is_disconnected(&self) -> bool {
        self.raw.is_disconnected()
    }
}
