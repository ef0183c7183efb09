//! Variable-length topic endpoints
//!
//! The element size of a vector topic is `len * size_of::<T>()`. A length
//! change is a re-creation event: the publisher unlinks the segment and
//! builds a fresh one at the new size, and subscribers re-attach through
//! their disconnect probe. Callers should treat every length change as a
//! restart of the topic.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::error::Result;

use super::{config::TopicConfig, raw::{RawPublisher, RawSubscriber}};

/// Publishes `Vec<T>` payloads on a named topic
#[derive(Debug)]
pub struct VecPublisher<T: Pod> {
    raw: RawPublisher,
    _payload: PhantomData<T>,
}

impl<T: Pod> VecPublisher<T> {
    /// Create a vector publisher with the default configuration
    pub fn new(name: &str) -> Result<Self> {
        Self::with_config(name, &TopicConfig::default())
    }

    /// Create a vector publisher with explicit slot count and permissions.
    ///
    /// An existing segment is adopted at whatever element size it carries;
    /// the next publish resizes it if the length differs.
    pub fn with_config(name: &str, config: &TopicConfig) -> Result<Self> {
        let raw = RawPublisher::new_adopting(name, 0, config.slot_count, config.permission)?;
        Ok(Self {
            raw,
            _payload: PhantomData,
        })
    }

    /// Publish one sequence, re-creating the segment first when its length
    /// differs from the allocated element size. Empty sequences are valid.
    pub fn publish(&mut self, data: &[T]) -> Result<()> {
        let needed = std::mem::size_of_val(data);
        if needed != self.raw.element_size() {
            self.raw.recreate(needed)?;
        }
        self.raw.publish(bytemuck::cast_slice(data))
    }

    /// Length currently allocated per slot, in elements
    pub fn allocated_len(&self) -> usize {
        let elem = std::mem::size_of::<T>();
        if elem == 0 {
            0
        } else {
            self.raw.element_size() / elem
        }
    }

    /// Remove the topic's segment from the host namespace on the way out
    pub fn disconnect_and_unlink(&mut self) -> Result<()> {
        self.raw.disconnect_and_unlink()
    }
}

/// Reads the latest `Vec<T>` from a named topic
#[derive(Debug)]
pub struct VecSubscriber<T: Pod> {
    raw: RawSubscriber,
    last_value: Vec<T>,
}

impl<T: Pod> VecSubscriber<T> {
    /// Build a subscriber for `name`; the segment is attached lazily
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            raw: RawSubscriber::new(name)?,
            last_value: Vec::new(),
        })
    }

    /// Copy out the newest sequence.
    ///
    /// The length is recovered from the segment header, so a subscriber
    /// follows the publisher through destructive resizes. On failure the
    /// last sequence seen comes back with the success flag false.
    pub fn subscribe(&mut self) -> (Vec<T>, bool) {
        let elem_bytes = std::mem::size_of::<T>();
        let element_size = match self.raw.element_size() {
            Ok(size) => size,
            Err(_) => return (self.last_value.clone(), false),
        };
        if elem_bytes == 0 || element_size % elem_bytes != 0 {
            return (self.last_value.clone(), false);
        }

        let mut value = vec![T::zeroed(); element_size / elem_bytes];
        let ok = self.raw.subscribe_into(bytemuck::cast_slice_mut(&mut value));
        if ok {
            self.last_value = value.clone();
            (value, true)
        } else {
            (self.last_value.clone(), false)
        }
    }

    /// Block until the topic is updated or `timeout_us` elapses
    pub fn wait_for_update(&mut self, timeout_us: u64) -> bool {
        self.raw.wait_for_update(timeout_us)
    }

    /// Configure the staleness cutoff in microseconds (0 disables)
    pub fn set_expiry_us(&mut self, expiry_us: u64) {
        self.raw.set_expiry_us(expiry_us);
    }
}
