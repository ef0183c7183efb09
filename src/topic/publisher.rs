//! Typed fixed-size topic publisher

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::Result;

use super::{config::TopicConfig, raw::RawPublisher};

/// Publishes values of a fixed-layout type `T` on a named topic.
///
/// The `Pod` bound restricts payloads to standard-layout types that can be
/// copied into shared memory byte-for-byte. The segment is created on first
/// connect and deliberately survives the publisher: a restarted process
/// picks up the same ring, so subscribers keep their last value across the
/// gap.
///
/// Single-publisher-per-topic is the supported mode; multiple publishers on
/// one name are best-effort.
#[derive(Debug)]
pub struct Publisher<T: Pod> {
    raw: RawPublisher,
    _payload: PhantomData<T>,
}

impl<T: Pod> Publisher<T> {
    /// Create a publisher with the default configuration (3 slots, world
    /// read/write)
    pub fn new(name: &str) -> Result<Self> {
        Self::with_config(name, &TopicConfig::default())
    }

    /// Create a publisher with explicit slot count and permissions.
    ///
    /// Fails with a configuration error when the named segment already
    /// exists with a different element size or slot count.
    pub fn with_config(name: &str, config: &TopicConfig) -> Result<Self> {
        let raw = RawPublisher::new(
            name,
            std::mem::size_of::<T>(),
            config.slot_count,
            config.permission,
        )?;
        Ok(Self {
            raw,
            _payload: PhantomData,
        })
    }

    /// Copy `value` into the oldest slot and make it the newest
    pub fn publish(&mut self, value: &T) -> Result<()> {
        self.raw.publish(bytemuck::bytes_of(value))
    }

    /// Number of slots in the ring
    pub fn slot_count(&self) -> usize {
        self.raw.slot_count()
    }

    /// Remove the topic's segment from the host namespace on the way out
    pub fn disconnect_and_unlink(&mut self) -> Result<()> {
        self.raw.disconnect_and_unlink()
    }
}
