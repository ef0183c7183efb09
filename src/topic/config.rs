//! Topic configuration

use serde::{Deserialize, Serialize};

use crate::{ring::DEFAULT_EXPIRY_US, segment::Permission};

/// Default number of slots per topic.
///
/// Three is the recommended minimum: one slot may be stuck mid-write after a
/// writer crash and one may be mid-read, leaving one usable.
pub const DEFAULT_SLOT_COUNT: usize = 3;

/// Tuning knobs shared by publishers and subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Number of payload slots in the ring
    pub slot_count: usize,
    /// Permission bits applied when the publisher creates the segment
    pub permission: Permission,
    /// Staleness cutoff applied by subscribers, in microseconds; 0 disables
    pub expiry_us: u64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            permission: Permission::default(),
            expiry_us: DEFAULT_EXPIRY_US,
        }
    }
}

impl TopicConfig {
    /// Set the number of payload slots
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Set the creation permission bits
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Set the subscriber staleness cutoff (0 disables)
    pub fn with_expiry_us(mut self, expiry_us: u64) -> Self {
        self.expiry_us = expiry_us;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TopicConfig::default();
        assert_eq!(config.slot_count, 3);
        assert_eq!(config.permission.mode(), 0o666);
        assert_eq!(config.expiry_us, DEFAULT_EXPIRY_US);
    }

    #[test]
    fn test_builder() {
        let config = TopicConfig::default()
            .with_slot_count(5)
            .with_expiry_us(0);
        assert_eq!(config.slot_count, 5);
        assert_eq!(config.expiry_us, 0);
    }
}
