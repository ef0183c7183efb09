//! Configuration for opening shared-memory segments

use serde::{Deserialize, Serialize};

use super::name::Permission;

/// Open-time options for a [`super::Segment`].
///
/// Write-side handles create lazily with a requested size; read-side handles
/// open whatever exists and adopt its size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Create the object if it does not exist
    pub create: bool,
    /// Permission bits applied on creation
    pub permission: Permission,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            create: false,
            permission: Permission::empty(),
        }
    }
}

impl SegmentConfig {
    /// Read-side options: open existing, no permission bits needed
    pub fn reader() -> Self {
        Self::default()
    }

    /// Write-side options: create with the given permission bits
    pub fn writer(permission: Permission) -> Self {
        Self {
            create: true,
            permission,
        }
    }

    /// Set whether to create the object if it doesn't exist
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Set the permission bits applied on creation
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let cfg = SegmentConfig::writer(Permission::default());
        assert!(cfg.create);
        assert_eq!(cfg.permission.mode(), 0o666);

        let cfg = SegmentConfig::reader().with_create(true);
        assert!(cfg.create);
        assert_eq!(cfg.permission.mode(), 0);
    }
}
