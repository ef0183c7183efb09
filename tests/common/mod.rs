//! Shared helpers for the integration suites

use shmbus::unlink_by_name;

/// A test-scoped topic name, unique per process, unlinked on drop so a
/// failed assertion does not leak segments into the host namespace.
pub struct ScopedName(pub String);

impl ScopedName {
    pub fn new(tag: &str) -> Self {
        let name = format!("/shmbus_test/{}_{}", tag, std::process::id());
        // A stale segment from a previous crashed run must not leak into
        // this one
        let _ = unlink_by_name(&name);
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for ScopedName {
    fn drop(&mut self) {
        let _ = unlink_by_name(&self.0);
    }
}
