//! Error types and handling for shmbus

/// Result type alias for shmbus operations
pub type Result<T> = std::result::Result<T, ShmError>;

/// Error taxonomy for the shared-memory substrate
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    /// Invalid handle configuration (empty name, geometry mismatch, ...).
    /// Fatal to the handle; the caller must rebuild it.
    #[error("Configuration error: {parameter} - {message}")]
    Config { parameter: String, message: String },

    /// The named object could not be opened, created, resized or mapped.
    /// Transient from the caller's point of view; a retry may succeed.
    #[error("Segment error: {message}")]
    Segment {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The segment header did not become initialized within the deadline
    #[error("Initialization timeout after {timeout_us} us on '{name}'")]
    InitTimeout { name: String, timeout_us: u64 },

    /// No slot currently holds valid data
    #[error("No current data")]
    NoData,

    /// The newest slot is older than the configured expiry
    #[error("Newest data expired (older than {expiry_us} us)")]
    Expired { expiry_us: u64 },

    /// A service or action deadline elapsed without a response
    #[error("Call timed out after {timeout_us} us")]
    CallTimeout { timeout_us: u64 },

    /// The peer is gone or the segment was unlinked underneath us
    #[error("Not connected: {message}")]
    NotConnected { message: String },

    /// Host primitive failure (pthread init, clock, ...)
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl ShmError {
    /// Create a configuration error
    pub fn config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a segment error from a standard I/O error
    pub fn segment_io(source: std::io::Error, context: &str) -> Self {
        Self::Segment {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a segment error without an underlying I/O error
    pub fn segment(message: impl Into<String>) -> Self {
        Self::Segment {
            message: message.into(),
            source: None,
        }
    }

    /// Create an initialization timeout error
    pub fn init_timeout(name: impl Into<String>, timeout_us: u64) -> Self {
        Self::InitTimeout {
            name: name.into(),
            timeout_us,
        }
    }

    /// Create a call timeout error
    pub fn call_timeout(timeout_us: u64) -> Self {
        Self::CallTimeout { timeout_us }
    }

    /// Create a not-connected error
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// True for conditions the caller is expected to retry (no data yet,
    /// expired data, timeouts, lost peers); false for configuration errors
    /// that terminate the handle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Segment { .. }
                | Self::InitTimeout { .. }
                | Self::NoData
                | Self::Expired { .. }
                | Self::CallTimeout { .. }
                | Self::NotConnected { .. }
        )
    }
}

impl From<std::io::Error> for ShmError {
    fn from(err: std::io::Error) -> Self {
        Self::segment_io(err, "I/O operation failed")
    }
}

impl From<nix::errno::Errno> for ShmError {
    fn from(err: nix::errno::Errno) -> Self {
        Self::segment_io(std::io::Error::from(err), "System call failed")
    }
}
