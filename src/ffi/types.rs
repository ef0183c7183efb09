//! FFI type definitions and handle types

use std::ffi::c_void;

use crate::error::ShmError;

/// Opaque handle types for the C API
pub type ShmSegmentHandle = *mut c_void;
pub type ShmRingHandle = *mut c_void;
pub type ShmPublisherHandle = *mut c_void;
pub type ShmSubscriberHandle = *mut c_void;

/// Error codes for the C API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmBusErrorCode {
    Success = 0,
    InvalidParameter = 1,
    SegmentError = 2,
    InitTimeout = 3,
    NoData = 4,
    Expired = 5,
    CallTimeout = 6,
    NotConnected = 7,
    PlatformError = 8,
    UnknownError = 99,
}

impl From<ShmError> for ShmBusErrorCode {
    fn from(error: ShmError) -> Self {
        match error {
            ShmError::Config { .. } => ShmBusErrorCode::InvalidParameter,
            ShmError::Segment { .. } => ShmBusErrorCode::SegmentError,
            ShmError::InitTimeout { .. } => ShmBusErrorCode::InitTimeout,
            ShmError::NoData => ShmBusErrorCode::NoData,
            ShmError::Expired { .. } => ShmBusErrorCode::Expired,
            ShmError::CallTimeout { .. } => ShmBusErrorCode::CallTimeout,
            ShmError::NotConnected { .. } => ShmBusErrorCode::NotConnected,
            ShmError::Platform { .. } => ShmBusErrorCode::PlatformError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping_is_total() {
        assert_eq!(
            ShmBusErrorCode::from(ShmError::NoData),
            ShmBusErrorCode::NoData
        );
        assert_eq!(
            ShmBusErrorCode::from(ShmError::config("x", "y")),
            ShmBusErrorCode::InvalidParameter
        );
        assert_eq!(
            ShmBusErrorCode::from(ShmError::call_timeout(1)),
            ShmBusErrorCode::CallTimeout
        );
    }
}
