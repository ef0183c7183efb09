//! FFI functions for segment lifecycle

use std::ffi::c_char;

use crate::segment::{segment_exists, unlink_by_name, Permission, Segment, SegmentConfig};

use super::{
    types::{ShmBusErrorCode, ShmSegmentHandle},
    utils::{c_str_to_string, HANDLE_REGISTRY},
};

/// Open (optionally create) a named segment and map it read/write
#[no_mangle]
pub extern "C" fn shmbus_segment_open(
    name: *const c_char,
    create: bool,
    size: usize,
    mode: u32,
    handle_out: *mut ShmSegmentHandle,
) -> ShmBusErrorCode {
    if name.is_null() || handle_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let name = match c_str_to_string(name) {
        Ok(name) => name,
        Err(_) => return ShmBusErrorCode::InvalidParameter,
    };
    let config = SegmentConfig {
        create,
        permission: Permission::from_mode(mode),
    };
    match Segment::open(&name, config, size) {
        Ok(segment) => {
            let mut registry = HANDLE_REGISTRY.lock().unwrap();
            let id = registry.store_segment(segment);
            unsafe {
                *handle_out = id as ShmSegmentHandle;
            }
            ShmBusErrorCode::Success
        }
        Err(e) => e.into(),
    }
}

/// Unmap and close; the handle stays valid for a later destroy
#[no_mangle]
pub extern "C" fn shmbus_segment_disconnect(handle: ShmSegmentHandle) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let registry = HANDLE_REGISTRY.lock().unwrap();
    match registry.get_segment(handle as usize) {
        Some(segment) => {
            segment.lock().unwrap().disconnect();
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Unmap, close and unlink (guarded by the link-count check)
#[no_mangle]
pub extern "C" fn shmbus_segment_disconnect_and_unlink(
    handle: ShmSegmentHandle,
) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let registry = HANDLE_REGISTRY.lock().unwrap();
    match registry.get_segment(handle as usize) {
        Some(segment) => match segment.lock().unwrap().disconnect_and_unlink() {
            Ok(()) => ShmBusErrorCode::Success,
            Err(e) => e.into(),
        },
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Release the handle; disconnects if still connected
#[no_mangle]
pub extern "C" fn shmbus_segment_destroy(handle: ShmSegmentHandle) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    if registry.remove_segment(handle as usize).is_some() {
        ShmBusErrorCode::Success
    } else {
        ShmBusErrorCode::InvalidParameter
    }
}

/// Current mapping size in bytes
#[no_mangle]
pub extern "C" fn shmbus_segment_size(
    handle: ShmSegmentHandle,
    size_out: *mut usize,
) -> ShmBusErrorCode {
    if handle.is_null() || size_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let registry = HANDLE_REGISTRY.lock().unwrap();
    match registry.get_segment(handle as usize) {
        Some(segment) => {
            unsafe {
                *size_out = segment.lock().unwrap().size();
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// True when the mapping is gone or the object was unlinked underneath us
#[no_mangle]
pub extern "C" fn shmbus_segment_is_disconnected(
    handle: ShmSegmentHandle,
    disconnected_out: *mut bool,
) -> ShmBusErrorCode {
    if handle.is_null() || disconnected_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let registry = HANDLE_REGISTRY.lock().unwrap();
    match registry.get_segment(handle as usize) {
        Some(segment) => {
            unsafe {
                *disconnected_out = segment.lock().unwrap().is_disconnected();
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Unlink a segment by logical name without holding a handle
#[no_mangle]
pub extern "C" fn shmbus_unlink(name: *const c_char) -> ShmBusErrorCode {
    if name.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let name = match c_str_to_string(name) {
        Ok(name) => name,
        Err(_) => return ShmBusErrorCode::InvalidParameter,
    };
    match unlink_by_name(&name) {
        Ok(()) => ShmBusErrorCode::Success,
        Err(e) => e.into(),
    }
}

/// Probe for an initialized segment, waiting up to `timeout_us`
#[no_mangle]
pub extern "C" fn shmbus_segment_exists(name: *const c_char, timeout_us: u64) -> bool {
    let name = match c_str_to_string(name) {
        Ok(name) => name,
        Err(_) => return false,
    };
    segment_exists(&name, timeout_us)
}
