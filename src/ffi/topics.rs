//! FFI convenience wrappers: byte-payload topic endpoints

use std::{ffi::c_char, slice};

use crate::{
    segment::Permission,
    topic::{RawPublisher, RawSubscriber},
};

use super::{
    types::{ShmBusErrorCode, ShmPublisherHandle, ShmSubscriberHandle},
    utils::{c_str_to_string, HANDLE_REGISTRY},
};

/// Create a byte-payload publisher with an explicit element size
#[no_mangle]
pub extern "C" fn shmbus_publisher_create(
    name: *const c_char,
    element_size: usize,
    slot_count: usize,
    mode: u32,
    handle_out: *mut ShmPublisherHandle,
) -> ShmBusErrorCode {
    if name.is_null() || handle_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let name = match c_str_to_string(name) {
        Ok(name) => name,
        Err(_) => return ShmBusErrorCode::InvalidParameter,
    };
    match RawPublisher::new(&name, element_size, slot_count, Permission::from_mode(mode)) {
        Ok(publisher) => {
            let mut registry = HANDLE_REGISTRY.lock().unwrap();
            let id = registry.store_publisher(publisher);
            unsafe {
                *handle_out = id as ShmPublisherHandle;
            }
            ShmBusErrorCode::Success
        }
        Err(e) => e.into(),
    }
}

/// Publish one payload; `len` must equal the topic's element size
#[no_mangle]
pub extern "C" fn shmbus_publisher_publish(
    handle: ShmPublisherHandle,
    data: *const u8,
    len: usize,
) -> ShmBusErrorCode {
    if handle.is_null() || data.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let publisher = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_publisher(handle as usize) {
            Some(publisher) => publisher,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let payload = unsafe { slice::from_raw_parts(data, len) };
    let result = match publisher.lock().unwrap().publish(payload) {
        Ok(()) => ShmBusErrorCode::Success,
        Err(e) => e.into(),
    };
    result
}

/// Release a publisher handle; the segment stays in the host namespace
#[no_mangle]
pub extern "C" fn shmbus_publisher_destroy(handle: ShmPublisherHandle) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    if registry.remove_publisher(handle as usize) {
        ShmBusErrorCode::Success
    } else {
        ShmBusErrorCode::InvalidParameter
    }
}

/// Create a byte-payload subscriber; the segment attaches lazily
#[no_mangle]
pub extern "C" fn shmbus_subscriber_create(
    name: *const c_char,
    handle_out: *mut ShmSubscriberHandle,
) -> ShmBusErrorCode {
    if name.is_null() || handle_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let name = match c_str_to_string(name) {
        Ok(name) => name,
        Err(_) => return ShmBusErrorCode::InvalidParameter,
    };
    match RawSubscriber::new(&name) {
        Ok(subscriber) => {
            let mut registry = HANDLE_REGISTRY.lock().unwrap();
            let id = registry.store_subscriber(subscriber);
            unsafe {
                *handle_out = id as ShmSubscriberHandle;
            }
            ShmBusErrorCode::Success
        }
        Err(e) => e.into(),
    }
}

/// Copy out the newest payload.
///
/// `success_out` receives false when there is no valid unexpired data or
/// `len` does not match the topic's element size; `out` is untouched then.
#[no_mangle]
pub extern "C" fn shmbus_subscriber_subscribe(
    handle: ShmSubscriberHandle,
    out: *mut u8,
    len: usize,
    success_out: *mut bool,
) -> ShmBusErrorCode {
    if handle.is_null() || out.is_null() || success_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let subscriber = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_subscriber(handle as usize) {
            Some(subscriber) => subscriber,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let payload = unsafe { slice::from_raw_parts_mut(out, len) };
    let ok = subscriber.lock().unwrap().subscribe_into(payload);
    unsafe {
        *success_out = ok;
    }
    ShmBusErrorCode::Success
}

/// Block until the topic is updated or `timeout_us` elapses
#[no_mangle]
pub extern "C" fn shmbus_subscriber_wait(
    handle: ShmSubscriberHandle,
    timeout_us: u64,
    updated_out: *mut bool,
) -> ShmBusErrorCode {
    if handle.is_null() || updated_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let subscriber = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_subscriber(handle as usize) {
            Some(subscriber) => subscriber,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let updated = subscriber.lock().unwrap().wait_for_update(timeout_us);
    unsafe {
        *updated_out = updated;
    }
    ShmBusErrorCode::Success
}

/// Configure the subscriber's staleness cutoff (0 disables)
#[no_mangle]
pub extern "C" fn shmbus_subscriber_set_expiry(
    handle: ShmSubscriberHandle,
    expiry_us: u64,
) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let subscriber = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_subscriber(handle as usize) {
            Some(subscriber) => subscriber,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    subscriber.lock().unwrap().set_expiry_us(expiry_us);
    ShmBusErrorCode::Success
}

/// Release a subscriber handle
#[no_mangle]
pub extern "C" fn shmbus_subscriber_destroy(handle: ShmSubscriberHandle) -> ShmBusErrorCode {
    if handle.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    if registry.remove_subscriber(handle as usize) {
        ShmBusErrorCode::Success
    } else {
        ShmBusErrorCode::InvalidParameter
    }
}
