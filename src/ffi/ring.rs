//! FFI functions for ring-buffer views over segment handles

use std::slice;

use crate::ring::RingBuffer;

use super::{
    types::{ShmBusErrorCode, ShmRingHandle, ShmSegmentHandle},
    utils::HANDLE_REGISTRY,
};

/// Total segment bytes required for one ring geometry
#[no_mangle]
pub extern "C" fn shmbus_ring_size_for(element_size: usize, slot_count: usize) -> usize {
    RingBuffer::size_for(element_size, slot_count)
}

/// Initialize a fresh ring inside a connected segment and return a writer
/// view. The segment stays alive for as long as the ring handle exists, but
/// explicitly disconnecting it invalidates the view.
#[no_mangle]
pub extern "C" fn shmbus_ring_init_writer(
    segment: ShmSegmentHandle,
    element_size: usize,
    slot_count: usize,
    ring_out: *mut ShmRingHandle,
) -> ShmBusErrorCode {
    if segment.is_null() || ring_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let segment_arc = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_segment(segment as usize) {
            Some(arc) => arc,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let ring = {
        let guard = segment_arc.lock().unwrap();
        let base = match unsafe { guard.as_base_ptr() } {
            Some(base) => base,
            None => return ShmBusErrorCode::NotConnected,
        };
        match unsafe { RingBuffer::init_writer(base, guard.size(), element_size, slot_count) } {
            Ok(ring) => ring,
            Err(e) => return e.into(),
        }
    };
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    let id = registry.store_ring(ring, segment_arc);
    unsafe {
        *ring_out = id as ShmRingHandle;
    }
    ShmBusErrorCode::Success
}

/// Attach a reader view to an already-initialized ring
#[no_mangle]
pub extern "C" fn shmbus_ring_attach_reader(
    segment: ShmSegmentHandle,
    ring_out: *mut ShmRingHandle,
) -> ShmBusErrorCode {
    if segment.is_null() || ring_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let segment_arc = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_segment(segment as usize) {
            Some(arc) => arc,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let ring = {
        let guard = segment_arc.lock().unwrap();
        let base = match unsafe { guard.as_base_ptr() } {
            Some(base) => base,
            None => return ShmBusErrorCode::NotConnected,
        };
        match unsafe { RingBuffer::attach_reader(base, guard.size()) } {
            Ok(ring) => ring,
            Err(e) => return e.into(),
        }
    };
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    let id = registry.store_ring(ring, segment_arc);
    unsafe {
        *ring_out = id as ShmRingHandle;
    }
    ShmBusErrorCode::Success
}

/// Poll the init flag of a connected segment up to `timeout_us`
#[no_mangle]
pub extern "C" fn shmbus_ring_wait_initialized(
    segment: ShmSegmentHandle,
    timeout_us: u64,
    initialized_out: *mut bool,
) -> ShmBusErrorCode {
    if segment.is_null() || initialized_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let segment_arc = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        match registry.get_segment(segment as usize) {
            Some(arc) => arc,
            None => return ShmBusErrorCode::InvalidParameter,
        }
    };
    let guard = segment_arc.lock().unwrap();
    let base = match guard.as_ptr() {
        Some(base) => base,
        None => return ShmBusErrorCode::NotConnected,
    };
    let initialized = unsafe { RingBuffer::wait_for_initialized(base, timeout_us) };
    unsafe {
        *initialized_out = initialized;
    }
    ShmBusErrorCode::Success
}

fn with_ring<T>(
    handle: ShmRingHandle,
    f: impl FnOnce(&mut RingBuffer) -> T,
) -> Option<T> {
    if handle.is_null() {
        return None;
    }
    let entry = {
        let registry = HANDLE_REGISTRY.lock().unwrap();
        registry.get_ring(handle as usize)?
    };
    let mut guard = entry.ring.lock().unwrap();
    Some(f(&mut guard))
}

/// Index of the slot a writer should overwrite next
#[no_mangle]
pub extern "C" fn shmbus_ring_oldest(
    ring: ShmRingHandle,
    index_out: *mut usize,
) -> ShmBusErrorCode {
    if index_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.oldest_slot()) {
        Some(index) => {
            unsafe {
                *index_out = index;
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Index of the newest valid slot; -1 when none
#[no_mangle]
pub extern "C" fn shmbus_ring_newest(
    ring: ShmRingHandle,
    index_out: *mut i64,
) -> ShmBusErrorCode {
    if index_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.newest_slot()) {
        Some(newest) => {
            unsafe {
                *index_out = newest.map(|index| index as i64).unwrap_or(-1);
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Compare-and-swap claim of one slot
#[no_mangle]
pub extern "C" fn shmbus_ring_claim(
    ring: ShmRingHandle,
    index: usize,
    claimed_out: *mut bool,
) -> ShmBusErrorCode {
    if claimed_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.claim_slot(index)) {
        Some(claimed) => {
            unsafe {
                *claimed_out = claimed;
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Publish a claimed slot with an explicit timestamp
#[no_mangle]
pub extern "C" fn shmbus_ring_publish(
    ring: ShmRingHandle,
    index: usize,
    timestamp_us: u64,
) -> ShmBusErrorCode {
    match with_ring(ring, |ring| ring.publish_slot(index, timestamp_us)) {
        Some(()) => ShmBusErrorCode::Success,
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Copy `len` bytes into a claimed slot's payload
#[no_mangle]
pub extern "C" fn shmbus_ring_write_slot(
    ring: ShmRingHandle,
    index: usize,
    data: *const u8,
    len: usize,
) -> ShmBusErrorCode {
    if data.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let payload = unsafe { slice::from_raw_parts(data, len) };
    let result = with_ring(ring, |ring| {
        if len > ring.element_size() || index >= ring.slot_count() {
            return ShmBusErrorCode::InvalidParameter;
        }
        ring.write_slot(index, payload);
        ShmBusErrorCode::Success
    });
    result.unwrap_or(ShmBusErrorCode::InvalidParameter)
}

/// Copy `len` bytes out of a slot's payload
#[no_mangle]
pub extern "C" fn shmbus_ring_read_slot(
    ring: ShmRingHandle,
    index: usize,
    out: *mut u8,
    len: usize,
) -> ShmBusErrorCode {
    if out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let payload = unsafe { slice::from_raw_parts_mut(out, len) };
    let result = with_ring(ring, |ring| {
        if len > ring.element_size() || index >= ring.slot_count() {
            return ShmBusErrorCode::InvalidParameter;
        }
        ring.read_slot(index, payload);
        ShmBusErrorCode::Success
    });
    result.unwrap_or(ShmBusErrorCode::InvalidParameter)
}

/// Block until an update newer than the last observed one arrives
#[no_mangle]
pub extern "C" fn shmbus_ring_wait_update(
    ring: ShmRingHandle,
    timeout_us: u64,
    updated_out: *mut bool,
) -> ShmBusErrorCode {
    if updated_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.wait_for_update(timeout_us)) {
        Some(updated) => {
            unsafe {
                *updated_out = updated;
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Configure the staleness cutoff (0 disables)
#[no_mangle]
pub extern "C" fn shmbus_ring_set_expiry(ring: ShmRingHandle, expiry_us: u64) -> ShmBusErrorCode {
    match with_ring(ring, |ring| ring.set_expiry_us(expiry_us)) {
        Some(()) => ShmBusErrorCode::Success,
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Bytes per slot payload
#[no_mangle]
pub extern "C" fn shmbus_ring_element_size(
    ring: ShmRingHandle,
    size_out: *mut usize,
) -> ShmBusErrorCode {
    if size_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.element_size()) {
        Some(size) => {
            unsafe {
                *size_out = size;
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Number of slots
#[no_mangle]
pub extern "C" fn shmbus_ring_slot_count(
    ring: ShmRingHandle,
    count_out: *mut usize,
) -> ShmBusErrorCode {
    if count_out.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    match with_ring(ring, |ring| ring.slot_count()) {
        Some(count) => {
            unsafe {
                *count_out = count;
            }
            ShmBusErrorCode::Success
        }
        None => ShmBusErrorCode::InvalidParameter,
    }
}

/// Release a ring view
#[no_mangle]
pub extern "C" fn shmbus_ring_destroy(ring: ShmRingHandle) -> ShmBusErrorCode {
    if ring.is_null() {
        return ShmBusErrorCode::InvalidParameter;
    }
    let mut registry = HANDLE_REGISTRY.lock().unwrap();
    if registry.remove_ring(ring as usize) {
        ShmBusErrorCode::Success
    } else {
        ShmBusErrorCode::InvalidParameter
    }
}
