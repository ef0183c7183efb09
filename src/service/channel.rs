//! Two-slot channel control block shared by server and client

use std::{
    ptr,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    error::{Result, ShmError},
    layout::{aligned_offset, aligned_offset_of, alignment_of},
    sync::{monotonic_now_us, SharedCondPair},
};

/// Byte offsets of the request/response control block.
///
/// Like the ring header, the layout is a pure function of the payload sizes
/// and the host's primitive sizes, so server and client recompute identical
/// offsets independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLayout {
    pub req_mutex_off: usize,
    pub req_cond_off: usize,
    pub req_ts_off: usize,
    pub req_data_off: usize,
    pub res_mutex_off: usize,
    pub res_cond_off: usize,
    pub res_ts_off: usize,
    pub res_data_off: usize,
    pub total: usize,
}

impl ServiceLayout {
    /// Compute the layout for one request/response geometry
    pub fn compute(req_size: usize, res_size: usize) -> Self {
        let mut off = 0;

        let req_mutex_off = aligned_offset(off, alignment_of::<libc::pthread_mutex_t>());
        off = req_mutex_off + std::mem::size_of::<libc::pthread_mutex_t>();
        let req_cond_off = aligned_offset(off, alignment_of::<libc::pthread_cond_t>());
        off = req_cond_off + std::mem::size_of::<libc::pthread_cond_t>();
        let req_ts_off = aligned_offset_of::<u64>(off);
        off = req_ts_off + std::mem::size_of::<u64>();
        let req_data_off = aligned_offset_of::<u64>(off);
        off = req_data_off + req_size;

        let res_mutex_off = aligned_offset(off, alignment_of::<libc::pthread_mutex_t>());
        off = res_mutex_off + std::mem::size_of::<libc::pthread_mutex_t>();
        let res_cond_off = aligned_offset(off, alignment_of::<libc::pthread_cond_t>());
        off = res_cond_off + std::mem::size_of::<libc::pthread_cond_t>();
        let res_ts_off = aligned_offset_of::<u64>(off);
        off = res_ts_off + std::mem::size_of::<u64>();
        let res_data_off = aligned_offset_of::<u64>(off);

        Self {
            req_mutex_off,
            req_cond_off,
            req_ts_off,
            req_data_off,
            res_mutex_off,
            res_cond_off,
            res_ts_off,
            res_data_off,
            total: res_data_off + res_size,
        }
    }
}

/// Borrowed view of a service control block inside a mapped segment
#[derive(Debug)]
pub struct ServiceChannel {
    base: *mut u8,
    layout: ServiceLayout,
    req_size: usize,
    res_size: usize,
    req_pair: SharedCondPair,
    res_pair: SharedCondPair,
}

unsafe impl Send for ServiceChannel {}
unsafe impl Sync for ServiceChannel {}

impl ServiceChannel {
    /// Wrap the control block at `base`.
    ///
    /// # Safety
    /// `base` must point at a live mapping of at least `map_len` bytes that
    /// outlives the view.
    pub unsafe fn attach(
        base: *mut u8,
        map_len: usize,
        req_size: usize,
        res_size: usize,
    ) -> Result<Self> {
        let layout = ServiceLayout::compute(req_size, res_size);
        if map_len < layout.total {
            return Err(ShmError::config(
                "size",
                format!(
                    "mapping holds {} bytes, service channel needs {}",
                    map_len, layout.total
                ),
            ));
        }
        let req_pair = SharedCondPair::from_raw(
            base.add(layout.req_mutex_off) as *mut libc::pthread_mutex_t,
            base.add(layout.req_cond_off) as *mut libc::pthread_cond_t,
        );
        let res_pair = SharedCondPair::from_raw(
            base.add(layout.res_mutex_off) as *mut libc::pthread_mutex_t,
            base.add(layout.res_cond_off) as *mut libc::pthread_cond_t,
        );
        Ok(Self {
            base,
            layout,
            req_size,
            res_size,
            req_pair,
            res_pair,
        })
    }

    /// Server-side one-time setup: initialize both process-shared pairs and
    /// stamp both timestamps with the current monotonic time, so clients
    /// only ever observe an advance caused by a real request or response.
    pub fn initialize(&self) -> Result<u64> {
        self.req_pair.initialize()?;
        self.res_pair.initialize()?;
        let now_us = monotonic_now_us();
        self.request_ts_atomic().store(now_us, Ordering::Release);
        self.response_ts_atomic().store(now_us, Ordering::Release);
        Ok(now_us)
    }

    fn request_ts_atomic(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(self.layout.req_ts_off) as *const AtomicU64) }
    }

    fn response_ts_atomic(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(self.layout.res_ts_off) as *const AtomicU64) }
    }

    pub fn request_ts(&self) -> u64 {
        self.request_ts_atomic().load(Ordering::Acquire)
    }

    pub fn set_request_ts(&self, ts_us: u64) {
        self.request_ts_atomic().store(ts_us, Ordering::Release);
    }

    pub fn response_ts(&self) -> u64 {
        self.response_ts_atomic().load(Ordering::Acquire)
    }

    pub fn set_response_ts(&self, ts_us: u64) {
        self.response_ts_atomic().store(ts_us, Ordering::Release);
    }

    pub fn req_pair(&self) -> &SharedCondPair {
        &self.req_pair
    }

    pub fn res_pair(&self) -> &SharedCondPair {
        &self.res_pair
    }

    /// Copy the request payload out. Callers hold the request mutex.
    pub fn read_request(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.req_size);
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(self.layout.req_data_off),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    /// Copy a request payload in. Callers hold the request mutex.
    pub fn write_request(&self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.req_size);
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.base.add(self.layout.req_data_off),
                data.len(),
            );
        }
    }

    /// Copy the response payload out. Callers hold the response mutex.
    pub fn read_response(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.res_size);
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(self.layout.res_data_off),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    /// Copy a response payload in. Callers hold the response mutex.
    pub fn write_response(&self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.res_size);
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.base.add(self.layout.res_data_off),
                data.len(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_ordering() {
        let layout = ServiceLayout::compute(16, 32);
        assert!(layout.req_cond_off > layout.req_mutex_off);
        assert!(layout.req_ts_off > layout.req_cond_off);
        assert!(layout.req_data_off > layout.req_ts_off);
        assert!(layout.res_mutex_off >= layout.req_data_off + 16);
        assert!(layout.res_data_off > layout.res_ts_off);
        assert_eq!(layout.total, layout.res_data_off + 32);
        assert_eq!(layout.req_ts_off % 8, 0);
        assert_eq!(layout.res_ts_off % 8, 0);
    }

    #[test]
    fn test_layout_is_deterministic() {
        assert_eq!(
            ServiceLayout::compute(8, 8),
            ServiceLayout::compute(8, 8)
        );
    }

    #[test]
    fn test_channel_roundtrip_in_scratch_memory() {
        let layout = ServiceLayout::compute(8, 8);
        let mut backing = vec![0u64; layout.total.div_ceil(8)];
        let channel = unsafe {
            ServiceChannel::attach(backing.as_mut_ptr() as *mut u8, layout.total, 8, 8).unwrap()
        };
        let t0 = channel.initialize().unwrap();
        assert_eq!(channel.request_ts(), t0);
        assert_eq!(channel.response_ts(), t0);

        channel.write_request(&7u64.to_ne_bytes());
        let mut out = [0u8; 8];
        channel.read_request(&mut out);
        assert_eq!(u64::from_ne_bytes(out), 7);

        channel.set_request_ts(t0 + 1);
        assert_eq!(channel.request_ts(), t0 + 1);
    }
}
