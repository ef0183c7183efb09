//! Action control block: a service channel extended with feedback, status
//! and a cancel timestamp

use std::{
    ptr,
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
};

use crate::{
    error::{Result, ShmError},
    layout::{aligned_offset, aligned_offset_of, alignment_of},
    sync::{monotonic_now_us, SharedCondPair},
};

use super::status::ActionStatus;

/// Byte offsets of the action control block.
///
/// The goal side mirrors a service request; the result side is extended
/// with the feedback payload, the status byte and the cancel timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionLayout {
    pub goal_mutex_off: usize,
    pub goal_cond_off: usize,
    pub goal_ts_off: usize,
    pub goal_data_off: usize,
    pub result_mutex_off: usize,
    pub result_cond_off: usize,
    pub result_ts_off: usize,
    pub result_data_off: usize,
    pub feedback_data_off: usize,
    pub status_off: usize,
    pub cancel_ts_off: usize,
    pub total: usize,
}

impl ActionLayout {
    /// Compute the layout for one goal/result/feedback geometry
    pub fn compute(goal_size: usize, result_size: usize, feedback_size: usize) -> Self {
        let mut off = 0;

        let goal_mutex_off = aligned_offset(off, alignment_of::<libc::pthread_mutex_t>());
        off = goal_mutex_off + std::mem::size_of::<libc::pthread_mutex_t>();
        let goal_cond_off = aligned_offset(off, alignment_of::<libc::pthread_cond_t>());
        off = goal_cond_off + std::mem::size_of::<libc::pthread_cond_t>();
        let goal_ts_off = aligned_offset_of::<u64>(off);
        off = goal_ts_off + std::mem::size_of::<u64>();
        let goal_data_off = aligned_offset_of::<u64>(off);
        off = goal_data_off + goal_size;

        let result_mutex_off = aligned_offset(off, alignment_of::<libc::pthread_mutex_t>());
        off = result_mutex_off + std::mem::size_of::<libc::pthread_mutex_t>();
        let result_cond_off = aligned_offset(off, alignment_of::<libc::pthread_cond_t>());
        off = result_cond_off + std::mem::size_of::<libc::pthread_cond_t>();
        let result_ts_off = aligned_offset_of::<u64>(off);
        off = result_ts_off + std::mem::size_of::<u64>();
        let result_data_off = aligned_offset_of::<u64>(off);
        off = result_data_off + result_size;

        let feedback_data_off = aligned_offset_of::<u64>(off);
        off = feedback_data_off + feedback_size;
        let status_off = aligned_offset_of::<u8>(off);
        off = status_off + std::mem::size_of::<u8>();
        let cancel_ts_off = aligned_offset_of::<u64>(off);

        Self {
            goal_mutex_off,
            goal_cond_off,
            goal_ts_off,
            goal_data_off,
            result_mutex_off,
            result_cond_off,
            result_ts_off,
            result_data_off,
            feedback_data_off,
            status_off,
            cancel_ts_off,
            total: cancel_ts_off + std::mem::size_of::<u64>(),
        }
    }
}

/// Borrowed view of an action control block inside a mapped segment
#[derive(Debug)]
pub struct ActionChannel {
    base: *mut u8,
    layout: ActionLayout,
    goal_size: usize,
    result_size: usize,
    feedback_size: usize,
    goal_pair: SharedCondPair,
    result_pair: SharedCondPair,
}

unsafe impl Send for ActionChannel {}

impl ActionChannel {
    /// Wrap the control block at `base`.
    ///
    /// # Safety
    /// `base` must point at a live mapping of at least `map_len` bytes that
    /// outlives the view.
    pub unsafe fn attach(
        base: *mut u8,
        map_len: usize,
        goal_size: usize,
        result_size: usize,
        feedback_size: usize,
    ) -> Result<Self> {
        let layout = ActionLayout::compute(goal_size, result_size, feedback_size);
        if map_len < layout.total {
            return Err(ShmError::config(
                "size",
                format!(
                    "mapping holds {} bytes, action channel needs {}",
                    map_len, layout.total
                ),
            ));
        }
        let goal_pair = SharedCondPair::from_raw(
            base.add(layout.goal_mutex_off) as *mut libc::pthread_mutex_t,
            base.add(layout.goal_cond_off) as *mut libc::pthread_cond_t,
        );
        let result_pair = SharedCondPair::from_raw(
            base.add(layout.result_mutex_off) as *mut libc::pthread_mutex_t,
            base.add(layout.result_cond_off) as *mut libc::pthread_cond_t,
        );
        Ok(Self {
            base,
            layout,
            goal_size,
            result_size,
            feedback_size,
            goal_pair,
            result_pair,
        })
    }

    /// Server-side one-time setup.
    ///
    /// Initializes both pairs, parks the status at `Succeeded` (no goal in
    /// flight) and stamps the goal, result and cancel timestamps with one
    /// shared "now", which doubles as the server's initial `start_ts`.
    pub fn initialize(&self) -> Result<u64> {
        self.goal_pair.initialize()?;
        self.result_pair.initialize()?;
        self.set_status(ActionStatus::Succeeded);
        let now_us = monotonic_now_us();
        self.goal_ts_atomic().store(now_us, Ordering::Release);
        self.result_ts_atomic().store(now_us, Ordering::Release);
        self.cancel_ts_atomic().store(now_us, Ordering::Release);
        Ok(now_us)
    }

    fn goal_ts_atomic(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(self.layout.goal_ts_off) as *const AtomicU64) }
    }

    fn result_ts_atomic(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(self.layout.result_ts_off) as *const AtomicU64) }
    }

    fn cancel_ts_atomic(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(self.layout.cancel_ts_off) as *const AtomicU64) }
    }

    fn status_atomic(&self) -> &AtomicU8 {
        unsafe { &*(self.base.add(self.layout.status_off) as *const AtomicU8) }
    }

    pub fn goal_ts(&self) -> u64 {
        self.goal_ts_atomic().load(Ordering::Acquire)
    }

    pub fn set_goal_ts(&self, ts_us: u64) {
        self.goal_ts_atomic().store(ts_us, Ordering::Release);
    }

    pub fn result_ts(&self) -> u64 {
        self.result_ts_atomic().load(Ordering::Acquire)
    }

    pub fn set_result_ts(&self, ts_us: u64) {
        self.result_ts_atomic().store(ts_us, Ordering::Release);
    }

    pub fn cancel_ts(&self) -> u64 {
        self.cancel_ts_atomic().load(Ordering::Acquire)
    }

    pub fn set_cancel_ts(&self, ts_us: u64) {
        self.cancel_ts_atomic().store(ts_us, Ordering::Release);
    }

    pub fn status(&self) -> ActionStatus {
        ActionStatus::from_raw(self.status_atomic().load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ActionStatus) {
        self.status_atomic().store(status.as_raw(), Ordering::Release);
    }

    pub fn goal_pair(&self) -> &SharedCondPair {
        &self.goal_pair
    }

    pub fn result_pair(&self) -> &SharedCondPair {
        &self.result_pair
    }

    /// Copy the goal payload out. Callers hold the goal mutex.
    pub fn read_goal(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.goal_size);
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(self.layout.goal_data_off),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    /// Copy a goal payload in. Callers hold the goal mutex.
    pub fn write_goal(&self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.goal_size);
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.base.add(self.layout.goal_data_off),
                data.len(),
            );
        }
    }

    /// Copy the result payload out. Callers hold the result mutex.
    pub fn read_result(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.result_size);
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(self.layout.result_data_off),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }

    /// Copy a result payload in. Callers hold the result mutex.
    pub fn write_result(&self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.result_size);
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.base.add(self.layout.result_data_off),
                data.len(),
            );
        }
    }

    /// Overwrite the feedback payload. No lock, no timestamp: feedback is
    /// lossy and a torn intermediate read is an accepted trade for never
    /// blocking the worker.
    pub fn write_feedback(&self, data: &[u8]) {
        debug_assert_eq!(data.len(), self.feedback_size);
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.base.add(self.layout.feedback_data_off),
                data.len(),
            );
        }
    }

    /// Copy the feedback payload out. Lossy by design; see
    /// [`ActionChannel::write_feedback`].
    pub fn read_feedback(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.feedback_size);
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(self.layout.feedback_data_off),
                out.as_mut_ptr(),
                out.len(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_field_order() {
        let layout = ActionLayout::compute(8, 16, 4);
        assert!(layout.goal_data_off > layout.goal_ts_off);
        assert!(layout.result_mutex_off >= layout.goal_data_off + 8);
        assert!(layout.feedback_data_off >= layout.result_data_off + 16);
        assert!(layout.status_off >= layout.feedback_data_off + 4);
        assert!(layout.cancel_ts_off > layout.status_off);
        assert_eq!(layout.cancel_ts_off % 8, 0);
        assert_eq!(layout.total, layout.cancel_ts_off + 8);
    }

    #[test]
    fn test_channel_status_and_stamps() {
        let layout = ActionLayout::compute(8, 8, 8);
        let mut backing = vec![0u64; layout.total.div_ceil(8)];
        let channel = unsafe {
            ActionChannel::attach(backing.as_mut_ptr() as *mut u8, layout.total, 8, 8, 8).unwrap()
        };
        let t0 = channel.initialize().unwrap();
        assert_eq!(channel.status(), ActionStatus::Succeeded);
        assert_eq!(channel.goal_ts(), t0);
        assert_eq!(channel.result_ts(), t0);
        assert_eq!(channel.cancel_ts(), t0);

        channel.set_status(ActionStatus::Active);
        assert_eq!(channel.status(), ActionStatus::Active);

        channel.write_feedback(&1.5f64.to_ne_bytes());
        let mut out = [0u8; 8];
        channel.read_feedback(&mut out);
        assert_eq!(f64::from_ne_bytes(out), 1.5);
    }
}
