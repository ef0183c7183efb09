//! Ring-buffer view over a mapped segment

use std::{
    ptr,
    sync::atomic::{fence, AtomicU32, AtomicU64, Ordering},
    thread,
    time::Duration,
};

use crate::{
    error::{Result, ShmError},
    sync::{clock::realtime_deadline_after_us, SharedCondPair},
};

use super::layout::RingLayout;

/// Sentinel timestamp: the slot is currently being written
pub const TIMESTAMP_WRITING: u64 = u64::MAX;

/// Default staleness cutoff for `newest_slot`, in microseconds
pub const DEFAULT_EXPIRY_US: u64 = 2_000_000;

const INITIALIZED: u32 = 1;
const NOT_INITIALIZED: u32 = 0;

/// Poll step while waiting for the init flag
const INIT_POLL_STEP_US: u64 = 50;

/// Claim retries before a publish gives up on a contended slot
const CLAIM_RETRY_LIMIT: usize = 10;
const CLAIM_RETRY_SLEEP_US: u64 = 1_000;

/// Typed view of a ring buffer living inside a mapped segment.
///
/// The view borrows the mapping: it holds the base pointer plus offsets
/// recomputed from the header, and goes away with the handle that owns the
/// mapping. Concurrency races never panic; they surface as `bool`/`Option`
/// results. Only geometry problems are hard errors.
#[derive(Debug)]
pub struct RingBuffer {
    base: *mut u8,
    layout: RingLayout,
    element_size: usize,
    slot_count: usize,
    pair: SharedCondPair,
    /// Timestamp of the most recently observed slot; the edge detector for
    /// `wait_for_update`
    last_seen_us: u64,
    expiry_us: u64,
}

unsafe impl Send for RingBuffer {}

impl RingBuffer {
    /// Total segment bytes required for one ring geometry
    pub fn size_for(element_size: usize, slot_count: usize) -> usize {
        RingLayout::compute(element_size, slot_count).total
    }

    /// Atomic probe of the init flag at the start of a mapping.
    ///
    /// # Safety
    /// `base` must point at a live mapping of at least 4 bytes.
    pub unsafe fn is_initialized(base: *const u8) -> bool {
        let flag = &*(base as *const AtomicU32);
        flag.load(Ordering::Acquire) == INITIALIZED
    }

    /// Poll the init flag until it is set or `timeout_us` elapses.
    ///
    /// # Safety
    /// Same requirements as [`RingBuffer::is_initialized`].
    pub unsafe fn wait_for_initialized(base: *const u8, timeout_us: u64) -> bool {
        let mut waited_us: u64 = 0;
        loop {
            if Self::is_initialized(base) {
                return true;
            }
            if waited_us >= timeout_us {
                return false;
            }
            thread::sleep(Duration::from_micros(INIT_POLL_STEP_US));
            waited_us += INIT_POLL_STEP_US;
        }
    }

    /// Initialize a fresh ring in the mapping at `base` and return the
    /// writer's view.
    ///
    /// Clears the init flag, initializes the process-shared primitives,
    /// writes the geometry, zeroes every slot timestamp and only then
    /// publishes the header by setting the init flag (release), so a reader
    /// that observes the flag set observes a complete header.
    ///
    /// # Safety
    /// `base` must point at a writable mapping of at least `map_len` bytes
    /// that stays alive for the lifetime of the returned view, and no other
    /// process may be initializing the same segment concurrently.
    pub unsafe fn init_writer(
        base: *mut u8,
        map_len: usize,
        element_size: usize,
        slot_count: usize,
    ) -> Result<Self> {
        if slot_count == 0 {
            return Err(ShmError::config("slot_count", "must be at least 1"));
        }
        let layout = RingLayout::compute(element_size, slot_count);
        if map_len < layout.total {
            return Err(ShmError::config(
                "size",
                format!("mapping holds {} bytes, ring needs {}", map_len, layout.total),
            ));
        }

        let ring = Self::view(base, layout, element_size, slot_count);

        ring.init_flag().store(NOT_INITIALIZED, Ordering::SeqCst);
        ring.pthread_init_flag().store(NOT_INITIALIZED, Ordering::SeqCst);

        ring.pair.initialize()?;
        ring.pthread_init_flag().store(INITIALIZED, Ordering::Release);

        ptr::write(base.add(layout.elem_size_off) as *mut usize, element_size);
        ptr::write(base.add(layout.count_off) as *mut usize, slot_count);
        for index in 0..slot_count {
            ring.slot_ts(index).store(0, Ordering::Relaxed);
        }

        fence(Ordering::Release);
        ring.init_flag().store(INITIALIZED, Ordering::Release);
        Ok(ring)
    }

    /// Attach to an already-initialized ring, reading the geometry back out
    /// of the header. Never mutates the header.
    ///
    /// # Safety
    /// `base` must point at a live mapping of at least `map_len` bytes that
    /// stays alive for the lifetime of the returned view.
    pub unsafe fn attach_reader(base: *mut u8, map_len: usize) -> Result<Self> {
        // Header field offsets up to the timestamp array are independent of
        // the geometry, so a zero-geometry layout locates them.
        let probe = RingLayout::compute(0, 0);
        if map_len < probe.total {
            return Err(ShmError::config(
                "size",
                "mapping too small for a ring header",
            ));
        }
        if !Self::is_initialized(base) {
            return Err(ShmError::segment("Ring header is not initialized"));
        }

        let element_size = ptr::read(base.add(probe.elem_size_off) as *const usize);
        let slot_count = ptr::read(base.add(probe.count_off) as *const usize);
        if slot_count == 0 {
            return Err(ShmError::segment("Ring header holds a zero slot count"));
        }

        let layout = RingLayout::compute(element_size, slot_count);
        if map_len < layout.total {
            return Err(ShmError::config(
                "size",
                format!("mapping holds {} bytes, ring needs {}", map_len, layout.total),
            ));
        }
        Ok(Self::view(base, layout, element_size, slot_count))
    }

    /// Attach to an already-initialized ring whose geometry the caller
    /// knows, failing on any mismatch with the header.
    ///
    /// # Safety
    /// Same requirements as [`RingBuffer::attach_reader`].
    pub unsafe fn attach_writer(
        base: *mut u8,
        map_len: usize,
        element_size: usize,
        slot_count: usize,
    ) -> Result<Self> {
        let ring = Self::attach_reader(base, map_len)?;
        if ring.element_size != element_size {
            return Err(ShmError::config(
                "element_size",
                format!(
                    "segment holds elements of {} bytes, publisher expects {}",
                    ring.element_size, element_size
                ),
            ));
        }
        if ring.slot_count != slot_count {
            return Err(ShmError::config(
                "slot_count",
                format!(
                    "segment holds {} slots, publisher expects {}",
                    ring.slot_count, slot_count
                ),
            ));
        }
        Ok(ring)
    }

    unsafe fn view(
        base: *mut u8,
        layout: RingLayout,
        element_size: usize,
        slot_count: usize,
    ) -> Self {
        let pair = SharedCondPair::from_raw(
            base.add(layout.mutex_off) as *mut libc::pthread_mutex_t,
            base.add(layout.cond_off) as *mut libc::pthread_cond_t,
        );
        Self {
            base,
            layout,
            element_size,
            slot_count,
            pair,
            last_seen_us: 0,
            expiry_us: DEFAULT_EXPIRY_US,
        }
    }

    fn init_flag(&self) -> &AtomicU32 {
        unsafe { &*(self.base.add(self.layout.init_off) as *const AtomicU32) }
    }

    fn pthread_init_flag(&self) -> &AtomicU32 {
        unsafe { &*(self.base.add(self.layout.pthread_init_off) as *const AtomicU32) }
    }

    fn slot_ts(&self, index: usize) -> &AtomicU64 {
        debug_assert!(index < self.slot_count);
        unsafe { &*(self.base.add(self.layout.ts_slot_off(index)) as *const AtomicU64) }
    }

    /// Bytes per slot payload
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Timestamp of the most recently observed slot
    pub fn last_timestamp_us(&self) -> u64 {
        self.last_seen_us
    }

    /// Configure the staleness cutoff for [`RingBuffer::newest_slot`];
    /// 0 disables expiry
    pub fn set_expiry_us(&mut self, expiry_us: u64) {
        self.expiry_us = expiry_us;
    }

    /// Raw timestamp of one slot
    pub fn slot_timestamp(&self, index: usize) -> u64 {
        self.slot_ts(index).load(Ordering::Acquire)
    }

    /// Raw payload pointer of one slot, for zero-copy consumers that uphold
    /// the claim/publish protocol themselves
    pub fn slot_data_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.slot_count);
        unsafe {
            self.base
                .add(self.layout.data_slot_off(index, self.element_size))
        }
    }

    /// Index of the slot a writer should overwrite next.
    ///
    /// Empty slots rank below in-progress slots, which rank below any valid
    /// timestamp; ties break toward the lowest index. The returned slot may
    /// still be claimed by a racing writer, in which case the claim fails
    /// and the caller rescans.
    pub fn oldest_slot(&self) -> usize {
        let mut best_index = 0;
        let mut best_key = u64::MAX;
        for index in 0..self.slot_count {
            let ts = self.slot_ts(index).load(Ordering::Acquire);
            let key = match ts {
                0 => 0,
                TIMESTAMP_WRITING => 1,
                valid => valid,
            };
            if key < best_key {
                best_key = key;
                best_index = index;
            }
        }
        best_index
    }

    /// Index of the newest valid slot, or `None` when no slot holds valid
    /// unexpired data.
    ///
    /// Slots that are empty or mid-write are never returned. The winning
    /// timestamp becomes the new edge for [`RingBuffer::wait_for_update`].
    pub fn newest_slot(&mut self) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_ts: u64 = 0;
        for index in 0..self.slot_count {
            let ts = self.slot_ts(index).load(Ordering::Acquire);
            if ts != 0 && ts != TIMESTAMP_WRITING && ts > best_ts {
                best_ts = ts;
                best = Some(index);
            }
        }
        self.last_seen_us = best_ts;

        let index = best?;
        if self.expiry_us > 0 {
            let now_us = crate::sync::monotonic_now_us();
            if now_us.saturating_sub(best_ts) >= self.expiry_us {
                return None;
            }
        }
        Some(index)
    }

    /// Take exclusive write access to a slot with one compare-and-swap.
    ///
    /// Fails when the slot is already mid-write.
    pub fn claim_slot(&self, index: usize) -> bool {
        if index >= self.slot_count {
            return false;
        }
        let ts = self.slot_ts(index).load(Ordering::Acquire);
        if ts == TIMESTAMP_WRITING {
            return false;
        }
        self.slot_ts(index)
            .compare_exchange(ts, TIMESTAMP_WRITING, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Claim the oldest slot, retrying a bounded number of times under
    /// writer contention.
    pub fn claim_oldest(&self) -> Result<usize> {
        let mut index = self.oldest_slot();
        for _ in 0..CLAIM_RETRY_LIMIT {
            if self.claim_slot(index) {
                return Ok(index);
            }
            thread::sleep(Duration::from_micros(CLAIM_RETRY_SLEEP_US));
            index = self.oldest_slot();
        }
        Err(ShmError::platform(
            "could not claim a slot; too many concurrent writers",
        ))
    }

    /// End a claim: release-store the fresh timestamp, making the payload
    /// visible, then wake every waiting subscriber.
    pub fn publish_slot(&self, index: usize, timestamp_us: u64) {
        self.slot_ts(index).store(timestamp_us, Ordering::Release);
        self.pair.broadcast();
    }

    /// Copy `data` into slot `index`'s payload. The caller must hold the
    /// claim on that slot.
    pub fn write_slot(&self, index: usize, data: &[u8]) {
        debug_assert!(data.len() <= self.element_size);
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.slot_data_ptr(index), data.len());
        }
    }

    /// Copy slot `index`'s payload into `out`
    pub fn read_slot(&self, index: usize, out: &mut [u8]) {
        debug_assert!(out.len() <= self.element_size);
        unsafe {
            ptr::copy_nonoverlapping(self.slot_data_ptr(index), out.as_mut_ptr(), out.len());
        }
    }

    /// True when some slot carries a timestamp newer than the last one this
    /// view observed
    pub fn is_updated(&self) -> bool {
        for index in 0..self.slot_count {
            let ts = self.slot_ts(index).load(Ordering::Acquire);
            if ts != TIMESTAMP_WRITING && ts > self.last_seen_us {
                return true;
            }
        }
        false
    }

    /// Block until a newer slot is published or `timeout_us` elapses.
    ///
    /// Returns `true` when an update arrived. The wait re-checks the slot
    /// timestamps on every wakeup, so spurious wakeups and broadcasts for
    /// already-seen data never produce a false positive.
    pub fn wait_for_update(&mut self, timeout_us: u64) -> bool {
        let deadline = realtime_deadline_after_us(timeout_us);
        while !self.is_updated() {
            self.pair.lock();
            let woke = self.pair.wait_until(&deadline);
            self.pair.unlock();
            if !woke {
                return false;
            }
        }
        true
    }
}
