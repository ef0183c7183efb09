//! Deterministic header layout for ring segments

use serde::{Deserialize, Serialize};

use crate::layout::{aligned_offset_of, alignment_of, aligned_offset};

/// Byte offsets of every header field in a ring segment.
///
/// Both the initializing writer and every attaching reader recompute this
/// from `(element_size, slot_count)` plus the host's native primitive sizes,
/// so the layout is self-describing: no implementation-defined struct
/// padding ever reaches the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingLayout {
    /// `init_flag: u32` — always offset 0
    pub init_off: usize,
    /// `pthread_init_flag: u32` — reserved second stage flag
    pub pthread_init_off: usize,
    /// process-shared `pthread_mutex_t`
    pub mutex_off: usize,
    /// process-shared `pthread_cond_t`
    pub cond_off: usize,
    /// `element_size: usize`
    pub elem_size_off: usize,
    /// `slot_count: usize`
    pub count_off: usize,
    /// `timestamps: [u64; slot_count]`
    pub ts_off: usize,
    /// `data: [u8; slot_count * element_size]`
    pub data_off: usize,
    /// total bytes consumed by the segment
    pub total: usize,
}

impl RingLayout {
    /// Compute the layout for one ring geometry
    pub fn compute(element_size: usize, slot_count: usize) -> Self {
        let init_off = 0;
        let mut off = init_off + std::mem::size_of::<u32>();

        let pthread_init_off = aligned_offset_of::<u32>(off);
        off = pthread_init_off + std::mem::size_of::<u32>();

        let mutex_off = aligned_offset(off, alignment_of::<libc::pthread_mutex_t>());
        off = mutex_off + std::mem::size_of::<libc::pthread_mutex_t>();

        let cond_off = aligned_offset(off, alignment_of::<libc::pthread_cond_t>());
        off = cond_off + std::mem::size_of::<libc::pthread_cond_t>();

        let elem_size_off = aligned_offset_of::<usize>(off);
        off = elem_size_off + std::mem::size_of::<usize>();

        let count_off = aligned_offset_of::<usize>(off);
        off = count_off + std::mem::size_of::<usize>();

        let ts_off = aligned_offset_of::<u64>(off);
        off = ts_off + std::mem::size_of::<u64>() * slot_count;

        let data_off = aligned_offset_of::<u64>(off);
        let total = data_off + element_size * slot_count;

        Self {
            init_off,
            pthread_init_off,
            mutex_off,
            cond_off,
            elem_size_off,
            count_off,
            ts_off,
            data_off,
            total,
        }
    }

    /// Offset of slot `index`'s timestamp
    pub fn ts_slot_off(&self, index: usize) -> usize {
        self.ts_off + index * std::mem::size_of::<u64>()
    }

    /// Offset of slot `index`'s payload for a given element size
    pub fn data_slot_off(&self, index: usize, element_size: usize) -> usize {
        self.data_off + index * element_size
    }
}
