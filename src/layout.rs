//! Field-offset computation for shared segment headers
//!
//! Writer and reader processes recompute the same offsets from the same
//! inputs, so the layout must be a pure function of the element geometry and
//! the host's native primitive sizes. Strict-alignment targets (ARM) get an
//! 8-byte floor on every field; x86 keeps natural alignment.

use std::mem;

/// Alignment floor applied on strict-alignment architectures
pub const STRICT_ALIGN_FLOOR: usize = 8;

/// True when the target requires the strict alignment floor
pub const fn is_strict_alignment_target() -> bool {
    cfg!(any(target_arch = "arm", target_arch = "aarch64"))
}

/// Required alignment for a `T` placed inside a shared segment.
///
/// On strict targets this is the maximum of the natural alignment, the
/// pointer width and [`STRICT_ALIGN_FLOOR`]; elsewhere the natural alignment.
pub fn alignment_of<T>() -> usize {
    if is_strict_alignment_target() {
        mem::align_of::<T>()
            .max(mem::size_of::<*const ()>())
            .max(STRICT_ALIGN_FLOOR)
    } else {
        mem::align_of::<T>()
    }
}

/// Round `offset` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn aligned_offset(offset: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (offset + alignment - 1) & !(alignment - 1)
}

/// Round `offset` up to the boundary required for a `T` in a shared segment
pub fn aligned_offset_of<T>(offset: usize) -> usize {
    aligned_offset(offset, alignment_of::<T>())
}

/// Check that a raw address satisfies the shared-segment alignment for `T`
pub fn is_aligned_for<T>(addr: usize) -> bool {
    addr % alignment_of::<T>() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_offset_rounds_up() {
        assert_eq!(aligned_offset(0, 8), 0);
        assert_eq!(aligned_offset(1, 8), 8);
        assert_eq!(aligned_offset(8, 8), 8);
        assert_eq!(aligned_offset(9, 4), 12);
    }

    #[test]
    fn test_alignment_floor_on_strict_targets() {
        let align = alignment_of::<u32>();
        if is_strict_alignment_target() {
            assert_eq!(align, STRICT_ALIGN_FLOOR);
        } else {
            assert_eq!(align, mem::align_of::<u32>());
        }
    }

    #[test]
    fn test_aligned_offset_of_is_aligned() {
        assert!(is_aligned_for::<u64>(aligned_offset_of::<u64>(13)));
        assert!(is_aligned_for::<u32>(aligned_offset_of::<u32>(7)));
    }
}
