//! The owning handle for a mirrored allocation.
//!
//! A `MirroredBuffer` owns the full `2 * byte_cap` virtual span produced by
//! the construction protocol and releases it exactly once, in one call. It
//! hands out slices over the *virtual* span: indices in
//! `[item_capacity, 2 * item_capacity)` go through the mirror half and
//! observe the same slots as the primary half.
//!
//! This is the low-level building block; the deque bookkeeping lives in the
//! crate root.

use super::{
    layout::{byte_capacity_for, establish_mirror, release_mirror},
    vm::VirtualMemory,
    Slot, SysVm, SLOT_SIZE,
};
use anyhow::{Context, Result};
use std::{num::NonZeroUsize, ptr::NonNull, slice};

/// A contiguous, mirrored slot buffer.
///
/// # Invariants
///
/// - `origin` is the base of a live `2 * byte_cap` mapping whose second half
///   aliases the first.
/// - `byte_cap` is a multiple of the page size and of the slot size.
/// - The mapping has exactly one owner: this value. Moving the value moves
///   ownership; there is no `Clone`.
pub(crate) struct MirroredBuffer {
    origin: NonNull<Slot>,
    byte_cap: NonZeroUsize,
}

impl MirroredBuffer {
    /// Maps a buffer holding at least `items` slots; a request for zero
    /// slots is coerced to one. Page rounding may grant more than requested.
    pub(crate) fn with_item_capacity(items: usize) -> Result<Self> {
        let vm = SysVm;
        let byte_cap = byte_capacity_for(vm.granularity(), items)
            .context("requested capacity overflows the addressable span")?;
        let origin = establish_mirror(&vm, byte_cap)
            .with_context(|| format!("failed to establish a {byte_cap}-byte mirrored mapping"))?;
        Ok(Self { origin: origin.cast::<Slot>(), byte_cap })
    }

    /// Number of slots one half holds.
    #[inline(always)]
    pub(crate) fn item_capacity(&self) -> usize {
        let byte_cap = self.byte_cap.get();
        debug_assert!(byte_cap % SLOT_SIZE == 0);
        byte_cap / SLOT_SIZE
    }

    /// Slice over `[start, start + len)` of the virtual span.
    ///
    /// The backing is fresh anonymous memory and therefore zero-filled, so
    /// every slot is an initialized `i64` from the moment the mapping
    /// exists.
    ///
    /// # Panics
    ///
    /// Panics if the range escapes the virtual span.
    #[inline(always)]
    pub(crate) fn virtual_slice_at(&self, start: usize, len: usize) -> &[Slot] {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.item_capacity() * 2),
            "slice bounds escape the virtual span"
        );
        unsafe { slice::from_raw_parts(self.origin.as_ptr().add(start), len) }
    }

    /// Mutable slice over `[start, start + len)` of the virtual span.
    ///
    /// # Panics
    ///
    /// Panics if the range escapes the virtual span.
    #[inline(always)]
    pub(crate) fn virtual_slice_mut_at(&mut self, start: usize, len: usize) -> &mut [Slot] {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.item_capacity() * 2),
            "slice bounds escape the virtual span"
        );
        unsafe { slice::from_raw_parts_mut(self.origin.as_ptr().add(start), len) }
    }

    /// Writes one slot of the virtual span without a bounds check.
    ///
    /// # Safety
    ///
    /// `idx` must be below `2 * item_capacity()`.
    #[inline(always)]
    pub(crate) unsafe fn write_slot(&mut self, idx: usize, value: Slot) {
        debug_assert!(idx < self.item_capacity() * 2, "slot index escapes the virtual span");
        unsafe { self.origin.as_ptr().add(idx).write(value) };
    }
}

impl Drop for MirroredBuffer {
    fn drop(&mut self) {
        // The whole span, both halves, goes back in one call.
        unsafe { release_mirror(&SysVm, self.origin.cast(), self.byte_cap) };
    }
}

// The mapping has exactly one owner, and `Slot` is a plain integer; the
// handle can move between threads and be shared by reference.
unsafe impl Send for MirroredBuffer {}
unsafe impl Sync for MirroredBuffer {}
