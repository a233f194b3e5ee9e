//! Sizing rules and the two-region construction protocol.
//!
//! A mirrored region is built in five mapping steps: reserve a `2 * B`
//! placeholder to pin an address, create `B` bytes of anonymous shared
//! backing elsewhere, vacate the placeholder's first half, move the backing
//! into it, vacate the second half, then map the same backing a second time
//! right behind the first. Each fallible step has its own cleanup set, so
//! nothing leaks on any path.

use super::{vm::VirtualMemory, MAX_VIRTUAL_SPAN, SLOT_SIZE};
use nix::errno::Errno;
use std::{ffi::c_void, num::NonZeroUsize, ptr::NonNull};

const TWO: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(two) => two,
    None => panic!("two is not zero"),
};

/// Byte size of one half (`B`) for a requested slot count.
///
/// A request for zero slots is coerced to one. The result is rounded up to
/// the allocation granularity, so the slot capacity it implies may exceed
/// the request. Returns `None` when the byte size overflows or the doubled
/// span would exceed `isize::MAX`.
pub(crate) fn byte_capacity_for(granularity: usize, items: usize) -> Option<NonZeroUsize> {
    debug_assert!(
        granularity > 0 && granularity % SLOT_SIZE == 0,
        "granularity must be a positive multiple of the slot size"
    );
    let raw = items.max(1).checked_mul(SLOT_SIZE)?;
    let rounded = raw.checked_next_multiple_of(granularity)?;
    if rounded > MAX_VIRTUAL_SPAN / 2 {
        return None;
    }
    NonZeroUsize::new(rounded)
}

/// Builds the double mapping: returns the base of a `2 * byte_cap` span
/// whose second half aliases the physical backing of the first.
///
/// On failure, every mapping created by the attempt has already been
/// released when the error is returned; the caller owns nothing.
pub(crate) fn establish_mirror<V: VirtualMemory>(
    vm: &V,
    byte_cap: NonZeroUsize,
) -> Result<NonNull<c_void>, Errno> {
    debug_assert!(
        byte_cap.get() % vm.granularity() == 0,
        "byte capacity must be granularity-aligned"
    );
    let span = byte_cap.checked_mul(TWO).ok_or(Errno::ENOMEM)?;

    // Pin a collision-free base address for both halves. The reservation is
    // transient; only its address survives the protocol.
    let placeholder = vm.reserve(span)?;
    let tail = unsafe { placeholder.byte_add(byte_cap.get()) };

    // The physical backing that will become the primary half, mapped
    // wherever the kernel likes for now.
    let backing = vm.map_shared(byte_cap).inspect_err(|_| {
        unsafe { vm.unmap(placeholder, span) };
    })?;

    // Vacate the first half, then move the backing onto the pinned address.
    // A failed remap leaves the backing mapped at its old address, and the
    // placeholder's second half is still reserved.
    unsafe { vm.unmap(placeholder, byte_cap) };
    let origin = unsafe { vm.remap(backing, byte_cap, false, placeholder) }.inspect_err(|_| unsafe {
        vm.unmap(backing, byte_cap);
        vm.unmap(tail, byte_cap);
    })?;
    debug_assert_eq!(origin, placeholder);

    // Vacate the second half and map the primary's backing there a second
    // time. `keep_source` is what makes this a mirror rather than a move.
    unsafe { vm.unmap(tail, byte_cap) };
    let mirror = unsafe { vm.remap(origin, byte_cap, true, tail) }.inspect_err(|_| unsafe {
        vm.unmap(origin, byte_cap);
    })?;
    debug_assert_eq!(mirror, tail);

    Ok(origin)
}

/// Releases a span produced by [`establish_mirror`] in one call; the primary
/// and mirror mappings both fall inside it.
///
/// # Safety
///
/// `origin` and `byte_cap` must come from a successful [`establish_mirror`]
/// on the same capability, and the span must not have been released before.
pub(crate) unsafe fn release_mirror<V: VirtualMemory>(
    vm: &V,
    origin: NonNull<c_void>,
    byte_cap: NonZeroUsize,
) {
    unsafe { vm.unmap(origin, byte_cap.saturating_mul(TWO)) };
}
