//! Capability surface over the host's virtual-memory subsystem.
//!
//! The construction protocol in [`layout`](super::layout) is written against
//! this trait so it can be driven by a fake that records mappings in a
//! ledger instead of touching the MMU.

use nix::errno::Errno;
use std::{ffi::c_void, num::NonZeroUsize, ptr::NonNull};

/// The minimal set of virtual-memory operations the mirrored layout needs.
///
/// Addresses returned by `reserve`/`map_shared`/`remap` are opaque until the
/// protocol finishes; a fake implementation may hand out synthetic addresses
/// that are never dereferenced.
pub(crate) trait VirtualMemory {
    /// Allocation granularity. Every length handed to the other operations
    /// must be a multiple of this.
    fn granularity(&self) -> usize;

    /// Reserves `len` bytes of address space with no access rights,
    /// committing no memory.
    fn reserve(&self, len: NonZeroUsize) -> Result<NonNull<c_void>, Errno>;

    /// Creates `len` bytes of fresh anonymous, shared, read/write backing.
    ///
    /// Shared (not private) is required so the backing can later be mapped
    /// at a second address without copy-on-write splitting the two views.
    fn map_shared(&self, len: NonZeroUsize) -> Result<NonNull<c_void>, Errno>;

    /// Moves the mapping at `old` to exactly `at`, keeping its length.
    ///
    /// With `keep_source` the mapping at `old` stays valid and the new
    /// mapping aliases the same physical backing; without it the source is
    /// consumed. On failure the source mapping is left untouched.
    ///
    /// # Safety
    ///
    /// `old` must denote a live mapping of `len` bytes created through this
    /// capability, and `[at, at + len)` must lie in address space the caller
    /// controls.
    unsafe fn remap(
        &self,
        old: NonNull<c_void>,
        len: NonZeroUsize,
        keep_source: bool,
        at: NonNull<c_void>,
    ) -> Result<NonNull<c_void>, Errno>;

    /// Releases `[addr, addr + len)`. The range may cover several mappings
    /// or holes; release is not observable as fallible by callers.
    ///
    /// # Safety
    ///
    /// The range must not contain mappings owned by anyone else.
    unsafe fn unmap(&self, addr: NonNull<c_void>, len: NonZeroUsize);
}
