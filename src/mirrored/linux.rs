//! Linux implementation of the [`VirtualMemory`] capability.
//!
//! The mirror step relies on `mremap(MREMAP_DONTUNMAP)`, which leaves the
//! source mapping in place while the same pages appear at the destination.
//! That flag exists only on Linux (5.7+) and Android, which is why the crate
//! is gated to those targets.

use super::vm::VirtualMemory;
use nix::{
    errno::Errno,
    sys::mman::{mmap_anonymous, mremap, munmap, MRemapFlags, MapFlags, ProtFlags},
    unistd::{sysconf, SysconfVar},
};
use std::{
    ffi::c_void,
    num::NonZeroUsize,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

/// The host kernel's virtual-memory subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SysVm;

/// Page size as reported by `sysconf`, cached after the first lookup.
pub(crate) fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);
    let cached = PAGE_SIZE.load(Ordering::Acquire);
    if cached != 0 {
        return cached;
    }
    let probed = sysconf(SysconfVar::PAGE_SIZE).ok().flatten().expect("failed to obtain page size") as usize;
    match PAGE_SIZE.compare_exchange(0, probed, Ordering::Release, Ordering::Acquire) {
        Ok(_) => probed,
        Err(racing) => racing,
    }
}

impl VirtualMemory for SysVm {
    #[inline]
    fn granularity(&self) -> usize {
        page_size()
    }

    fn reserve(&self, len: NonZeroUsize) -> Result<NonNull<c_void>, Errno> {
        unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE,
            )
        }
    }

    fn map_shared(&self, len: NonZeroUsize) -> Result<NonNull<c_void>, Errno> {
        unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
    }

    unsafe fn remap(
        &self,
        old: NonNull<c_void>,
        len: NonZeroUsize,
        keep_source: bool,
        at: NonNull<c_void>,
    ) -> Result<NonNull<c_void>, Errno> {
        let mut flags = MRemapFlags::MREMAP_MAYMOVE | MRemapFlags::MREMAP_FIXED;
        if keep_source {
            flags |= MRemapFlags::MREMAP_DONTUNMAP;
        }
        unsafe { mremap(old, len.get(), len.get(), flags, Some(at)) }
    }

    unsafe fn unmap(&self, addr: NonNull<c_void>, len: NonZeroUsize) {
        // A failure here would mean the layout bookkeeping handed us a range
        // we do not own.
        let released = unsafe { munmap(addr, len.get()) };
        debug_assert!(released.is_ok(), "munmap({addr:p}, {len}) failed: {released:?}");
    }
}
