//! Mirrored memory layout.
//!
//! The virtual-memory capability surface, its Linux implementation, the
//! sizing/construction protocol, and the owning handle for the finished
//! two-region mapping.

mod buffer;
mod layout;
mod vm;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use linux::SysVm;
#[cfg(all(test, any(target_os = "linux", target_os = "android")))]
pub(crate) use linux::page_size;

pub(crate) use buffer::MirroredBuffer;

/// The fixed element slot: one signed 64-bit integer.
pub type Slot = i64;

pub(crate) const SLOT_SIZE: usize = core::mem::size_of::<Slot>();

/// Upper bound on the total virtual span (both halves together).
pub(crate) const MAX_VIRTUAL_SPAN: usize = isize::MAX as usize;
