//! A fixed-capacity double-ended queue of `i64` slots whose live contents
//! are always readable as one contiguous slice.
//!
//! The backing store maps the same physical pages twice, back to back, so a
//! logical window that wraps past the end of the primary half continues
//! seamlessly into the mirror half. Reads and writes never need wrap-around
//! splitting: [`MirroredRingBuffer::as_slice`] is a single unbroken `&[i64]`
//! for every rotation of the contents.
//!
//! Capacity is fixed at construction and rounded up to a whole number of
//! pages. The double mapping is built with `mremap(MREMAP_DONTUNMAP)`, so
//! the crate targets Linux and Android only.
//!
//! ```
//! use mirrored_ring_buffer::MirroredRingBuffer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut rb = MirroredRingBuffer::with_capacity(4)?;
//! rb.push_back(10);
//! rb.push_back(20);
//! rb.push_front(5);
//! assert_eq!(rb.as_slice(), &[5, 10, 20]);
//! assert_eq!(rb.pop_front(), Some(5));
//! assert_eq!(rb.pop_back(), Some(20));
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("mirrored_ring_buffer relies on mremap(MREMAP_DONTUNMAP) and only targets Linux and Android");

mod mirrored;
#[cfg(feature = "serde")]
mod serde;

pub use mirrored::Slot;

use anyhow::Result;
use mirrored::MirroredBuffer;
use std::{
    cmp::Ordering,
    fmt,
    ops::{Deref, DerefMut},
    slice,
};

/// Fixed-capacity deque over a mirrored memory region.
///
/// All operations after construction are plain index bookkeeping over
/// `(head, len)`; only construction and drop talk to the virtual-memory
/// subsystem, and construction is the only fallible point.
///
/// The type is move-only: the double mapping has exactly one owner, moving
/// the value transfers it, and dropping the value releases the whole span
/// once. It is not synchronized; exclusive ownership is the concurrency
/// model, and callers wanting to share it across threads must add their own
/// locking.
pub struct MirroredRingBuffer {
    buf: MirroredBuffer,
    head: usize,
    len: usize,
}

impl MirroredRingBuffer {
    /// Maps a buffer holding at least `capacity` slots.
    ///
    /// Zero is coerced to one. Page rounding usually grants more slots than
    /// requested; [`capacity`](Self::capacity) reports the real number. The
    /// only failure mode is resource acquisition in the virtual-memory
    /// subsystem, surfaced here and never after construction; a failed call
    /// leaves no mapping behind.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self { buf: MirroredBuffer::with_item_capacity(capacity)?, head: 0, len: 0 })
    }

    /// Number of slots the buffer holds when full.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buf.item_capacity()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        debug_assert!(self.len <= self.capacity());
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// The contiguous view: every live element in logical order, as one
    /// unbroken slice even when the window wraps past the end of the
    /// primary half (the tail is then read through the mirror).
    ///
    /// The address is not stable across operations that move the head.
    #[inline(always)]
    pub fn as_slice(&self) -> &[Slot] {
        self.buf.virtual_slice_at(self.head, self.len)
    }

    /// Mutable contiguous view. Writes land in the shared backing and are
    /// visible through both halves.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [Slot] {
        let (head, len) = (self.head, self.len);
        self.buf.virtual_slice_mut_at(head, len)
    }

    /// Appends behind the last element.
    ///
    /// The write needs no wrap handling: `(head + len) % capacity` is always
    /// a valid primary-half index.
    ///
    /// Pushing into a full buffer is a contract violation; it is caught by a
    /// `debug_assert!` and corrupts the logical state in release builds.
    #[inline(always)]
    pub fn push_back(&mut self, value: Slot) {
        debug_assert!(!self.is_full(), "push_back on a full buffer");
        let idx = (self.head + self.len) % self.capacity();
        unsafe { self.buf.write_slot(idx, value) };
        self.len += 1;
    }

    /// Appends in front of the first element.
    ///
    /// Same contract as [`push_back`](Self::push_back): the caller keeps the
    /// buffer from being full.
    #[inline(always)]
    pub fn push_front(&mut self, value: Slot) {
        debug_assert!(!self.is_full(), "push_front on a full buffer");
        let cap = self.capacity();
        self.head = (self.head + cap - 1) % cap;
        unsafe { self.buf.write_slot(self.head, value) };
        self.len += 1;
    }

    /// Checked append; returns a reference to the stored slot, or `None`
    /// when the buffer is full.
    #[inline(always)]
    pub fn try_push_back(&mut self, value: Slot) -> Option<&Slot> {
        if self.is_full() {
            return None;
        }
        self.push_back(value);
        self.as_slice().last()
    }

    /// Checked prepend; returns a reference to the stored slot, or `None`
    /// when the buffer is full.
    #[inline(always)]
    pub fn try_push_front(&mut self, value: Slot) -> Option<&Slot> {
        if self.is_full() {
            return None;
        }
        self.push_front(value);
        self.as_slice().first()
    }

    /// Removes and returns the last element, or `None` when empty. The
    /// vacated slot keeps its bytes.
    #[inline(always)]
    pub fn pop_back(&mut self) -> Option<Slot> {
        if self.is_empty() {
            return None;
        }
        let value = self.as_slice()[self.len - 1];
        self.len -= 1;
        Some(value)
    }

    /// Removes and returns the first element, or `None` when empty.
    #[inline(always)]
    pub fn pop_front(&mut self) -> Option<Slot> {
        if self.is_empty() {
            return None;
        }
        let value = self.as_slice()[0];
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Some(value)
    }

    #[inline(always)]
    pub fn front(&self) -> Option<&Slot> {
        self.as_slice().first()
    }

    #[inline(always)]
    pub fn front_mut(&mut self) -> Option<&mut Slot> {
        self.as_mut_slice().first_mut()
    }

    #[inline(always)]
    pub fn back(&self) -> Option<&Slot> {
        self.as_slice().last()
    }

    #[inline(always)]
    pub fn back_mut(&mut self) -> Option<&mut Slot> {
        self.as_mut_slice().last_mut()
    }

    /// Element at logical position `idx`; position 0 is the front.
    #[inline(always)]
    pub fn get(&self, idx: usize) -> Option<&Slot> {
        self.as_slice().get(idx)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Slot> {
        self.as_mut_slice().get_mut(idx)
    }

    /// Forgets all elements. Slot memory is not cleared.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    #[inline(always)]
    pub fn iter(&self) -> slice::Iter<'_, Slot> {
        self.as_slice().iter()
    }
}

impl Deref for MirroredRingBuffer {
    type Target = [Slot];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for MirroredRingBuffer {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl AsRef<[Slot]> for MirroredRingBuffer {
    #[inline(always)]
    fn as_ref(&self) -> &[Slot] {
        self
    }
}

impl AsMut<[Slot]> for MirroredRingBuffer {
    #[inline(always)]
    fn as_mut(&mut self) -> &mut [Slot] {
        &mut *self
    }
}

impl PartialEq for MirroredRingBuffer {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for MirroredRingBuffer {}

impl PartialOrd for MirroredRingBuffer {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MirroredRingBuffer {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl fmt::Debug for MirroredRingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a MirroredRingBuffer {
    type IntoIter = slice::Iter<'a, Slot>;
    type Item = &'a Slot;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirrored::page_size;
    use std::collections::VecDeque;

    fn slots_per_page() -> usize {
        page_size() / core::mem::size_of::<Slot>()
    }

    #[test]
    fn capacity_is_page_rounded_and_covers_the_request() {
        let spp = slots_per_page();
        for request in [0, 1, 5, spp - 1, spp, spp + 1, 3 * spp] {
            let rb = MirroredRingBuffer::with_capacity(request).unwrap();
            assert!(rb.capacity() >= request.max(1), "request {request}");
            assert_eq!((rb.capacity() * core::mem::size_of::<Slot>()) % page_size(), 0);
            assert!(rb.is_empty());
            assert!(!rb.is_full());
        }
    }

    #[test]
    fn zero_capacity_is_coerced_to_one_page() {
        let rb = MirroredRingBuffer::with_capacity(0).unwrap();
        assert_eq!(rb.capacity(), slots_per_page());
    }

    #[test]
    fn absurd_capacity_fails_without_panicking() {
        assert!(MirroredRingBuffer::with_capacity(usize::MAX / 2).is_err());
    }

    #[test]
    fn push_back_then_pop_front_is_fifo() {
        let mut rb = MirroredRingBuffer::with_capacity(3).unwrap();
        rb.push_back(1);
        rb.push_back(2);
        rb.push_back(3);

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.as_slice(), &[1, 2, 3]);

        assert_eq!(rb.pop_front(), Some(1));
        assert_eq!(rb.pop_front(), Some(2));
        assert_eq!(rb.pop_front(), Some(3));
        assert_eq!(rb.pop_front(), None);
        assert!(rb.is_empty());
    }

    #[test]
    fn push_back_then_pop_back_is_lifo() {
        let mut rb = MirroredRingBuffer::with_capacity(3).unwrap();
        rb.push_back(1);
        rb.push_back(2);
        rb.push_back(3);

        assert_eq!(rb.pop_back(), Some(3));
        assert_eq!(rb.pop_back(), Some(2));
        assert_eq!(rb.pop_back(), Some(1));
        assert_eq!(rb.pop_back(), None);
    }

    #[test]
    fn push_front_reverses_into_pop_front() {
        let mut rb = MirroredRingBuffer::with_capacity(3).unwrap();
        rb.push_front(1);
        rb.push_front(2);
        rb.push_front(3);

        assert_eq!(rb.as_slice(), &[3, 2, 1]);
        assert_eq!(rb.pop_front(), Some(3));
        assert_eq!(rb.pop_front(), Some(2));
        assert_eq!(rb.pop_front(), Some(1));
        assert_eq!(rb.pop_front(), None);
    }

    #[test]
    fn push_front_preserves_order_into_pop_back() {
        let mut rb = MirroredRingBuffer::with_capacity(3).unwrap();
        rb.push_front(1);
        rb.push_front(2);
        rb.push_front(3);

        assert_eq!(rb.pop_back(), Some(1));
        assert_eq!(rb.pop_back(), Some(2));
        assert_eq!(rb.pop_back(), Some(3));
        assert_eq!(rb.pop_back(), None);
    }

    #[test]
    fn fill_to_capacity_stays_contiguous() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        for i in 0..cap {
            rb.push_back(i as Slot);
        }
        assert!(rb.is_full());
        assert_eq!(rb.len(), cap);
        let view = rb.as_slice();
        assert_eq!(view.len(), cap);
        for (i, &v) in view.iter().enumerate() {
            assert_eq!(v, i as Slot);
        }
    }

    #[test]
    fn try_push_reports_full_exactly_at_capacity() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        for i in 0..cap {
            assert_eq!(rb.try_push_back(i as Slot).copied(), Some(i as Slot));
        }
        assert!(rb.try_push_back(-1).is_none());
        assert!(rb.try_push_front(-1).is_none());
        assert_eq!(rb.len(), cap);

        rb.pop_front().unwrap();
        assert_eq!(rb.try_push_front(-1).copied(), Some(-1));
        assert_eq!(rb.front(), Some(&-1));
    }

    // Fill, pop the front twice, push two more. The window then starts at
    // physical index 2 and wraps, so its tail is read through the mirror,
    // yet the view is one unbroken slice.
    #[test]
    fn wrap_scenario_reads_through_the_mirror() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        for i in 0..cap {
            rb.push_back((i as Slot + 1) * 10);
        }
        assert_eq!(rb.pop_front(), Some(10));
        assert_eq!(rb.pop_front(), Some(20));
        rb.push_back(-50);
        rb.push_back(-60);

        assert!(rb.is_full());
        let view = rb.as_slice();
        assert_eq!(view.len(), cap);
        assert_eq!(view[0], 30);
        for (i, &v) in view[..cap - 2].iter().enumerate() {
            assert_eq!(v, (i as Slot + 3) * 10);
        }
        // The last two logically live at primary indices 0 and 1, reached
        // here via mirror indices cap and cap + 1.
        assert_eq!(view[cap - 2], -50);
        assert_eq!(view[cap - 1], -60);
    }

    #[test]
    fn long_rotation_matches_a_vecdeque_model() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        let mut model = VecDeque::with_capacity(cap);
        for i in 0..cap {
            rb.push_back(i as Slot);
            model.push_back(i as Slot);
        }
        // Rotate through the physical buffer several times over.
        for round in 0..3 * cap {
            assert_eq!(rb.pop_front(), model.pop_front());
            let value = (round * 7) as Slot;
            rb.push_back(value);
            model.push_back(value);
            if round % 97 == 0 {
                assert_eq!(rb.as_slice(), model.make_contiguous());
            }
        }
        assert_eq!(rb.as_slice(), model.make_contiguous());
    }

    #[test]
    fn random_ops_match_a_vecdeque_model() {
        fastrand::seed(0x5EED);
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        let mut model: VecDeque<Slot> = VecDeque::new();

        for step in 0..20_000 {
            match fastrand::u8(0..5) {
                0 if !rb.is_full() => {
                    let v = fastrand::i64(..);
                    rb.push_back(v);
                    model.push_back(v);
                }
                1 if !rb.is_full() => {
                    let v = fastrand::i64(..);
                    rb.push_front(v);
                    model.push_front(v);
                }
                2 => assert_eq!(rb.pop_back(), model.pop_back()),
                3 => assert_eq!(rb.pop_front(), model.pop_front()),
                _ => {
                    assert_eq!(rb.len(), model.len());
                    assert_eq!(rb.front(), model.front());
                    assert_eq!(rb.back(), model.back());
                }
            }
            assert!(model.len() <= cap);
            if step % 503 == 0 {
                assert_eq!(rb.as_slice(), model.make_contiguous());
            }
        }
        assert_eq!(rb.as_slice(), model.make_contiguous());
    }

    #[test]
    fn get_and_mutation_through_the_view() {
        let mut rb = MirroredRingBuffer::with_capacity(4).unwrap();
        rb.push_back(1);
        rb.push_back(2);
        rb.push_back(3);

        assert_eq!(rb.get(1), Some(&2));
        assert_eq!(rb.get(3), None);
        *rb.get_mut(1).unwrap() = 7;
        assert_eq!(rb.as_slice(), &[1, 7, 3]);

        // Deref gives the whole slice API.
        assert_eq!(rb[2], 3);
        assert_eq!(rb.iter().sum::<Slot>(), 11);
    }

    #[test]
    fn writes_through_a_wrapped_view_land_in_the_backing() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        let cap = rb.capacity();
        for i in 0..cap {
            rb.push_back(i as Slot);
        }
        rb.pop_front();
        rb.pop_front();
        rb.push_back(0);
        rb.push_back(0);

        // The last logical element is physically at primary index 1 but the
        // view addresses it through the mirror half.
        *rb.back_mut().unwrap() = 424242;
        for _ in 0..cap - 1 {
            rb.pop_front();
        }
        assert_eq!(rb.pop_front(), Some(424242));
    }

    #[test]
    fn clear_resets_without_touching_capacity() {
        let mut rb = MirroredRingBuffer::with_capacity(8).unwrap();
        let cap = rb.capacity();
        rb.push_back(1);
        rb.push_front(2);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.capacity(), cap);
        rb.push_back(9);
        assert_eq!(rb.as_slice(), &[9]);
    }

    #[test]
    fn moves_transfer_the_mapping_exactly_once() {
        let mut rb = MirroredRingBuffer::with_capacity(8).unwrap();
        rb.push_back(1);
        rb.push_back(2);

        // Plain move: the source binding is dead, the mapping lives on.
        let moved = rb;
        assert_eq!(moved.as_slice(), &[1, 2]);

        // Assignment drops the previous owner's mapping, once.
        let mut owner = MirroredRingBuffer::with_capacity(8).unwrap();
        owner.push_back(3);
        owner = moved;
        assert_eq!(owner.as_slice(), &[1, 2]);

        // Replace hands the old value out instead of dropping it in place.
        let old = std::mem::replace(&mut owner, MirroredRingBuffer::with_capacity(1).unwrap());
        assert_eq!(old.as_slice(), &[1, 2]);
        assert!(owner.is_empty());
        drop(old);
        drop(owner);
    }

    #[test]
    fn buffers_move_between_threads() {
        let mut rb = MirroredRingBuffer::with_capacity(8).unwrap();
        rb.push_back(11);
        let handle = std::thread::spawn(move || {
            rb.push_back(22);
            rb.iter().sum::<Slot>()
        });
        assert_eq!(handle.join().unwrap(), 33);
    }

    #[test]
    fn eq_ord_and_debug_follow_the_contents() {
        let mut a = MirroredRingBuffer::with_capacity(4).unwrap();
        let mut b = MirroredRingBuffer::with_capacity(4).unwrap();
        a.push_back(1);
        a.push_back(2);
        b.push_front(2);
        b.push_front(1);

        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), "[1, 2]");

        b.push_back(3);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "push_back on a full buffer")]
    fn debug_builds_catch_overfilling() {
        let mut rb = MirroredRingBuffer::with_capacity(1).unwrap();
        for i in 0..=rb.capacity() {
            rb.push_back(i as Slot);
        }
    }
}
