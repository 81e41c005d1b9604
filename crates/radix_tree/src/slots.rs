//! A preallocated buffer that many threads write into concurrently, each
//! at a distinct index handed out by an atomic cursor.
//!
//! This is the CPU realisation of the group-local prefix-sum / single
//! atomic-add allocator described in the design: a chunk of work computes
//! its local offsets, reserves a contiguous range with one `fetch_add`,
//! then writes each element at `base + local_offset` through a raw
//! pointer. Every index is written at most once across the lifetime of
//! the buffer, so concurrent writers never alias.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-capacity buffer with disjoint concurrent writes and a shared
/// atomic length cursor.
pub struct Slots<T> {
    data: UnsafeCell<Vec<T>>,
    cursor: AtomicU32,
}

// Safety: every write through `write_at` targets an index reserved
// exclusively to the calling thread via `reserve`, and no two reservations
// ever overlap (the cursor only ever grows by disjoint, non-overlapping
// amounts). Reads only happen after all writers have retired.
unsafe impl<T: Send> Sync for Slots<T> {}

impl<T: Copy> Slots<T> {
    /// Creates a buffer with `capacity` preallocated, uninitialised-in-effect
    /// slots (filled with `fill` so reads before a write see a defined
    /// value rather than undefined memory).
    pub fn with_capacity(capacity: usize, fill: T) -> Self {
        Slots {
            data: UnsafeCell::new(vec![fill; capacity]),
            cursor: AtomicU32::new(0),
        }
    }

    /// Reserves `count` contiguous slots, returning the base index of the
    /// reservation. This is the single atomic-add per group.
    pub fn reserve(&self, count: u32) -> u32 {
        self.cursor.fetch_add(count, Ordering::Relaxed)
    }

    /// Current length of the buffer (how many slots have been reserved).
    pub fn len(&self) -> u32 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Capacity of the underlying storage.
    pub fn capacity(&self) -> usize {
        // Safety: no concurrent resize ever happens; `len()` only reads
        // a `Vec`'s length field that's fixed for the buffer's lifetime.
        unsafe { (*self.data.get()).len() }
    }

    /// Writes `value` at `index`. Safety: the caller must own `index`
    /// exclusively (i.e. it came from a `reserve` call that hasn't been
    /// written to yet by any other thread) and `index < capacity()`.
    pub unsafe fn write_at(&self, index: u32, value: T) {
        debug_assert!((index as usize) < self.capacity());
        let ptr = (*self.data.get()).as_mut_ptr();
        *ptr.add(index as usize) = value;
    }

    /// Resets the cursor to zero without shrinking the backing storage.
    /// Host-only; must not be called while any writer may still be active.
    pub fn reset(&mut self) {
        *self.cursor.get_mut() = 0;
    }

    /// Grows the backing storage so `capacity() >= n`, filling new slots
    /// with `fill`. Host-only, called between levels.
    pub fn grow(&mut self, n: usize, fill: T) {
        let data = self.data.get_mut();
        if data.len() < n {
            data.resize(n, fill);
        }
    }

    /// Consumes the buffer, returning a `Vec` truncated to the number of
    /// slots actually reserved.
    pub fn into_vec(self) -> Vec<T> {
        let len = self.len() as usize;
        let mut data = self.data.into_inner();
        data.truncate(len);
        data
    }

    /// A read-only view of the reserved prefix. Host-only, called after a
    /// barrier when no writers remain active.
    pub fn as_slice(&self) -> &[T] {
        let len = self.len() as usize;
        // Safety: called only after the barrier in `Driver`, with no
        // outstanding writers, so there's no concurrent mutation.
        unsafe { &(*self.data.get())[..len] }
    }

    /// A read-only view of the whole backing storage, ignoring the cursor.
    /// For callers (like a `TreeSink`) that address slots directly rather
    /// than through `reserve`, and therefore track their own valid length.
    /// Host-only, same barrier requirement as `as_slice`.
    pub fn as_full_slice(&self) -> &[T] {
        unsafe { &*self.data.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_write_round_trips() {
        let slots: Slots<u32> = Slots::with_capacity(8, 0);
        let base = slots.reserve(3);
        assert_eq!(base, 0);
        for i in 0..3 {
            unsafe { slots.write_at(base + i, 100 + i) };
        }
        assert_eq!(slots.as_slice(), &[100, 101, 102]);

        let base2 = slots.reserve(2);
        assert_eq!(base2, 3);
    }

    #[test]
    fn grow_preserves_written_prefix() {
        let mut slots: Slots<u32> = Slots::with_capacity(2, 0);
        let base = slots.reserve(2);
        unsafe {
            slots.write_at(base, 1);
            slots.write_at(base + 1, 2);
        }
        slots.grow(10, 0);
        assert_eq!(slots.capacity(), 10);
        assert_eq!(slots.as_slice(), &[1, 2]);
    }
}
