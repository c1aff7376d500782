//! Slot storage: a flat array of entry slots plus a per-slot occupancy map.
//!
//! Slots carry no identity beyond their position. Entries are moved in and
//! out by value, so anything stored here must be relocatable by an ordinary
//! Rust move.

use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Per-slot occupancy bookkeeping.
///
/// A slot is either virgin (free) or used. The storage never inspects entry
/// memory to decide this; the occupancy map is the single source of truth.
pub trait Occupancy {
    /// Creates a map for `len` slots, all virgin.
    fn with_len(len: usize) -> Self;

    /// Number of slots tracked.
    fn len(&self) -> usize;

    /// Whether `slot` holds an entry.
    fn is_used(&self, slot: usize) -> bool;

    /// Marks `slot` as holding an entry.
    fn set_used(&mut self, slot: usize);

    /// Marks `slot` as virgin.
    fn set_free(&mut self, slot: usize);

    /// Marks every slot as virgin.
    fn clear_all(&mut self);

    /// Lowest-indexed virgin slot, if any.
    fn first_free(&self) -> Option<usize> {
        (0..self.len()).find(|&slot| !self.is_used(slot))
    }
}

const WORD_BITS: usize = u64::BITS as usize;

/// Occupancy packed one bit per slot.
#[derive(Clone, Debug)]
pub struct BitStatus {
    words: Box<[u64]>,
    len: usize,
}

impl Occupancy for BitStatus {
    fn with_len(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(WORD_BITS)].into_boxed_slice(),
            len,
        }
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    fn is_used(&self, slot: usize) -> bool {
        debug_assert!(slot < self.len);
        self.words[slot / WORD_BITS] & (1 << (slot % WORD_BITS)) != 0
    }

    #[inline(always)]
    fn set_used(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot / WORD_BITS] |= 1 << (slot % WORD_BITS);
    }

    #[inline(always)]
    fn set_free(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot / WORD_BITS] &= !(1 << (slot % WORD_BITS));
    }

    fn clear_all(&mut self) {
        self.words.fill(0);
    }

    fn first_free(&self) -> Option<usize> {
        // Bits past `len` in the last word are always zero, so the bound check
        // below is what rejects them.
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(index, word)| index * WORD_BITS + word.trailing_ones() as usize)
            .filter(|&slot| slot < self.len)
    }
}

/// Occupancy stored as one `bool` per slot.
///
/// Uses eight times the memory of [`BitStatus`] but avoids the shift and mask
/// on every probe.
#[derive(Clone, Debug)]
pub struct ByteStatus {
    used: Box<[bool]>,
}

impl Occupancy for ByteStatus {
    fn with_len(len: usize) -> Self {
        Self {
            used: vec![false; len].into_boxed_slice(),
        }
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.used.len()
    }

    #[inline(always)]
    fn is_used(&self, slot: usize) -> bool {
        self.used[slot]
    }

    #[inline(always)]
    fn set_used(&mut self, slot: usize) {
        self.used[slot] = true;
    }

    #[inline(always)]
    fn set_free(&mut self, slot: usize) {
        self.used[slot] = false;
    }

    fn clear_all(&mut self) {
        self.used.fill(false);
    }

    fn first_free(&self) -> Option<usize> {
        self.used.iter().position(|used| !used)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "byte-status")] {
        /// Occupancy map used when none is named explicitly.
        pub type DefaultStatus = ByteStatus;
    } else {
        /// Occupancy map used when none is named explicitly.
        pub type DefaultStatus = BitStatus;
    }
}

/// Fixed-length array of possibly-uninitialized slots.
///
/// Every accessor checks occupancy, so a slot is only ever read while it
/// holds an initialized entry.
pub(crate) struct Slots<T, O: Occupancy> {
    ptr: NonNull<T>,
    len: usize,
    status: O,
    _phantom: PhantomData<T>,
}

impl<T, O: Occupancy> Slots<T, O> {
    pub(crate) fn with_len(len: usize) -> Self {
        let layout = Layout::array::<T>(len).expect("capacity overflow");
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: The layout has a non-zero size. A null return is handed to
            // `handle_alloc_error`, which never returns.
            unsafe {
                let raw = alloc::alloc::alloc(layout);
                if raw.is_null() {
                    handle_alloc_error(layout);
                }
                NonNull::new_unchecked(raw.cast())
            }
        };

        Self {
            ptr,
            len,
            status: O::with_len(len),
            _phantom: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub(crate) fn is_used(&self, slot: usize) -> bool {
        self.status.is_used(slot)
    }

    pub(crate) fn first_free(&self) -> Option<usize> {
        self.status.first_free()
    }

    #[inline(always)]
    pub(crate) fn get(&self, slot: usize) -> Option<&T> {
        if slot < self.len && self.status.is_used(slot) {
            // SAFETY: `slot` is in bounds and its occupancy bit says it holds an
            // initialized entry.
            Some(unsafe { &*self.ptr.as_ptr().add(slot) })
        } else {
            None
        }
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        if slot < self.len && self.status.is_used(slot) {
            // SAFETY: As in `get`; `&mut self` guarantees exclusivity.
            Some(unsafe { &mut *self.ptr.as_ptr().add(slot) })
        } else {
            None
        }
    }

    /// Reads the entry at an occupied slot.
    ///
    /// Panics if the slot is virgin.
    #[inline(always)]
    pub(crate) fn at(&self, slot: usize) -> &T {
        match self.get(slot) {
            Some(entry) => entry,
            None => panic!("slot {slot} is virgin"),
        }
    }

    /// Places `entry` into a virgin slot and marks it used.
    pub(crate) fn write(&mut self, slot: usize, entry: T) {
        assert!(slot < self.len && !self.status.is_used(slot));
        // SAFETY: `slot` is in bounds and virgin, so nothing is overwritten.
        unsafe { self.ptr.as_ptr().add(slot).write(entry) };
        self.status.set_used(slot);
    }

    /// Moves the entry out of an occupied slot, leaving it virgin.
    pub(crate) fn take(&mut self, slot: usize) -> T {
        assert!(slot < self.len && self.status.is_used(slot));
        self.status.set_free(slot);
        // SAFETY: The slot was occupied; it is now marked virgin so the entry is
        // read exactly once.
        unsafe { self.ptr.as_ptr().add(slot).read() }
    }

    /// Moves the entry at `from` into the virgin slot `to`.
    pub(crate) fn relocate(&mut self, to: usize, from: usize) {
        assert!(to < self.len && from < self.len);
        assert!(!self.status.is_used(to) && self.status.is_used(from));
        // SAFETY: Both indices are in bounds and distinct (one is used, the
        // other is not). Ownership moves from `from` to `to` and the occupancy
        // bits follow.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(from),
                self.ptr.as_ptr().add(to),
                1,
            );
        }
        self.status.set_free(from);
        self.status.set_used(to);
    }

    /// Exchanges the contents and occupancy of two slots.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        assert!(a < self.len && b < self.len);
        if a == b {
            return;
        }
        match (self.status.is_used(a), self.status.is_used(b)) {
            (true, true) => {
                // SAFETY: Distinct in-bounds slots, both initialized.
                unsafe { core::ptr::swap(self.ptr.as_ptr().add(a), self.ptr.as_ptr().add(b)) }
            }
            (true, false) => self.relocate(b, a),
            (false, true) => self.relocate(a, b),
            (false, false) => {}
        }
    }

    /// Drops every entry and marks all slots virgin.
    pub(crate) fn clear(&mut self) {
        if core::mem::needs_drop::<T>() {
            for slot in 0..self.len {
                if self.status.is_used(slot) {
                    // SAFETY: Occupied slot; it is marked virgin right after,
                    // so it is dropped once.
                    unsafe { self.ptr.as_ptr().add(slot).drop_in_place() }
                }
            }
        }
        self.status.clear_all();
    }

    /// Slot indices currently holding entries, in ascending order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&slot| self.status.is_used(slot))
    }

    #[inline(always)]
    pub(crate) fn as_ptr(&self, slot: usize) -> *const T {
        debug_assert!(slot < self.len);
        self.ptr.as_ptr().wrapping_add(slot)
    }
}

impl<T, O: Occupancy> Drop for Slots<T, O> {
    fn drop(&mut self) {
        self.clear();
        let layout = Layout::array::<T>(self.len).expect("capacity overflow");
        if layout.size() != 0 {
            // SAFETY: `ptr` came from `alloc` with this exact layout.
            unsafe { alloc::alloc::dealloc(self.ptr.as_ptr().cast(), layout) }
        }
    }
}

impl<T: Clone, O: Occupancy> Clone for Slots<T, O> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_len(self.len);
        for slot in self.occupied().collect::<Vec<_>>() {
            copy.write(slot, self.at(slot).clone());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;

    use super::*;

    fn exercise_occupancy<O: Occupancy>() {
        let mut status = O::with_len(130);
        assert_eq!(status.len(), 130);
        assert_eq!(status.first_free(), Some(0));

        for slot in 0..100 {
            status.set_used(slot);
        }
        assert_eq!(status.first_free(), Some(100));
        assert!(status.is_used(64));

        status.set_free(64);
        assert!(!status.is_used(64));
        assert_eq!(status.first_free(), Some(64));

        for slot in 0..130 {
            status.set_used(slot);
        }
        assert_eq!(status.first_free(), None);

        status.clear_all();
        assert_eq!(status.first_free(), Some(0));
    }

    #[test]
    fn bit_status_tracks_slots() {
        exercise_occupancy::<BitStatus>();
    }

    #[test]
    fn byte_status_tracks_slots() {
        exercise_occupancy::<ByteStatus>();
    }

    #[test]
    fn bit_status_ignores_tail_bits() {
        let mut status = BitStatus::with_len(3);
        for slot in 0..3 {
            status.set_used(slot);
        }
        assert_eq!(status.first_free(), None);
    }

    #[test]
    fn write_take_relocate() {
        let mut slots: Slots<String, BitStatus> = Slots::with_len(8);
        slots.write(2, "two".to_string());
        slots.write(5, "five".to_string());
        assert_eq!(slots.get(2).map(String::as_str), Some("two"));
        assert!(slots.get(3).is_none());
        assert!(slots.get(100).is_none());

        slots.relocate(3, 2);
        assert!(!slots.is_used(2));
        assert_eq!(slots.at(3), "two");

        slots.swap(3, 5);
        assert_eq!(slots.at(3), "five");
        assert_eq!(slots.at(5), "two");

        slots.swap(0, 5);
        assert_eq!(slots.at(0), "two");
        assert!(!slots.is_used(5));

        assert_eq!(slots.take(0), "two");
        assert_eq!(slots.occupied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn drops_every_live_entry_once() {
        let marker = Rc::new(());
        {
            let mut slots: Slots<Rc<()>, ByteStatus> = Slots::with_len(16);
            for slot in (0..16).step_by(3) {
                slots.write(slot, Rc::clone(&marker));
            }
            slots.relocate(1, 0);
            let taken = slots.take(3);
            drop(taken);
            assert_eq!(Rc::strong_count(&marker), 6);

            let cloned = slots.clone();
            assert_eq!(Rc::strong_count(&marker), 11);
            drop(cloned);

            slots.clear();
            assert_eq!(Rc::strong_count(&marker), 1);
            slots.write(7, Rc::clone(&marker));
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn zero_length_storage() {
        let slots: Slots<u64, BitStatus> = Slots::with_len(0);
        assert_eq!(slots.len(), 0);
        assert_eq!(slots.first_free(), None);
        assert_eq!(slots.occupied().count(), 0);
    }
}
