//! Capacity control: native table sizes, load thresholds and cyclic
//! addressing.
//!
//! Growth is decided only on the insertion path, before probing starts.
//! Shrinking is decided only when a caller asks for it through
//! [`Controller::maybe_shrink`]. A mutating cursor therefore never sees its
//! storage reallocated between two removals it performs itself.

use crate::error::Error;
use crate::error::Result;

/// Construction-time configuration of a table.
///
/// # Examples
///
/// ```rust
/// use probe_hash::Params;
///
/// let params = Params::default().grow_load(80).shrink_load(10).ordered(true);
/// assert!(params.validate().is_ok());
///
/// assert!(Params::default().grow_load(100).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    grow_load: u8,
    shrink_load: u8,
    ordered: bool,
    min_native_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            grow_load: 75,
            shrink_load: 20,
            ordered: false,
            min_native_size: 8,
        }
    }
}

impl Params {
    /// Load percentage above which an insertion grows the table first.
    ///
    /// Must be in `1..=99` so that a table never fills up completely.
    pub fn grow_load(mut self, percent: u8) -> Self {
        self.grow_load = percent;
        self
    }

    /// Load percentage below which [`trim`] shrinks the table. Zero disables
    /// shrinking.
    ///
    /// [`trim`]: crate::HashTable::trim
    pub fn shrink_load(mut self, percent: u8) -> Self {
        self.shrink_load = percent;
        self
    }

    /// Keeps colliding entries sorted by initial place so that failed lookups
    /// can stop early.
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Smallest slot count allocated for a non-empty table. Rounded up to a
    /// power of two.
    pub fn min_native_size(mut self, slots: usize) -> Self {
        self.min_native_size = slots;
        self
    }

    /// Whether ordered mode is enabled.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Checks that the thresholds leave room for hysteresis and that the
    /// table can never become full.
    pub fn validate(&self) -> Result<()> {
        if self.grow_load == 0 || self.grow_load >= 100 {
            return Err(Error::InvalidParams("grow load must be in 1..=99"));
        }
        if u16::from(self.shrink_load) * 2 >= u16::from(self.grow_load) {
            return Err(Error::InvalidParams(
                "shrink load must be less than half the grow load",
            ));
        }
        if self.min_native_size < 2 {
            return Err(Error::InvalidParams("minimum native size must be at least 2"));
        }
        if self.min_native_size.checked_next_power_of_two().is_none() {
            return Err(Error::InvalidParams("minimum native size is too large"));
        }
        Ok(())
    }
}

/// Tracks the native size and the occupied count of one table.
#[derive(Debug, Clone)]
pub(crate) struct Controller {
    params: Params,
    native: usize,
    count: usize,
}

impl Controller {
    pub(crate) fn new(params: Params, native: usize) -> Self {
        debug_assert!(params.validate().is_ok());
        debug_assert!(native == 0 || native.is_power_of_two());
        Self {
            params,
            native,
            count: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn params(&self) -> &Params {
        &self.params
    }

    #[inline(always)]
    pub(crate) fn native_size(&self) -> usize {
        self.native
    }

    #[inline(always)]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub(crate) fn is_ordered(&self) -> bool {
        self.params.ordered
    }

    /// Entries that fit in `native` slots without triggering growth.
    #[inline(always)]
    fn capacity_of(&self, native: usize) -> usize {
        ((native as u128 * u128::from(self.params.grow_load)) / 100) as usize
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity_of(self.native)
    }

    /// Smallest native size holding `capacity` entries without growth, or 0
    /// for an empty request.
    pub(crate) fn native_size_for(&self, capacity: usize) -> usize {
        if capacity == 0 {
            return 0;
        }
        let mut native = self.params.min_native_size.next_power_of_two();
        while self.capacity_of(native) < capacity {
            native = native.checked_mul(2).expect("capacity overflow");
        }
        native
    }

    #[inline(always)]
    pub(crate) fn initial_place(&self, hash: u64) -> usize {
        debug_assert!(self.native > 0);
        (hash as usize) & (self.native - 1)
    }

    #[inline(always)]
    pub(crate) fn next_place(&self, slot: usize) -> usize {
        (slot + 1) & (self.native - 1)
    }

    #[inline(always)]
    pub(crate) fn prev_place(&self, slot: usize) -> usize {
        slot.wrapping_sub(1) & (self.native - 1)
    }

    /// Called before an insertion starts probing. Returns the native size to
    /// rehash into when one more entry would exceed the grow threshold.
    #[inline]
    pub(crate) fn about_to_insert(&self) -> Option<usize> {
        if self.count < self.capacity() {
            return None;
        }
        let mut native = self
            .native
            .saturating_mul(2)
            .max(self.params.min_native_size.next_power_of_two());
        while self.capacity_of(native) <= self.count {
            native = native.checked_mul(2).expect("capacity overflow");
        }
        Some(native)
    }

    #[inline(always)]
    pub(crate) fn note_inserted(&mut self) {
        self.count += 1;
        debug_assert!(self.count < self.native);
    }

    #[inline(always)]
    pub(crate) fn note_removed(&mut self) {
        debug_assert!(self.count > 0);
        self.count -= 1;
    }

    /// Returns a smaller native size when occupancy has dropped below the
    /// shrink threshold.
    pub(crate) fn maybe_shrink(&self) -> Option<usize> {
        if self.native == 0 {
            return None;
        }
        if self.count as u128 * 100 >= self.native as u128 * u128::from(self.params.shrink_load) {
            return None;
        }
        let target = self.native_size_for(self.count.saturating_mul(2));
        (target < self.native).then_some(target)
    }

    /// Whether `used` occupied slots agree with the recorded count.
    pub(crate) fn is_consistent(&self, used: usize) -> bool {
        used == self.count && (self.native == 0 || self.count < self.native)
    }
}
