use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::ops::Deref;
use core::ops::DerefMut;

use rand::Rng;

use crate::controller::Params;
use crate::error::Error;
use crate::error::Result;
use crate::hash_table::CursorMut;
use crate::hash_table::HashTable;
use crate::hash_table::Iter;
use crate::sampling;
use crate::storage::DefaultStatus;
use crate::storage::Occupancy;
use crate::weight::Weight;
use crate::weight::WeightFn;

/// A hash map that keeps the sum of a per-entry weight up to date, so that
/// entries can be drawn with probability proportional to their weight.
///
/// The weight of an entry is derived from its value by `F`. Every write to a
/// value goes through a [`ValueMut`] guard, which applies the weight change
/// to the running total when it is dropped.
///
/// Weighted sampling scans the occupied slots and is linear in the table
/// size. Uniform sampling is expected constant time.
///
/// # Examples
///
/// ```rust
/// use probe_hash::DefaultHashBuilder;
/// use probe_hash::Identity;
/// use probe_hash::WeightSumMap;
///
/// let mut degrees: WeightSumMap<u32, u64, Identity, DefaultHashBuilder> =
///     WeightSumMap::new(Identity);
/// degrees.insert(1, 3);
/// degrees.insert(2, 5);
/// assert_eq!(degrees.total_weight(), 8);
///
/// *degrees.get_mut(&1).unwrap() += 4;
/// assert_eq!(degrees.total_weight(), 12);
/// ```
pub struct WeightSumMap<K, V, F, S, O = DefaultStatus>
where
    F: WeightFn<V>,
    O: Occupancy,
{
    table: HashTable<K, V, S, O>,
    weigh: F,
    total: F::Weight,
}

impl<K, V, F, S, O> Debug for WeightSumMap<K, V, F, S, O>
where
    K: Debug,
    V: Debug,
    F: WeightFn<V>,
    O: Occupancy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WeightSumMap")
            .field("total", &self.total)
            .field("entries", &self.table)
            .finish()
    }
}

impl<K, V, F, S, O> Clone for WeightSumMap<K, V, F, S, O>
where
    K: Clone,
    V: Clone,
    F: WeightFn<V> + Clone,
    S: Clone,
    O: Occupancy,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            weigh: self.weigh.clone(),
            total: self.total,
        }
    }
}

impl<K, V, F, S, O> WeightSumMap<K, V, F, S, O>
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher,
    O: Occupancy,
{
    /// Creates an empty map weighing values with `weigh`.
    pub fn with_hasher(weigh: F, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_hasher(hash_builder),
            weigh,
            total: F::Weight::ZERO,
        }
    }

    /// Creates a map with explicit table parameters.
    ///
    /// Returns [`Error::InvalidParams`] if `params` fails validation.
    pub fn with_params_and_hasher(
        capacity: usize,
        params: Params,
        weigh: F,
        hash_builder: S,
    ) -> Result<Self> {
        Ok(Self {
            table: HashTable::with_params_and_hasher(capacity, params, hash_builder)?,
            weigh,
            total: F::Weight::ZERO,
        })
    }

    /// Read-only access to the underlying table.
    pub fn as_table(&self) -> &HashTable<K, V, S, O> {
        &self.table
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The maintained sum of all entry weights.
    pub fn total_weight(&self) -> F::Weight {
        self.total
    }

    /// Removes every entry and resets the total to zero.
    pub fn clear(&mut self) {
        self.table.clear();
        self.total = F::Weight::ZERO;
    }

    /// Returns `true` if the map holds `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(key)
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get(key)
    }

    /// Returns the weight of the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the key is absent.
    pub fn weight_of<Q>(&self, key: &Q) -> Result<F::Weight>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table
            .get(key)
            .map(|value| self.weigh.weight(value))
            .ok_or(Error::NotFound)
    }

    /// Inserts `key` with `value`, returning the previous value if present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let weight = self.weigh.weight(&value);
        let old = self.table.insert(key, value);
        self.total = match &old {
            Some(old) => (self.total - self.weigh.weight(old)) + weight,
            None => self.total + weight,
        };
        old
    }

    /// Returns a write guard for the value stored under `key`.
    ///
    /// The total weight is updated when the guard is dropped.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<ValueMut<'_, V, F>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.table.find(key)?;
        self.slot_mut(slot)
    }

    /// Returns a write guard for the value at an occupied `slot`.
    pub fn slot_mut(&mut self, slot: usize) -> Option<ValueMut<'_, V, F>> {
        let (_, value) = self.table.slot_mut(slot)?;
        Some(ValueMut::new(value, &self.weigh, &mut self.total))
    }

    /// Returns a write guard for the value under `key`, inserting
    /// `default()` first if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::WeightSumMap;
    ///
    /// let mut counts: WeightSumMap<&str, u32, _, DefaultHashBuilder> =
    ///     WeightSumMap::new(|n: &u32| *n);
    /// for word in ["a", "b", "a"] {
    ///     *counts.get_or_insert_with(word, || 0) += 1;
    /// }
    /// assert_eq!(counts.get("a"), Some(&2));
    /// assert_eq!(counts.total_weight(), 3);
    /// ```
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> ValueMut<'_, V, F> {
        let (slot, existed) = self.table.find_or_insert_with(key, default);
        let Self {
            table,
            weigh,
            total,
        } = self;
        let (_, value) = table
            .slot_mut(slot)
            .unwrap_or_else(|| unreachable!("slot {slot} was just filled"));
        if !existed {
            *total = *total + weigh.weight(value);
        }
        ValueMut::new(value, weigh, total)
    }

    /// Removes `key`, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.table.find(key)?;
        let weight = self.table.slot(slot).map(|(_, v)| self.weigh.weight(v))?;
        self.total = self.total - weight;
        let (_, value) = self.table.remove_at(slot);
        self.table.trim();
        Some(value)
    }

    /// Returns the slot at which the running weight sum, taken over occupied
    /// slots in ascending order, first exceeds `target`.
    ///
    /// Entries with non-positive weight are never selected.
    pub fn select_by_weight(&self, target: F::Weight) -> Option<usize> {
        let weights = self.table.occupied_slots().filter_map(|slot| {
            self.table
                .slot(slot)
                .map(|(_, value)| (slot, self.weigh.weight(value)))
        });
        sampling::select_cumulative(weights, target)
    }

    /// Picks an occupied slot with probability proportional to its weight,
    /// or `None` if the total weight is not positive.
    pub fn weighted_random_slot<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let target = sampling::draw_below(rng, self.total)?;
        self.select_by_weight(target)
    }

    /// Picks a key with probability proportional to its entry's weight.
    pub fn weighted_random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
        let slot = self.weighted_random_slot(rng)?;
        self.table.slot(slot).map(|(k, _)| k)
    }

    /// Like [`weighted_random_key`], but reports an empty or weightless map
    /// as an error.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyTable`] if the total weight is not positive.
    ///
    /// [`weighted_random_key`]: WeightSumMap::weighted_random_key
    pub fn try_weighted_random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&K> {
        self.weighted_random_key(rng).ok_or(Error::EmptyTable)
    }

    /// Picks an occupied slot uniformly at random.
    pub fn uniform_random_slot<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.table.random_slot(rng)
    }

    /// Picks a key uniformly at random.
    pub fn uniform_random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
        self.table.random_key(rng)
    }

    /// Returns an iterator over all entries in slot order.
    pub fn iter(&self) -> Iter<'_, K, V, O> {
        self.table.iter()
    }

    /// Returns a cursor that can update and remove entries while iterating.
    pub fn cursor_mut(&mut self) -> WeightedCursor<'_, K, V, F, S, O> {
        let Self {
            table,
            weigh,
            total,
        } = self;
        WeightedCursor {
            inner: table.cursor_mut(),
            weigh,
            total,
        }
    }

    /// Keeps only the entries for which `keep` returns `true`. Values changed
    /// by `keep` are reweighed.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut cursor = self.cursor_mut();
        loop {
            // The guard must be gone before the cursor moves.
            let retained = {
                let Some((key, mut value)) = cursor.entry_mut() else {
                    break;
                };
                keep(key, &mut value)
            };
            if retained {
                cursor.advance();
            } else {
                cursor.remove_current();
            }
        }
    }

    /// Sums every entry's weight from scratch, stores the result as the new
    /// total and returns it.
    ///
    /// Useful to discard accumulated rounding error in floating point totals.
    pub fn recompute_total(&mut self) -> F::Weight {
        self.total = self.scan_total();
        self.total
    }

    fn scan_total(&self) -> F::Weight {
        self.table
            .values()
            .fold(F::Weight::ZERO, |sum, value| sum + self.weigh.weight(value))
    }

    /// Verifies the table invariants and that the maintained total matches a
    /// full rescan.
    pub fn check_invariants(&self) -> Result<()> {
        self.table.check_invariants()?;
        if !self.total.approx_eq(self.scan_total()) {
            return Err(Error::InvariantViolation {
                slot: self.table.native_size(),
                reason: "maintained weight sum differs from a full rescan",
            });
        }
        Ok(())
    }
}

impl<K, V, F, S, O> WeightSumMap<K, V, F, S, O>
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher + Default,
    O: Occupancy,
{
    /// Creates an empty map with the default hasher builder.
    pub fn new(weigh: F) -> Self {
        Self::with_hasher(weigh, S::default())
    }
}

impl<K, V, F, S, O> Extend<(K, V)> for WeightSumMap<K, V, F, S, O>
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher,
    O: Occupancy,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V, F, S, O> IntoIterator for &'a WeightSumMap<K, V, F, S, O>
where
    F: WeightFn<V>,
    O: Occupancy,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, O>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.iter()
    }
}

/// Scoped write access to a value in a [`WeightSumMap`].
///
/// Snapshots the value's weight on creation and adds the difference to the
/// map's total on drop, whatever path leaves the scope.
pub struct ValueMut<'a, V, F>
where
    F: WeightFn<V>,
{
    value: &'a mut V,
    weigh: &'a F,
    total: &'a mut F::Weight,
    before: F::Weight,
}

impl<'a, V, F> ValueMut<'a, V, F>
where
    F: WeightFn<V>,
{
    fn new(value: &'a mut V, weigh: &'a F, total: &'a mut F::Weight) -> Self {
        let before = weigh.weight(value);
        Self {
            value,
            weigh,
            total,
            before,
        }
    }
}

impl<V, F> Deref for ValueMut<'_, V, F>
where
    F: WeightFn<V>,
{
    type Target = V;

    fn deref(&self) -> &V {
        self.value
    }
}

impl<V, F> DerefMut for ValueMut<'_, V, F>
where
    F: WeightFn<V>,
{
    fn deref_mut(&mut self) -> &mut V {
        self.value
    }
}

impl<V, F> Drop for ValueMut<'_, V, F>
where
    F: WeightFn<V>,
{
    fn drop(&mut self) {
        let after = self.weigh.weight(self.value);
        *self.total = (*self.total - self.before) + after;
    }
}

/// A cursor over a [`WeightSumMap`] that keeps the total weight current as
/// entries are updated or removed.
///
/// Dropping it may shrink the table, like [`CursorMut`].
pub struct WeightedCursor<'a, K, V, F, S, O = DefaultStatus>
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher,
    O: Occupancy,
{
    inner: CursorMut<'a, K, V, S, O>,
    weigh: &'a F,
    total: &'a mut F::Weight,
}

impl<K, V, F, S, O> WeightedCursor<'_, K, V, F, S, O>
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher,
    O: Occupancy,
{
    /// Returns `true` once every entry has been visited.
    pub fn finished(&self) -> bool {
        self.inner.finished()
    }

    /// The slot the cursor points at.
    pub fn slot(&self) -> Option<usize> {
        self.inner.slot()
    }

    /// The current entry's key.
    pub fn key(&self) -> Option<&K> {
        self.inner.key()
    }

    /// The current entry's value.
    pub fn value(&self) -> Option<&V> {
        self.inner.value()
    }

    /// The current entry's weight.
    pub fn weight(&self) -> Option<F::Weight> {
        self.inner.value().map(|value| self.weigh.weight(value))
    }

    /// A write guard for the current entry's value.
    pub fn value_mut(&mut self) -> Option<ValueMut<'_, V, F>> {
        let value = self.inner.value_mut()?;
        Some(ValueMut::new(value, self.weigh, self.total))
    }

    /// The current key together with a write guard for its value.
    pub fn entry_mut(&mut self) -> Option<(&K, ValueMut<'_, V, F>)> {
        let (key, value) = self.inner.entry_mut()?;
        Some((key, ValueMut::new(value, self.weigh, self.total)))
    }

    /// Moves to the next entry.
    pub fn advance(&mut self) {
        self.inner.advance();
    }

    /// Removes the current entry, subtracting its weight from the total, and
    /// moves to the next one.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let weight = self.weight()?;
        *self.total = *self.total - weight;
        self.inner.remove_current()
    }
}

/// Weighs a nested [`WeightSumMap`] by its maintained total.
///
/// Lets an outer map sample an inner map in proportion to the inner map's
/// total weight, then sample an entry of the inner map.
///
/// ```rust
/// use probe_hash::DefaultHashBuilder;
/// use probe_hash::Identity;
/// use probe_hash::TotalWeight;
/// use probe_hash::WeightSumMap;
///
/// type Edges = WeightSumMap<u32, u64, Identity, DefaultHashBuilder>;
///
/// let mut graph: WeightSumMap<u32, Edges, TotalWeight, DefaultHashBuilder> =
///     WeightSumMap::new(TotalWeight);
/// let mut edges = Edges::new(Identity);
/// edges.insert(7, 3);
/// graph.insert(1, edges);
/// assert_eq!(graph.total_weight(), 3);
///
/// graph.get_mut(&1).unwrap().insert(8, 2);
/// assert_eq!(graph.total_weight(), 5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalWeight;

impl<K, V, F, S, O> WeightFn<WeightSumMap<K, V, F, S, O>> for TotalWeight
where
    K: Hash + Eq,
    F: WeightFn<V>,
    S: BuildHasher,
    O: Occupancy,
{
    type Weight = F::Weight;

    #[inline(always)]
    fn weight(&self, map: &WeightSumMap<K, V, F, S, O>) -> F::Weight {
        map.total_weight()
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeSet;
    use alloc::vec::Vec;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::testing::IdentityState;
    use crate::testing::SipHashBuilder;
    use crate::weight::Identity;

    type Degrees = WeightSumMap<u64, u64, Identity, SipHashBuilder>;
    type Graph = WeightSumMap<u64, Degrees, TotalWeight, SipHashBuilder>;

    fn first_five() -> Degrees {
        let mut map = Degrees::new(Identity);
        for key in 1..=5 {
            map.insert(key, key);
        }
        map
    }

    #[test]
    fn insert_erase_and_iterate() {
        let mut map = first_five();
        assert_eq!(map.len(), 5);
        assert_eq!(map.total_weight(), 15);

        assert_eq!(map.remove(&3), Some(3));
        assert_eq!(map.total_weight(), 12);
        assert_eq!(map.len(), 4);
        assert!(!map.contains_key(&3));
        assert_eq!(map.remove(&3), None);

        let mut visited = Vec::new();
        for (key, _) in &map {
            visited.push(*key);
        }
        visited.sort_unstable();
        assert_eq!(visited, [1, 2, 4, 5]);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn replacing_a_value_adjusts_total() {
        let mut map = first_five();
        assert_eq!(map.insert(2, 10), Some(2));
        assert_eq!(map.total_weight(), 23);
        assert_eq!(map.weight_of(&2), Ok(10));
        assert_eq!(map.weight_of(&9), Err(Error::NotFound));
    }

    #[test]
    fn guard_commits_on_every_exit() {
        let mut map = first_five();

        fn bump_until(map: &mut Degrees, key: u64, limit: u64) -> Option<u64> {
            let mut value = map.get_mut(&key)?;
            loop {
                *value += 1;
                if *value >= limit {
                    return Some(*value);
                }
            }
        }

        assert_eq!(bump_until(&mut map, 1, 4), Some(4));
        assert_eq!(map.total_weight(), 18);
        assert_eq!(bump_until(&mut map, 42, 4), None);
        assert_eq!(map.total_weight(), 18);

        {
            let mut value = map.get_mut(&5).unwrap();
            *value = 0;
        }
        assert_eq!(map.total_weight(), 13);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn get_or_insert_with_counts_new_entries() {
        let mut map: WeightSumMap<u64, u32, _, SipHashBuilder> =
            WeightSumMap::new(|count: &u32| u64::from(*count) * 2);
        for key in [1u64, 2, 1, 1] {
            *map.get_or_insert_with(key, || 1) += 1;
        }
        assert_eq!(map.get(&1), Some(&4));
        assert_eq!(map.get(&2), Some(&2));
        assert_eq!(map.total_weight(), 12);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn weighted_sampling_follows_weights() {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut map: WeightSumMap<char, u32, Identity, SipHashBuilder> = WeightSumMap::new(Identity);
        map.insert('a', 1);
        map.insert('b', 1);
        map.insert('c', 2);

        let draws = 40_000;
        let mut hits = [0usize; 3];
        for _ in 0..draws {
            let key = *map.weighted_random_key(&mut rng).unwrap();
            hits[(key as u8 - b'a') as usize] += 1;
        }
        let expected = [draws / 4, draws / 4, draws / 2];
        for (hit, want) in hits.iter().zip(expected) {
            // Well over five standard deviations.
            assert!(hit.abs_diff(want) < 600, "{hits:?}");
        }
    }

    #[test]
    fn zero_weight_entries_are_never_drawn() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut map = Degrees::new(Identity);
        assert_eq!(map.weighted_random_slot(&mut rng), None);
        assert_eq!(map.try_weighted_random_key(&mut rng), Err(Error::EmptyTable));

        map.insert(1, 0);
        map.insert(2, 0);
        assert_eq!(map.weighted_random_key(&mut rng), None);
        assert!(map.uniform_random_key(&mut rng).is_some());

        map.insert(3, 7);
        for _ in 0..100 {
            assert_eq!(map.try_weighted_random_key(&mut rng), Ok(&3));
        }
    }

    #[test]
    fn select_by_weight_walks_slot_order() {
        let mut map: WeightSumMap<u64, u64, Identity, IdentityState> = WeightSumMap::new(Identity);
        map.insert(0, 1);
        map.insert(1, 2);
        map.insert(2, 3);
        assert_eq!(map.select_by_weight(0), Some(0));
        assert_eq!(map.select_by_weight(1), Some(1));
        assert_eq!(map.select_by_weight(2), Some(1));
        assert_eq!(map.select_by_weight(3), Some(2));
        assert_eq!(map.select_by_weight(5), Some(2));
    }

    #[test]
    fn float_weights_stay_consistent() {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut map: WeightSumMap<u32, f64, Identity, SipHashBuilder> = WeightSumMap::new(Identity);
        for step in 0..2000u32 {
            let key = rng.random_range(0..100);
            match rng.random_range(0..3) {
                0 => {
                    map.insert(key, rng.random_range(0.0..10.0));
                }
                1 => {
                    map.remove(&key);
                }
                _ => {
                    if let Some(mut value) = map.get_mut(&key) {
                        *value *= 0.5;
                    }
                }
            }
            assert!(map.check_invariants().is_ok(), "step {step}");
        }
        let maintained = map.total_weight();
        let rescanned = map.recompute_total();
        assert!(maintained.approx_eq(rescanned));
    }

    #[test]
    fn cursor_updates_and_removes() {
        let mut map = Degrees::new(Identity);
        for key in 0..200 {
            map.insert(key, key % 7);
        }
        let native = map.as_table().native_size();

        let mut cursor = map.cursor_mut();
        while !cursor.finished() {
            match cursor.weight() {
                Some(0) => {
                    cursor.remove_current();
                }
                Some(w) if w % 2 == 1 => {
                    if let Some(mut value) = cursor.value_mut() {
                        *value += 1;
                    }
                    cursor.advance();
                }
                _ => cursor.advance(),
            }
        }
        drop(cursor);

        assert!(map.as_table().native_size() <= native);
        assert!(map.iter().all(|(_, v)| v % 2 == 0));
        assert!(map.check_invariants().is_ok());
        assert!(!map.contains_key(&0));
        assert!(!map.contains_key(&7));
        assert_eq!(map.get(&1), Some(&2));
    }

    #[test]
    fn retain_reweighs_and_removes() {
        let mut map = first_five();
        map.retain(|key, value| {
            *value *= 10;
            key % 2 == 1
        });
        let keys: BTreeSet<u64> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, BTreeSet::from([1, 3, 5]));
        assert_eq!(map.total_weight(), 90);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn clear_resets_total() {
        let mut map = first_five();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.total_weight(), 0);
        assert_eq!(map.as_table().native_size(), 0);
        map.extend([(7, 7), (8, 8)]);
        assert_eq!(map.total_weight(), 15);
    }

    #[test]
    fn detects_total_drift() {
        let mut map = first_five();
        map.total = 14;
        assert!(matches!(
            map.check_invariants(),
            Err(Error::InvariantViolation { .. })
        ));
        assert_eq!(map.recompute_total(), 15);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn nested_maps_weigh_by_total() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut graph = Graph::new(TotalWeight);
        for node in 1..=3 {
            let mut edges = Degrees::new(Identity);
            for target in 0..node {
                edges.insert(target, 1);
            }
            graph.insert(node, edges);
        }
        assert_eq!(graph.total_weight(), 6);

        {
            let mut edges = graph.get_mut(&1).unwrap();
            edges.insert(10, 4);
        }
        assert_eq!(graph.total_weight(), 10);
        graph.get_mut(&3).unwrap().remove(&0);
        assert_eq!(graph.total_weight(), 9);
        assert_eq!(graph.weight_of(&1), Ok(5));
        assert!(graph.check_invariants().is_ok());

        let mut first = 0usize;
        for _ in 0..9000 {
            let node = *graph.weighted_random_key(&mut rng).unwrap();
            let edges = graph.get(&node).unwrap();
            let edge = edges.weighted_random_key(&mut rng).unwrap();
            assert!(edges.weight_of(edge).unwrap() > 0);
            if node == 1 {
                first += 1;
            }
        }
        assert!((4700..5300).contains(&first), "{first}");
    }
}
