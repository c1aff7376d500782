use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;

use log::debug;
use log::trace;
use rand::Rng;

use crate::controller::Controller;
use crate::controller::Params;
use crate::error::Error;
use crate::error::Result;
use crate::sampling;
use crate::storage::DefaultStatus;
use crate::storage::Occupancy;
use crate::storage::Slots;

#[inline(always)]
fn prefetch<T>(ptr: *const T) {
    #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
    // SAFETY: Prefetching is a hint and never faults, even on a dangling
    // address.
    unsafe {
        use core::arch::x86_64::*;
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }

    #[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
    let _ = ptr;
}

/// Debug statistics for hash table analysis.
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Number of entries the table holds before it grows
    pub capacity: usize,
    /// Total number of slots allocated
    pub native_size: usize,
    /// Load factor (populated / native_size)
    pub load_factor: f64,
    /// Longest distance between an entry and its initial place
    pub max_displacement: usize,
    /// Mean distance between an entry and its initial place
    pub mean_displacement: f64,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} slots ({:.2}% load factor)",
            self.populated,
            self.native_size,
            self.load_factor * 100.0
        );
        println!("Capacity before growth: {}", self.capacity);
        println!(
            "Displacement: max {}, mean {:.3}",
            self.max_displacement, self.mean_displacement
        );
    }
}

/// A linear-probing hash table storing `(K, V)` entries in its own slots.
///
/// Collisions are resolved by probing forward, one slot at a time, wrapping
/// at the end of the table. A lookup, insertion or removal therefore touches
/// one non-sequential memory region and then walks forward from it.
///
/// Removal closes the gap it leaves by shifting later entries of the same
/// probe run backward ("local rehash"), so there are no tombstones and
/// lookups never slow down after heavy churn.
///
/// The table grows only on insertion and shrinks only at explicit
/// boundaries: [`remove`], [`trim`], and the end of a [`CursorMut`]'s life.
///
/// [`remove`]: HashTable::remove
/// [`trim`]: HashTable::trim
///
/// # Examples
///
/// ```rust
/// use probe_hash::DefaultHashBuilder;
/// use probe_hash::HashTable;
///
/// let mut table: HashTable<u32, &str, DefaultHashBuilder> = HashTable::new();
/// table.insert(1, "one");
/// table.insert(2, "two");
///
/// assert_eq!(table.get(&1), Some(&"one"));
/// assert_eq!(table.remove(&2), Some("two"));
/// assert!(!table.contains_key(&2));
/// assert_eq!(table.len(), 1);
/// ```
pub struct HashTable<K, V, S, O: Occupancy = DefaultStatus> {
    slots: Slots<(K, V), O>,
    controller: Controller,
    hash_builder: S,
}

impl<K, V, S, O> Debug for HashTable<K, V, S, O>
where
    K: Debug,
    V: Debug,
    O: Occupancy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, O> Clone for HashTable<K, V, S, O>
where
    K: Clone,
    V: Clone,
    S: Clone,
    O: Occupancy,
{
    fn clone(&self) -> Self {
        // Slot-for-slot copy with the same hasher keeps every entry at a
        // position that satisfies the hash invariant.
        Self {
            slots: self.slots.clone(),
            controller: self.controller.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S, O: Occupancy> HashTable<K, V, S, O> {
    /// Creates an empty table using `hash_builder` to hash keys.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a table that holds at least `capacity` entries before growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let table: HashTable<u64, u64, _> =
    ///     HashTable::with_capacity_and_hasher(100, DefaultHashBuilder::default());
    /// assert!(table.capacity() >= 100);
    /// assert!(table.native_size().is_power_of_two());
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::from_parts(capacity, Params::default(), hash_builder)
    }

    /// Creates a table with explicit growth, shrink and ordering parameters.
    ///
    /// Returns [`Error::InvalidParams`] if `params` fails validation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    /// use probe_hash::Params;
    ///
    /// let params = Params::default().ordered(true).grow_load(60);
    /// let table: HashTable<u64, (), _> =
    ///     HashTable::with_params_and_hasher(10, params, DefaultHashBuilder::default()).unwrap();
    /// assert!(table.params().is_ordered());
    /// ```
    pub fn with_params_and_hasher(capacity: usize, params: Params, hash_builder: S) -> Result<Self> {
        params.validate()?;
        Ok(Self::from_parts(capacity, params, hash_builder))
    }

    fn from_parts(capacity: usize, params: Params, hash_builder: S) -> Self {
        let native = Controller::new(params, 0).native_size_for(capacity);
        Self {
            slots: Slots::with_len(native),
            controller: Controller::new(params, native),
            hash_builder,
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.controller.count()
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.controller.count() == 0
    }

    /// Number of entries the table holds before the next insertion grows it.
    pub fn capacity(&self) -> usize {
        self.controller.capacity()
    }

    /// Number of slots currently allocated.
    pub fn native_size(&self) -> usize {
        self.controller.native_size()
    }

    /// The parameters the table was built with.
    pub fn params(&self) -> &Params {
        self.controller.params()
    }

    /// The table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes every entry and releases the slot array.
    ///
    /// No local rehash is needed since nothing survives.
    pub fn clear(&mut self) {
        if self.native_size() != 0 {
            debug!("clearing {} entries, releasing {} slots", self.len(), self.native_size());
        }
        self.slots = Slots::with_len(0);
        self.controller = Controller::new(*self.controller.params(), 0);
    }

    /// The entry stored at `slot`, if the slot is occupied.
    pub fn slot(&self, slot: usize) -> Option<(&K, &V)> {
        self.slots.get(slot).map(|(k, v)| (k, v))
    }

    /// Mutable access to the value stored at `slot`, if the slot is occupied.
    pub fn slot_mut(&mut self, slot: usize) -> Option<(&K, &mut V)> {
        self.slots.get_mut(slot).map(|(k, v)| (&*k, v))
    }

    /// Indices of occupied slots in ascending order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.occupied()
    }

    /// Returns an iterator over all entries in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, u32, DefaultHashBuilder> = HashTable::new();
    /// for i in 0..10 {
    ///     table.insert(i, i * i);
    /// }
    /// assert_eq!(table.iter().map(|(_, v)| *v).sum::<u32>(), 285);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V, O> {
        Iter {
            slots: &self.slots,
            index: 0,
            remaining: self.len(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V, O> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V, O> {
        Values { inner: self.iter() }
    }

    /// Removes and yields every entry.
    ///
    /// Entries are taken out without local rehashing; the table is only
    /// consistent again once the `Drain` is dropped. Dropping it releases the
    /// slot array unless shrinking is disabled.
    pub fn drain(&mut self) -> Drain<'_, K, V, S, O> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Picks an entry slot uniformly at random, or `None` if the table is
    /// empty.
    ///
    /// Uses rejection sampling over slot indices, which is cheap because the
    /// load factor stays bounded away from zero.
    pub fn random_slot<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(sampling::rejection_sample(rng, self.native_size(), |slot| {
            self.slots.is_used(slot)
        }))
    }

    /// Picks a key uniformly at random, or `None` if the table is empty.
    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
        let slot = self.random_slot(rng)?;
        self.slot(slot).map(|(k, _)| k)
    }
}

impl<K, V, S, O> HashTable<K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    #[inline(always)]
    fn initial_place_of<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        self.controller.initial_place(self.hash_builder.hash_one(key))
    }

    #[inline(always)]
    fn initial_place_at(&self, slot: usize) -> usize {
        self.initial_place_of(&self.slots.at(slot).0)
    }

    /// Whether the entry at `slot` has an initial place cyclically after
    /// `probe_start`, where both probe runs reach `slot`.
    #[inline]
    fn placed_after(&self, probe_start: usize, slot: usize) -> bool {
        let init = self.initial_place_at(slot);
        let slot_wrapped = init > slot;
        let probe_wrapped = probe_start > slot;
        (probe_wrapped == slot_wrapped && probe_start < init) || (!slot_wrapped && probe_wrapped)
    }

    /// Walks the probe run of `key`. `Ok` holds the slot where it was found;
    /// `Err` holds the slot where the search stopped, which is virgin or, in
    /// ordered mode, the slot the key would be inserted at.
    fn probe<Q>(&self, key: &Q) -> core::result::Result<usize, usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let start = self.initial_place_of(key);
        let mut slot = start;
        while self.slots.is_used(slot) {
            if self.slots.at(slot).0.borrow() == key {
                return Ok(slot);
            }
            if self.controller.is_ordered() && self.placed_after(start, slot) {
                break;
            }
            slot = self.controller.next_place(slot);
        }
        Err(slot)
    }

    /// Returns the slot holding `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut table: HashTable<&str, u32, DefaultHashBuilder> = HashTable::new();
    /// table.insert("a", 1);
    /// let slot = table.find("a").unwrap();
    /// assert_eq!(table.slot(slot), Some((&"a", &1)));
    /// assert_eq!(table.find("b"), None);
    /// ```
    pub fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.is_empty() {
            return None;
        }
        self.probe(key).ok()
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).and_then(|slot| self.slot(slot))
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find(key)?;
        self.slot_mut(slot).map(|(_, v)| v)
    }

    /// Returns `true` if the table holds `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Number of entries whose key equals `key`. Only tables filled through
    /// [`insert_multi`] can hold more than one.
    ///
    /// [`insert_multi`]: HashTable::insert_multi
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.is_empty() {
            return 0;
        }
        let start = self.initial_place_of(key);
        let mut slot = start;
        let mut found = 0;
        while self.slots.is_used(slot) {
            if self.slots.at(slot).0.borrow() == key {
                found += 1;
            } else if self.controller.is_ordered() && self.placed_after(start, slot) {
                break;
            }
            slot = self.controller.next_place(slot);
        }
        found
    }

    /// Shifts the run starting at `slot` one step forward, up to the first
    /// virgin slot, leaving `slot` virgin.
    fn push_probe_at(&mut self, slot: usize) {
        debug_assert!(self.slots.is_used(slot));
        let mut free = slot;
        while self.slots.is_used(free) {
            free = self.controller.next_place(free);
        }
        trace!("pushing probe run {slot}..{free} forward");
        while free != slot {
            let prev = self.controller.prev_place(free);
            self.slots.swap(free, prev);
            free = prev;
        }
    }

    /// Finds the slot a new entry for `key` goes into, opening a gap in
    /// ordered mode. Optionally counts equal keys passed on the way.
    fn vacancy_for(&mut self, key: &K, count_equal: bool) -> (usize, usize) {
        let start = self.initial_place_of(key);
        let mut slot = start;
        let mut equal = 0;
        while self.slots.is_used(slot) {
            if count_equal && &self.slots.at(slot).0 == key {
                equal += 1;
            } else if self.controller.is_ordered() && self.placed_after(start, slot) {
                self.push_probe_at(slot);
                break;
            }
            slot = self.controller.next_place(slot);
        }
        (slot, equal)
    }

    fn fill(&mut self, slot: usize, key: K, value: V) {
        self.slots.write(slot, (key, value));
        self.controller.note_inserted();
        debug_assert!(self.key_found_at(slot));
    }

    fn grow_if_needed(&mut self) {
        if let Some(native) = self.controller.about_to_insert() {
            self.rehash(native, "grow");
        }
    }

    /// Either the slot holding `key`, or a virgin slot prepared for it with
    /// any growth already applied.
    fn find_or_vacancy(&mut self, key: &K) -> core::result::Result<usize, usize> {
        if !self.is_empty() {
            match self.probe(key) {
                Ok(slot) => return Ok(slot),
                Err(stop) if self.controller.about_to_insert().is_none() => {
                    if self.slots.is_used(stop) {
                        self.push_probe_at(stop);
                    }
                    return Err(stop);
                }
                Err(_) => {}
            }
        }
        self.grow_if_needed();
        Err(self.vacancy_for(key, false).0)
    }

    /// Inserts `key` with `value`, returning the previous value if the key
    /// was present. The stored key is kept in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, &str, DefaultHashBuilder> = HashTable::new();
    /// assert_eq!(table.insert(37, "a"), None);
    /// assert_eq!(table.insert(37, "b"), Some("a"));
    /// assert_eq!(table.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.find_or_vacancy(&key) {
            Ok(slot) => self
                .slot_mut(slot)
                .map(|(_, old)| core::mem::replace(old, value)),
            Err(slot) => {
                self.fill(slot, key, value);
                None
            }
        }
    }

    /// Returns the slot holding `key`, inserting `default()` first if the key
    /// is absent. The flag is `true` when the key was already present.
    pub fn find_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> (usize, bool) {
        match self.find_or_vacancy(&key) {
            Ok(slot) => (slot, true),
            Err(slot) => {
                self.fill(slot, key, default());
                (slot, false)
            }
        }
    }

    /// Inserts a new entry even if equal keys are present, returning its slot
    /// and the number of equal keys passed on the probe run.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut bag: HashTable<&str, (), DefaultHashBuilder> = HashTable::new();
    /// assert_eq!(bag.insert_multi("x", ()).1, 0);
    /// assert_eq!(bag.insert_multi("x", ()).1, 1);
    /// assert_eq!(bag.count("x"), 2);
    /// ```
    pub fn insert_multi(&mut self, key: K, value: V) -> (usize, usize) {
        self.grow_if_needed();
        let (slot, equal) = self.vacancy_for(&key, true);
        self.fill(slot, key, value);
        (slot, equal)
    }

    /// Removes `key`, returning its value. May shrink the table afterwards.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key`, returning the stored key and value. May shrink the
    /// table afterwards.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find(key)?;
        let entry = self.remove_at(slot);
        self.trim();
        Some(entry)
    }

    /// Removes the entry at an occupied slot and closes the gap by shifting
    /// later entries of the same run backward. Never resizes.
    pub(crate) fn remove_at(&mut self, slot: usize) -> (K, V) {
        let mut gap = slot;
        let mut current = self.controller.next_place(slot);
        let entry = self.slots.take(slot);
        self.controller.note_removed();

        while self.slots.is_used(current) {
            let init = self.initial_place_at(current);
            // The entry may move into the gap unless its initial place lies
            // cyclically in (gap, current]. Either probe may have wrapped past
            // the end of the table.
            let current_wrapped = init > current;
            let gap_wrapped = gap > current;
            if (gap_wrapped == current_wrapped && init <= gap) || (current_wrapped && !gap_wrapped) {
                self.slots.relocate(gap, current);
                debug_assert!(self.key_found_at(gap));
                gap = current;
            }
            current = self.controller.next_place(current);
        }
        debug_assert!(!self.slots.is_used(gap));
        entry
    }

    /// Shrinks the table if occupancy has dropped below the shrink threshold.
    ///
    /// Called automatically after [`remove`] and when a [`CursorMut`] is
    /// dropped.
    ///
    /// [`remove`]: HashTable::remove
    pub fn trim(&mut self) {
        if let Some(native) = self.controller.maybe_shrink() {
            self.rehash(native, "shrink");
        }
    }

    /// Ensures room for `additional` more entries without growth.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len().saturating_add(additional);
        if required > self.capacity() {
            let native = self.controller.native_size_for(required);
            self.rehash(native, "reserve");
        }
    }

    /// Shrinks the slot array as far as the grow threshold allows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut table: HashTable<u64, u64, _> =
    ///     HashTable::with_capacity_and_hasher(1000, DefaultHashBuilder::default());
    /// table.insert(1, 1);
    /// table.shrink_to_fit();
    /// assert!(table.capacity() < 1000);
    /// assert_eq!(table.get(&1), Some(&1));
    /// ```
    pub fn shrink_to_fit(&mut self) {
        let native = self.controller.native_size_for(self.len());
        if native < self.native_size() {
            self.rehash(native, "shrink to fit");
        }
    }

    /// Moves every entry into a fresh slot array of `native` slots.
    ///
    /// Entries are reinserted starting just past a virgin slot of the old
    /// array, so runs are visited whole and their relative order survives.
    fn rehash(&mut self, native: usize, reason: &str) {
        let count = self.len();
        assert!(native > count || (native == 0 && count == 0));
        debug!(
            "rehashing {count} entries: {} -> {native} slots ({reason})",
            self.native_size()
        );

        let mut old = core::mem::replace(&mut self.slots, Slots::with_len(native));
        self.controller = Controller::new(*self.controller.params(), native);
        if count == 0 {
            return;
        }

        let start = old.first_free().unwrap_or(0);
        let order = (start + 1..old.len()).chain(0..start);
        for slot in order {
            if old.is_used(slot) {
                let (key, value) = old.take(slot);
                let (vacancy, _) = self.vacancy_for(&key, false);
                self.fill(vacancy, key, value);
            }
        }
        debug_assert_eq!(self.len(), count);
    }

    /// Returns a cursor that can remove entries while iterating.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, u32, DefaultHashBuilder> = HashTable::new();
    /// for i in 0..20 {
    ///     table.insert(i, i);
    /// }
    ///
    /// let mut cursor = table.cursor_mut();
    /// while !cursor.finished() {
    ///     if cursor.key().is_some_and(|k| k % 2 == 0) {
    ///         cursor.remove_current();
    ///     } else {
    ///         cursor.advance();
    ///     }
    /// }
    /// drop(cursor);
    ///
    /// assert_eq!(table.len(), 10);
    /// ```
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, S, O> {
        CursorMut::new(self)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut cursor = self.cursor_mut();
        while let Some((key, value)) = cursor.entry_mut() {
            if keep(key, value) {
                cursor.advance();
            } else {
                cursor.remove_current();
            }
        }
    }

    /// Hints the CPU to load the initial slot of `key` into cache.
    pub fn prefetch<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        if self.native_size() != 0 {
            prefetch(self.slots.as_ptr(self.initial_place_of(key)));
        }
    }

    /// Returns `true` if the initial slot of `key` is occupied, i.e. a lookup
    /// has to compare at least one key.
    pub fn preload<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.native_size() != 0 && self.slots.is_used(self.initial_place_of(key))
    }

    fn violation_at(&self, slot: usize) -> Option<&'static str> {
        if !self.slots.is_used(slot) {
            return Some("slot is virgin");
        }
        let start = self.initial_place_at(slot);
        let mut probe = start;
        loop {
            if !self.slots.is_used(probe) {
                return Some("virgin slot between initial place and entry");
            }
            if probe == slot {
                return None;
            }
            if self.controller.is_ordered()
                && self.placed_after(start, probe)
                && self.initial_place_at(probe) != start
            {
                return Some("entry with a later initial place precedes it");
            }
            probe = self.controller.next_place(probe);
        }
    }

    /// Checks the hash invariant for the entry at `slot`: it must be reachable
    /// by probing forward from its initial place without crossing a virgin
    /// slot (and, in ordered mode, without passing entries that belong later).
    pub fn key_found_at(&self, slot: usize) -> bool {
        self.violation_at(slot).is_none()
    }

    /// Verifies every structural invariant of the table.
    ///
    /// A failure indicates a bug in the table, not in the caller.
    pub fn check_invariants(&self) -> Result<()> {
        let mut used = 0;
        for slot in self.slots.occupied() {
            used += 1;
            if let Some(reason) = self.violation_at(slot) {
                return Err(Error::InvariantViolation { slot, reason });
            }
        }
        if self.native_size() != 0 && self.slots.first_free().is_none() {
            return Err(Error::InvariantViolation {
                slot: 0,
                reason: "table has no virgin slot",
            });
        }
        if !self.controller.is_consistent(used) {
            return Err(Error::InvariantViolation {
                slot: self.native_size(),
                reason: "occupied count does not match the controller",
            });
        }
        Ok(())
    }

    /// Computes a histogram of displacements: entry `d` counts the entries
    /// stored `d` slots after their initial place.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        let mut hist = alloc::vec::Vec::new();
        for slot in self.slots.occupied() {
            let distance = slot.wrapping_sub(self.initial_place_at(slot)) & (self.native_size() - 1);
            if hist.len() <= distance {
                hist.resize(distance + 1, 0);
            }
            hist[distance] += 1;
        }
        hist
    }

    /// Returns summary statistics for debugging.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let hist = self.probe_histogram();
        let total: usize = hist.iter().enumerate().map(|(d, n)| d * n).sum();
        DebugStats {
            populated: self.len(),
            capacity: self.capacity(),
            native_size: self.native_size(),
            load_factor: if self.native_size() == 0 {
                0.0
            } else {
                self.len() as f64 / self.native_size() as f64
            },
            max_displacement: hist.len().saturating_sub(1),
            mean_displacement: if self.is_empty() {
                0.0
            } else {
                total as f64 / self.len() as f64
            },
        }
    }
}

impl<K, V, S, O> HashTable<K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    /// Creates an empty table using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a table that holds at least `capacity` entries before growing,
    /// using the default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, O> Default for HashTable<K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, O> Extend<(K, V)> for HashTable<K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S, O> FromIterator<(K, V)> for HashTable<K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<'a, K, V, S, O: Occupancy> IntoIterator for &'a HashTable<K, V, S, O> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, O>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the entries of a [`HashTable`], in slot order.
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, K, V, O: Occupancy = DefaultStatus> {
    slots: &'a Slots<(K, V), O>,
    index: usize,
    remaining: usize,
}

impl<'a, K, V, O: Occupancy> Iterator for Iter<'a, K, V, O> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while self.index < self.slots.len() {
            let slot = self.index;
            self.index += 1;
            if let Some((k, v)) = self.slots.get(slot) {
                self.remaining -= 1;
                return Some((k, v));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, O: Occupancy> ExactSizeIterator for Iter<'_, K, V, O> {}

impl<K, V, O: Occupancy> FusedIterator for Iter<'_, K, V, O> {}

/// An iterator over the keys of a [`HashTable`].
pub struct Keys<'a, K, V, O: Occupancy = DefaultStatus> {
    inner: Iter<'a, K, V, O>,
}

impl<'a, K, V, O: Occupancy> Iterator for Keys<'a, K, V, O> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the values of a [`HashTable`].
pub struct Values<'a, K, V, O: Occupancy = DefaultStatus> {
    inner: Iter<'a, K, V, O>,
}

impl<'a, K, V, O: Occupancy> Iterator for Values<'a, K, V, O> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over the entries of a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, K, V, S, O: Occupancy = DefaultStatus> {
    table: &'a mut HashTable<K, V, S, O>,
    index: usize,
}

impl<K, V, S, O: Occupancy> Iterator for Drain<'_, K, V, S, O> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.table.slots.len() {
            let slot = self.index;
            self.index += 1;
            if self.table.slots.is_used(slot) {
                self.table.controller.note_removed();
                return Some(self.table.slots.take(slot));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len(), Some(self.table.len()))
    }
}

impl<K, V, S, O: Occupancy> Drop for Drain<'_, K, V, S, O> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        // The table is empty, so shrinking needs no rehash.
        if self.table.controller.maybe_shrink().is_some() {
            debug!("drained table, releasing {} slots", self.table.native_size());
            self.table.slots = Slots::with_len(0);
            self.table.controller = Controller::new(*self.table.controller.params(), 0);
        }
    }
}

/// A cursor over a [`HashTable`] that can remove the entry it points at.
///
/// Removal runs the table's local rehash, which may pull a later entry back
/// into the current slot. To visit every entry exactly once regardless, the
/// cursor starts just past the table's first virgin slot and stops when it
/// wraps back to it; that slot stays virgin for the cursor's whole life
/// because the cursor never inserts and the table never resizes under it.
///
/// Dropping the cursor calls [`HashTable::trim`], so a table emptied through
/// a cursor shrinks once, at the end.
///
/// This struct is created by the [`cursor_mut`] method on [`HashTable`].
///
/// [`cursor_mut`]: HashTable::cursor_mut
pub struct CursorMut<'a, K, V, S, O = DefaultStatus>
where
    K: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    table: &'a mut HashTable<K, V, S, O>,
    slot: usize,
    end: usize,
}

impl<'a, K, V, S, O> CursorMut<'a, K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    fn new(table: &'a mut HashTable<K, V, S, O>) -> Self {
        let native = table.native_size();
        if table.is_empty() {
            return Self {
                table,
                slot: native,
                end: native,
            };
        }

        let end = table.slots.first_free().unwrap_or(0);
        let mut slot = end;
        loop {
            slot = table.controller.next_place(slot);
            if table.slots.is_used(slot) {
                break;
            }
        }
        Self { table, slot, end }
    }

    /// Returns `true` once every entry has been visited.
    pub fn finished(&self) -> bool {
        self.slot == self.table.native_size()
    }

    /// The slot the cursor points at.
    pub fn slot(&self) -> Option<usize> {
        (!self.finished()).then_some(self.slot)
    }

    /// The current entry's key.
    pub fn key(&self) -> Option<&K> {
        self.table.slots.get(self.slot).map(|(k, _)| k)
    }

    /// The current entry's value.
    pub fn value(&self) -> Option<&V> {
        self.table.slots.get(self.slot).map(|(_, v)| v)
    }

    /// Mutable access to the current entry's value.
    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.table.slots.get_mut(self.slot).map(|(_, v)| v)
    }

    /// The current entry, with mutable access to its value.
    pub fn entry_mut(&mut self) -> Option<(&K, &mut V)> {
        self.table.slots.get_mut(self.slot).map(|(k, v)| (&*k, v))
    }

    /// Moves to the next entry.
    pub fn advance(&mut self) {
        if self.finished() {
            return;
        }
        while self.slot != self.end {
            self.slot = self.table.controller.next_place(self.slot);
            if self.table.slots.is_used(self.slot) {
                return;
            }
        }
        self.slot = self.table.native_size();
    }

    /// Removes the current entry and moves to the next one.
    ///
    /// If the local rehash refilled the current slot, the cursor stays put so
    /// that the pulled-back entry is visited next.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        if self.finished() {
            return None;
        }
        let entry = self.table.remove_at(self.slot);
        if !self.table.slots.is_used(self.slot) {
            self.advance();
        }
        Some(entry)
    }
}

impl<K, V, S, O> Drop for CursorMut<'_, K, V, S, O>
where
    K: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    fn drop(&mut self) {
        self.table.trim();
    }
}
