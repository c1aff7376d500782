use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use rand::Rng;

use crate::controller::Params;
use crate::error::Result;
use crate::hash_table::HashTable;
use crate::hash_table::Keys;
use crate::storage::DefaultStatus;
use crate::storage::Occupancy;

/// A hash set backed by a [`HashTable`] with unit values.
///
/// Adds uniform sampling of members to the usual set interface, which graph
/// code uses to pick random neighbours.
///
/// # Examples
///
/// ```rust
/// use probe_hash::DefaultHashBuilder;
/// use probe_hash::HashSet;
///
/// let mut nodes: HashSet<u32, DefaultHashBuilder> = HashSet::new();
/// assert!(nodes.insert(4));
/// assert!(!nodes.insert(4));
/// assert!(nodes.contains(&4));
/// assert!(nodes.remove(&4));
/// assert!(nodes.is_empty());
/// ```
pub struct HashSet<T, S, O: Occupancy = DefaultStatus> {
    table: HashTable<T, (), S, O>,
}

impl<T, S, O> Clone for HashSet<T, S, O>
where
    T: Clone,
    S: Clone,
    O: Occupancy,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T, S, O> PartialEq for HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<T, S, O> Eq for HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
}

impl<T, S, O> Debug for HashSet<T, S, O>
where
    T: Debug,
    O: Occupancy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

impl<T, S, O> HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    /// Creates an empty set using `hash_builder` to hash members.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::with_hasher(hash_builder),
        }
    }

    /// Creates a set holding at least `capacity` members before growing.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Creates a set with explicit table parameters.
    pub fn with_params_and_hasher(capacity: usize, params: Params, hash_builder: S) -> Result<Self> {
        Ok(Self {
            table: HashTable::with_params_and_hasher(capacity, params, hash_builder)?,
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every member and releases the slot array.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Adds `value`, returning `true` if it was not already present.
    pub fn insert(&mut self, value: T) -> bool {
        !self.table.find_or_insert_with(value, || ()).1
    }

    /// Returns `true` if `value` is a member.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(value)
    }

    /// Returns the stored member equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get_key_value(value).map(|(k, _)| k)
    }

    /// Removes `value`, returning `true` if it was a member.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove_entry(value).is_some()
    }

    /// Removes and returns the stored member equal to `value`.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove_entry(value).map(|(k, _)| k)
    }

    /// Returns an iterator over the members in slot order.
    pub fn iter(&self) -> Keys<'_, T, (), O> {
        self.table.keys()
    }

    /// Keeps only the members for which `keep` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_hash::DefaultHashBuilder;
    /// use probe_hash::HashSet;
    ///
    /// let mut set: HashSet<u32, DefaultHashBuilder> = (0..10).collect();
    /// set.retain(|v| v % 3 == 0);
    /// assert_eq!(set.len(), 4);
    /// ```
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.table.retain(|k, _| keep(k));
    }

    /// Picks a member uniformly at random.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        self.table.random_key(rng)
    }

    /// Shrinks the table if occupancy has dropped below the shrink threshold.
    pub fn trim(&mut self) {
        self.table.trim();
    }

    /// Read-only access to the underlying table.
    pub fn as_table(&self) -> &HashTable<T, (), S, O> {
        &self.table
    }
}

impl<T, S, O> HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    /// Creates an empty set using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a set holding at least `capacity` members before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S, O> Default for HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, S, O: Occupancy> IntoIterator for &'a HashSet<T, S, O> {
    type Item = &'a T;
    type IntoIter = Keys<'a, T, (), O>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.keys()
    }
}

impl<T, S, O> FromIterator<T> for HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    O: Occupancy,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T, S, O> Extend<T> for HashSet<T, S, O>
where
    T: Hash + Eq,
    S: BuildHasher,
    O: Occupancy,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::testing::SipHashBuilder;

    type SipSet<T> = HashSet<T, SipHashBuilder>;

    #[test]
    fn test_insert_and_contains() {
        let mut set: SipSet<i32> = HashSet::new();
        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(!set.insert(1));
        assert!(set.contains(&1));
        assert!(!set.contains(&3));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_and_take() {
        let mut set: SipSet<String> = HashSet::new();
        set.insert("a".to_string());
        set.insert("b".to_string());
        assert!(set.remove("a"));
        assert!(!set.remove("a"));
        assert_eq!(set.take("b"), Some("b".to_string()));
        assert!(set.is_empty());
        assert_eq!(set.get("b"), None);
    }

    #[test]
    fn test_equality_ignores_layout() {
        let a: SipSet<u32> = (0..100).collect();
        let b: SipSet<u32> = (0..100).rev().collect();
        assert_eq!(a, b);

        let mut c = b.clone();
        c.remove(&50);
        assert_ne!(a, c);
    }

    #[test]
    fn test_random_member() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut set: SipSet<u32> = HashSet::new();
        assert_eq!(set.random(&mut rng), None);
        set.extend([3, 9, 27]);
        for _ in 0..50 {
            assert!(matches!(set.random(&mut rng), Some(3 | 9 | 27)));
        }
    }

    #[test]
    fn test_retain_then_trim() {
        let mut set: SipSet<u32> = (0..1000).collect();
        let native = set.as_table().native_size();
        set.retain(|v| *v < 10);
        assert_eq!(set.len(), 10);
        assert!(set.as_table().native_size() < native);
        set.trim();
        assert!(set.as_table().check_invariants().is_ok());
        assert_eq!(set.iter().count(), 10);
    }

    #[test]
    fn test_debug_lists_members() {
        let mut set: SipSet<u32> = HashSet::new();
        set.insert(7);
        assert_eq!(format!("{set:?}"), "{7}");
    }
}
