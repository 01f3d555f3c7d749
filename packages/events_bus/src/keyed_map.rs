//! Keyed index variants behind the [`Policy`][crate::Policy] trait.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Bound satisfied by any type usable as an event key.
///
/// The bound is the union of what the unordered map needs (`Hash + Eq`) and what the
/// ordered map needs (`Ord`), plus cloning (handles carry their key) and thread
/// mobility. Integers, strings and plain `enum`s all qualify via the blanket
/// implementation.
pub trait EventKey: Clone + Eq + Hash + Ord + Send + Sync + 'static {}

impl<T> EventKey for T where T: Clone + Eq + Hash + Ord + Send + Sync + 'static {}

/// The operations a dispatcher needs from its keyed index.
///
/// Implemented for [`HashedMap`] (unordered) and [`BTreeMap`] (ordered); a
/// [`Policy`][crate::Policy] picks the variant.
pub trait KeyedMap<K, V>: Default {
    /// Looks up the value for a key.
    fn get(&self, key: &K) -> Option<&V>;

    /// Returns the value for a key, inserting one built by `make` on a miss.
    fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &V;

    /// The number of keys present.
    fn len(&self) -> usize;
}

/// The unordered map variant: a `HashMap` seeded with the `foldhash` fast hasher.
pub type HashedMap<K, V> = HashMap<K, V, foldhash::fast::RandomState>;

impl<K: EventKey, V> KeyedMap<K, V> for HashedMap<K, V> {
    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &V {
        self.entry(key).or_insert_with(make)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

impl<K: EventKey, V> KeyedMap<K, V> for BTreeMap<K, V> {
    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &V {
        self.entry(key).or_insert_with(make)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }
}
