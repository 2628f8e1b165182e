use std::{
    borrow::Borrow,
    collections::{btree_map, BTreeMap},
    fmt::{self, Debug},
};

use serde::{Serialize, Serializer};

/// A two-level map whose innermost value is an ordered list of values.
///
/// Both levels are sorted so that iteration order is deterministic, which
/// keeps everything built on top of this map reproducible between runs.
#[derive(Clone)]
pub struct MultiMap<K1, K2, V> {
    inner: BTreeMap<K1, BTreeMap<K2, Vec<V>>>,
}

impl<K1: Ord, K2: Ord, V> MultiMap<K1, K2, V> {
    pub fn new() -> Self {
        MultiMap {
            inner: BTreeMap::new(),
        }
    }

    /// Returns the list stored under the given pair of keys, or an empty
    /// slice if there isn't one.
    pub fn get<Q1: ?Sized, Q2: ?Sized>(&self, k1: &Q1, k2: &Q2) -> &[V]
    where
        K1: Borrow<Q1>,
        K2: Borrow<Q2>,
        Q1: Ord,
        Q2: Ord,
    {
        self.inner
            .get(k1)
            .and_then(|second| second.get(k2))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the whole second level of the map for the given key.
    pub fn get_all<Q1: ?Sized>(&self, k1: &Q1) -> Option<&BTreeMap<K2, Vec<V>>>
    where
        K1: Borrow<Q1>,
        Q1: Ord,
    {
        self.inner.get(k1)
    }

    pub fn contains_key<Q1: ?Sized>(&self, k1: &Q1) -> bool
    where
        K1: Borrow<Q1>,
        Q1: Ord,
    {
        self.inner.contains_key(k1)
    }

    /// Appends a value to the end of the list stored under the given keys.
    ///
    /// Unlike a set, the same value may appear in a list more than once.
    pub fn push(&mut self, k1: K1, k2: K2, v: V) {
        self.inner
            .entry(k1)
            .or_default()
            .entry(k2)
            .or_default()
            .push(v);
    }

    /// Replaces the list stored under the given keys. An empty list removes
    /// the entry entirely.
    pub fn set(&mut self, k1: K1, k2: K2, values: Vec<V>) {
        if values.is_empty() {
            if let Some(second) = self.inner.get_mut(&k1) {
                second.remove(&k2);

                if second.is_empty() {
                    self.inner.remove(&k1);
                }
            }

            return;
        }

        self.inner.entry(k1).or_default().insert(k2, values);
    }

    pub fn remove<Q1: ?Sized>(&mut self, k1: &Q1) -> Option<BTreeMap<K2, Vec<V>>>
    where
        K1: Borrow<Q1>,
        Q1: Ord,
    {
        self.inner.remove(k1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K1> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K1, &K2, &[V])> {
        self.inner.iter().flat_map(|(k1, second)| {
            second
                .iter()
                .map(move |(k2, values)| (k1, k2, values.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The number of first-level keys in the map.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K1: Debug, K2: Debug, V: Debug> Debug for MultiMap<K1, K2, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(formatter)
    }
}

impl<K1: PartialEq, K2: PartialEq, V: PartialEq> PartialEq for MultiMap<K1, K2, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K1: Eq, K2: Eq, V: Eq> Eq for MultiMap<K1, K2, V> {}

impl<K1, K2, V> Default for MultiMap<K1, K2, V> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
        }
    }
}

impl<K1: Serialize, K2: Serialize, V: Serialize> Serialize for MultiMap<K1, K2, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<K1, K2, V> IntoIterator for MultiMap<K1, K2, V> {
    type IntoIter = MultiMapIntoIter<K1, K2, V>;
    type Item = (K1, BTreeMap<K2, Vec<V>>);

    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            inner: self.inner.into_iter(),
        }
    }
}

pub struct MultiMapIntoIter<K1, K2, V> {
    inner: btree_map::IntoIter<K1, BTreeMap<K2, Vec<V>>>,
}

impl<K1, K2, V> Iterator for MultiMapIntoIter<K1, K2, V> {
    type Item = (K1, BTreeMap<K2, Vec<V>>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_keys_are_empty() {
        let map: MultiMap<String, String, u32> = MultiMap::new();

        assert!(map.get("a", "b").is_empty());
        assert!(map.get_all("a").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn push_keeps_duplicates_in_order() {
        let mut map = MultiMap::new();
        map.push("node".to_owned(), "Collider".to_owned(), 1);
        map.push("node".to_owned(), "Collider".to_owned(), 1);
        map.push("node".to_owned(), "Collider".to_owned(), 2);

        assert_eq!(map.get("node", "Collider"), &[1, 1, 2]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn set_empty_prunes_levels() {
        let mut map = MultiMap::new();
        map.push("node".to_owned(), "A".to_owned(), 1);
        map.set("node".to_owned(), "A".to_owned(), Vec::new());

        assert!(map.is_empty());
        assert!(!map.contains_key("node"));
    }

    #[test]
    fn iter_is_sorted() {
        let mut map = MultiMap::new();
        map.push("b".to_owned(), "y".to_owned(), 3);
        map.push("a".to_owned(), "z".to_owned(), 2);
        map.push("a".to_owned(), "x".to_owned(), 1);

        let flattened: Vec<_> = map
            .iter()
            .map(|(k1, k2, values)| (k1.as_str(), k2.as_str(), values.to_vec()))
            .collect();

        assert_eq!(
            flattened,
            vec![("a", "x", vec![1]), ("a", "z", vec![2]), ("b", "y", vec![3])]
        );
    }
}
