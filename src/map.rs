//! This is the StableMap implementation.

use core::fmt;
use core::hash::Hash;

use indexmap::{Equivalent, IndexSet};

use crate::error::StableError;
use crate::render;
use crate::slots::{Element, Slots};

/// A stable slot for each key of a fixed key set.
///
/// The key set is given at construction and never changes. Each key is
/// assigned a dense position in construction order, and lookups outside the
/// key set are an error rather than a miss.
///
/// # Examples
/// ```
/// # use stablecell::{StableError, StableMap};
/// let lengths = StableMap::new(["alpha", "beta"]).unwrap();
/// let beta = lengths.get("beta").unwrap().get_or_compute(|| "beta".len()).unwrap();
/// assert_eq!(*beta, 4);
/// assert!(matches!(lengths.get("gamma"), Err(StableError::KeyNotAllowed { .. })));
/// ```
pub struct StableMap<K, V> {
    keys: IndexSet<K>,
    slots: Slots<V>,
}

impl<K, V> StableMap<K, V>
where
    K: Hash + Eq + fmt::Debug,
{
    /// Create a map with one unset slot per key.
    ///
    /// Fails with [`StableError::DuplicateKey`] if a key repeats and with
    /// [`StableError::EmptyKeySet`] if there are no keys.
    pub fn new<I>(keys: I) -> Result<Self, StableError>
    where
        I: IntoIterator<Item = K>,
    {
        let iter = keys.into_iter();
        let mut set = IndexSet::with_capacity(iter.size_hint().0);
        for key in iter {
            if let Some(dup) = set.get(&key) {
                return Err(StableError::DuplicateKey {
                    key: format!("{dup:?}"),
                });
            }
            set.insert(key);
        }
        if set.is_empty() {
            return Err(StableError::EmptyKeySet);
        }
        let slots = Slots::new(set.len());
        Ok(Self { keys: set, slots })
    }

    /// The slot for `key`, or [`StableError::KeyNotAllowed`].
    pub fn get<Q>(&self, key: &Q) -> Result<Element<'_, V>, StableError>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Debug,
    {
        self.entry(key).map(|(_, element)| element)
    }

    /// The stored key equal to `key` together with its slot.
    pub(crate) fn entry<Q>(&self, key: &Q) -> Result<(&K, Element<'_, V>), StableError>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Debug,
    {
        match self.keys.get_full(key) {
            Some((index, stored)) => Ok((stored, self.slots.element(index))),
            None => Err(StableError::KeyNotAllowed {
                key: format!("{key:?}"),
            }),
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.keys.contains(key)
    }
}

impl<K, V> StableMap<K, V> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key set, in construction order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.keys.iter()
    }

    /// Every key with its slot, in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Element<'_, V>)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(move |(index, key)| (key, self.slots.element(index)))
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for StableMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render::map(
            f,
            self.keys
                .iter()
                .enumerate()
                .map(|(index, key)| (key, self.slots.peek(index))),
        )
    }
}
