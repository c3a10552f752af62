//! This is the StableEnumMap implementation: keyed slots for small ordinal
//! key domains, addressed by array position instead of hashing.

use core::fmt;

use crate::error::StableError;
use crate::render;
use crate::slots::{Element, Slots};

/// A key type whose values map to small, distinct ordinals.
///
/// Field-less enums are the intended implementors:
///
/// ```
/// # use stablecell::Ordinal;
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Color { Red, Green, Blue }
///
/// impl Ordinal for Color {
///     fn ordinal(self) -> usize {
///         self as usize
///     }
/// }
/// ```
pub trait Ordinal: Copy + fmt::Debug {
    fn ordinal(self) -> usize;
}

const WORD: usize = u64::BITS as usize;

/// Membership over a contiguous ordinal range starting at `first`.
struct OrdinalSet {
    first: usize,
    span: usize,
    words: Box<[u64]>,
}

impl OrdinalSet {
    fn new(first: usize, span: usize) -> Self {
        Self {
            first,
            span,
            words: vec![0; span.div_ceil(WORD)].into_boxed_slice(),
        }
    }

    /// The array position of `ordinal`, if it is a member.
    #[inline]
    fn position(&self, ordinal: usize) -> Option<usize> {
        let pos = ordinal.checked_sub(self.first)?;
        if pos >= self.span || self.words[pos / WORD] & (1 << (pos % WORD)) == 0 {
            return None;
        }
        Some(pos)
    }

    /// Add a member; returns false if it was already present.
    fn insert(&mut self, ordinal: usize) -> bool {
        let pos = ordinal - self.first;
        let word = &mut self.words[pos / WORD];
        let bit = 1 << (pos % WORD);
        let fresh = *word & bit == 0;
        *word |= bit;
        fresh
    }
}

/// Widest ordinal range a [`StableEnumMap`] will allocate slots for.
pub const MAX_ORDINAL_SPAN: usize = 1 << 16;

/// A stable slot for each key of a fixed set of [`Ordinal`] keys.
///
/// Behaves exactly like [`StableMap`](crate::StableMap), keys are reported
/// in construction order, but a key's slot is found at
/// `key.ordinal() - first_ordinal` after an O(1) bit-set membership check,
/// with no hashing.
pub struct StableEnumMap<K, V> {
    keys: Box<[K]>,
    members: OrdinalSet,
    slots: Slots<V>,
}

impl<K: Ordinal, V> StableEnumMap<K, V> {
    /// Create a map with one unset slot per key.
    ///
    /// Fails with [`StableError::DuplicateKey`] if two keys share an
    /// ordinal, with [`StableError::EmptyKeySet`] if there are no keys, and
    /// with [`StableError::OrdinalRange`] if the ordinals span more than
    /// [`MAX_ORDINAL_SPAN`] values.
    pub fn new<I>(keys: I) -> Result<Self, StableError>
    where
        I: IntoIterator<Item = K>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let (Some(first), Some(last)) = (
            keys.iter().map(|key| key.ordinal()).min(),
            keys.iter().map(|key| key.ordinal()).max(),
        ) else {
            return Err(StableError::EmptyKeySet);
        };
        let span = (last - first)
            .checked_add(1)
            .filter(|&span| span <= MAX_ORDINAL_SPAN)
            .ok_or(StableError::OrdinalRange { first, last })?;

        let mut members = OrdinalSet::new(first, span);
        for key in &keys {
            if !members.insert(key.ordinal()) {
                return Err(StableError::DuplicateKey {
                    key: format!("{key:?}"),
                });
            }
        }
        let slots = Slots::with_pending(span, keys.len());
        Ok(Self {
            keys: keys.into_boxed_slice(),
            members,
            slots,
        })
    }

    /// The slot for `key`, or [`StableError::KeyNotAllowed`].
    pub fn get(&self, key: K) -> Result<Element<'_, V>, StableError> {
        match self.members.position(key.ordinal()) {
            Some(pos) => Ok(self.slots.element(pos)),
            None => Err(StableError::KeyNotAllowed {
                key: format!("{key:?}"),
            }),
        }
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.members.position(key.ordinal()).is_some()
    }

    /// Every key with its slot, in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (K, Element<'_, V>)> + '_ {
        self.keys
            .iter()
            .map(move |&key| (key, self.slots.element(self.offset(key))))
    }

    fn offset(&self, key: K) -> usize {
        key.ordinal() - self.members.first
    }
}

impl<K, V> StableEnumMap<K, V> {
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
}

impl<K: Ordinal, V: fmt::Debug> fmt::Debug for StableEnumMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render::map(
            f,
            self.keys
                .iter()
                .map(|key| (key, self.slots.peek(self.offset(*key)))),
        )
    }
}
