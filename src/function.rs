//! Memoizing callables: a holder bound to the generator that fills it.
//!
//! Each binding runs its generator at most once per input, even when many
//! threads call it with the same input at the same time. A generator failure
//! reaches the caller that ran it and is not remembered; the next call for
//! that input runs the generator again.
//!
//! Every binding has an infallible form (`get`/`apply`, generator returns
//! the value) and a fallible form (`try_get`/`try_apply`, generator returns
//! `Result<V, E>` with `E: From<StableError>`).

use core::fmt;
use core::hash::Hash;

use indexmap::Equivalent;

use crate::array::StableArray;
use crate::enummap::{Ordinal, StableEnumMap};
use crate::error::StableError;
use crate::map::StableMap;
use crate::render::{self, SlotView};
use crate::slots::Element;
use crate::value::StableValue;

/// A memoizing zero-argument function.
///
/// # Examples
/// ```
/// # use stablecell::StableSupplier;
/// let config: StableSupplier<Vec<&str>, _> = StableSupplier::new(|| vec!["a", "b"]);
/// assert_eq!(config.get().unwrap().len(), 2);
/// assert!(std::ptr::eq(config.get().unwrap(), config.get().unwrap()));
/// ```
pub struct StableSupplier<T, F> {
    value: StableValue<T>,
    generator: F,
}

impl<T, F> StableSupplier<T, F> {
    pub fn new(generator: F) -> Self {
        Self {
            value: StableValue::new(),
            generator,
        }
    }

    /// The underlying holder.
    pub fn value(&self) -> &StableValue<T> {
        &self.value
    }
}

impl<T, F: Fn() -> T> StableSupplier<T, F> {
    pub fn get(&self) -> Result<&T, StableError> {
        self.value.get_or_compute(&self.generator)
    }
}

impl<T, E, F> StableSupplier<T, F>
where
    E: From<StableError>,
    F: Fn() -> Result<T, E>,
{
    pub fn try_get(&self) -> Result<&T, E> {
        self.value.try_get_or_compute(&self.generator)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for StableSupplier<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StableSupplier")
            .field(&SlotView(self.value.get()))
            .finish()
    }
}

/// Turn a holder's key rejection into the function-level error.
fn not_allowed(err: StableError) -> StableError {
    match err {
        StableError::KeyNotAllowed { key } => StableError::InputNotAllowed { input: key },
        other => other,
    }
}

fn reject<Q: ?Sized + fmt::Debug>(input: &Q) -> StableError {
    StableError::InputNotAllowed {
        input: format!("{input:?}"),
    }
}

/// A memoizing function over a fixed set of hashable keys.
///
/// The generator receives the stored key. Inputs outside the key set fail
/// with [`StableError::InputNotAllowed`]. An empty key set is allowed and
/// allocates no holder at all; every input is then rejected.
///
/// # Examples
/// ```
/// # use stablecell::{StableError, StableFunction};
/// let shout = StableFunction::new(["hi", "yo"], |word: &&str| word.to_uppercase()).unwrap();
/// assert_eq!(shout.apply("hi").unwrap(), "HI");
/// assert!(matches!(shout.apply("hey"), Err(StableError::InputNotAllowed { .. })));
/// ```
pub struct StableFunction<K, V, F> {
    domain: Option<StableMap<K, V>>,
    generator: F,
}

impl<K, V, F> StableFunction<K, V, F>
where
    K: Hash + Eq + fmt::Debug,
{
    /// Fails with [`StableError::DuplicateKey`] if a key repeats.
    pub fn new<I>(keys: I, generator: F) -> Result<Self, StableError>
    where
        I: IntoIterator<Item = K>,
    {
        let domain = match StableMap::new(keys) {
            Ok(map) => Some(map),
            Err(StableError::EmptyKeySet) => None,
            Err(err) => return Err(err),
        };
        Ok(Self { domain, generator })
    }

    fn entry<Q>(&self, input: &Q) -> Result<(&K, Element<'_, V>), StableError>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Debug,
    {
        match &self.domain {
            Some(map) => map.entry(input).map_err(not_allowed),
            None => Err(reject(input)),
        }
    }

    /// The key set, empty for an empty domain.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.domain.iter().flat_map(|map| map.keys())
    }
}

impl<K, V, F> StableFunction<K, V, F>
where
    K: Hash + Eq + fmt::Debug,
    F: Fn(&K) -> V,
{
    pub fn apply<Q>(&self, input: &Q) -> Result<&V, StableError>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Debug,
    {
        let (key, element) = self.entry(input)?;
        element.get_or_compute(|| (self.generator)(key))
    }
}

impl<K, V, E, F> StableFunction<K, V, F>
where
    K: Hash + Eq + fmt::Debug,
    E: From<StableError>,
    F: Fn(&K) -> Result<V, E>,
{
    pub fn try_apply<Q>(&self, input: &Q) -> Result<&V, E>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Debug,
    {
        let (key, element) = self.entry(input)?;
        element.try_get_or_compute(|| (self.generator)(key))
    }
}

impl<K: fmt::Debug, V: fmt::Debug, F> fmt::Debug for StableFunction<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(map) => f.debug_tuple("StableFunction").field(map).finish(),
            None => f.write_str("StableFunction({})"),
        }
    }
}

/// A memoizing function over a fixed set of [`Ordinal`] keys.
///
/// Same contract as [`StableFunction`], backed by a [`StableEnumMap`].
pub struct StableEnumFunction<K, V, F> {
    domain: Option<StableEnumMap<K, V>>,
    generator: F,
}

impl<K: Ordinal, V, F> StableEnumFunction<K, V, F> {
    pub fn new<I>(keys: I, generator: F) -> Result<Self, StableError>
    where
        I: IntoIterator<Item = K>,
    {
        let domain = match StableEnumMap::new(keys) {
            Ok(map) => Some(map),
            Err(StableError::EmptyKeySet) => None,
            Err(err) => return Err(err),
        };
        Ok(Self { domain, generator })
    }

    fn element(&self, input: K) -> Result<Element<'_, V>, StableError> {
        match &self.domain {
            Some(map) => map.get(input).map_err(not_allowed),
            None => Err(reject(&input)),
        }
    }
}

impl<K: Ordinal, V, F: Fn(K) -> V> StableEnumFunction<K, V, F> {
    pub fn apply(&self, input: K) -> Result<&V, StableError> {
        self.element(input)?
            .get_or_compute(|| (self.generator)(input))
    }
}

impl<K, V, E, F> StableEnumFunction<K, V, F>
where
    K: Ordinal,
    E: From<StableError>,
    F: Fn(K) -> Result<V, E>,
{
    pub fn try_apply(&self, input: K) -> Result<&V, E> {
        self.element(input)?
            .try_get_or_compute(|| (self.generator)(input))
    }
}

impl<K: Ordinal, V: fmt::Debug, F> fmt::Debug for StableEnumFunction<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(map) => f.debug_tuple("StableEnumFunction").field(map).finish(),
            None => f.write_str("StableEnumFunction({})"),
        }
    }
}

/// A memoizing function over the index range `0..len`.
///
/// Iterating it resolves every index in order, which makes it usable as a
/// lazily computed, fixed-length list.
///
/// # Examples
/// ```
/// # use stablecell::StableIntFunction;
/// let squares = StableIntFunction::new(4, |i: usize| i * i);
/// assert_eq!(*squares.apply(3).unwrap(), 9);
/// let all: Vec<usize> = squares.iter().map(|v| *v.unwrap()).collect();
/// assert_eq!(all, [0, 1, 4, 9]);
/// assert!(squares.apply(4).is_err());
/// ```
pub struct StableIntFunction<V, F> {
    values: StableArray<V>,
    generator: F,
}

impl<V, F> StableIntFunction<V, F> {
    pub fn new(len: usize, generator: F) -> Self {
        Self {
            values: StableArray::new(len),
            generator,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn element(&self, index: usize) -> Result<Element<'_, V>, StableError> {
        self.values.get(index).map_err(|_| reject(&index))
    }
}

impl<V, F: Fn(usize) -> V> StableIntFunction<V, F> {
    pub fn apply(&self, index: usize) -> Result<&V, StableError> {
        self.element(index)?
            .get_or_compute(|| (self.generator)(index))
    }

    /// Resolve and yield every index in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<&V, StableError>> + '_ {
        (0..self.len()).map(move |index| self.apply(index))
    }
}

impl<V, E, F> StableIntFunction<V, F>
where
    E: From<StableError>,
    F: Fn(usize) -> Result<V, E>,
{
    pub fn try_apply(&self, index: usize) -> Result<&V, E> {
        self.element(index)?
            .try_get_or_compute(|| (self.generator)(index))
    }
}

impl<V: fmt::Debug, F> fmt::Debug for StableIntFunction<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StableIntFunction(")?;
        render::list(f, self.values.iter().map(|element| element.get()))?;
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::{StableEnumFunction, StableFunction, StableIntFunction, StableSupplier};
    use crate::enummap::Ordinal;
    use crate::error::StableError;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum LoadError {
        Stable(StableError),
        Flaky,
    }

    impl From<StableError> for LoadError {
        fn from(err: StableError) -> Self {
            Self::Stable(err)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Suit {
        Clubs,
        Diamonds,
        Hearts,
        Spades,
    }

    impl Ordinal for Suit {
        fn ordinal(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn supplier_runs_once() {
        let calls = Cell::new(0);
        let supplier: StableSupplier<String, _> = StableSupplier::new(|| {
            calls.set(calls.get() + 1);
            String::from("made")
        });
        assert_eq!(format!("{supplier:?}"), "StableSupplier(.unset)");
        assert_eq!(supplier.get().unwrap(), "made");
        assert_eq!(supplier.get().unwrap(), "made");
        assert_eq!(calls.get(), 1);
        assert!(supplier.value().is_set());
        assert_eq!(format!("{supplier:?}"), r#"StableSupplier("made")"#);
    }

    #[test]
    fn supplier_failure_is_retried() {
        let attempts = Cell::new(0);
        let supplier: StableSupplier<usize, _> = StableSupplier::new(|| {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(LoadError::Flaky)
            } else {
                Ok(attempts.get())
            }
        });
        assert_eq!(supplier.try_get(), Err(LoadError::Flaky));
        assert!(!supplier.value().is_set());
        assert_eq!(supplier.try_get(), Ok(&2));
        assert_eq!(supplier.try_get(), Ok(&2));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn recursion_surfaces_in_caller_error() {
        // A generator that consults its own slot sees the recursion error
        // through its own error type.
        let cell = crate::StableValue::<u32>::new();
        let got: Result<&u32, LoadError> = cell.try_get_or_compute(|| {
            let inner: Result<&u32, LoadError> = cell.try_get_or_compute(|| Ok(1));
            assert_eq!(
                inner,
                Err(LoadError::Stable(StableError::RecursiveInitialization))
            );
            Ok(2)
        });
        assert_eq!(got, Ok(&2));
    }

    #[test]
    fn keyed_function() {
        let calls = Cell::new(0);
        let len = StableFunction::new(["one".to_string(), "three".to_string()], |k: &String| {
            calls.set(calls.get() + 1);
            k.len()
        })
        .unwrap();
        assert_eq!(len.apply("three"), Ok(&5));
        assert_eq!(len.apply("three"), Ok(&5));
        assert_eq!(len.apply("one"), Ok(&3));
        assert_eq!(calls.get(), 2);
        assert_eq!(
            len.apply("two"),
            Err(StableError::InputNotAllowed {
                input: "\"two\"".to_string()
            })
        );
        assert_eq!(len.keys().count(), 2);
    }

    #[test]
    fn keyed_function_rejects_duplicates() {
        let made: Result<StableFunction<i32, i32, _>, _> = StableFunction::new([1, 1], |k: &i32| *k);
        assert!(matches!(made, Err(StableError::DuplicateKey { .. })));
    }

    #[test]
    fn empty_domain_rejects_everything() {
        let none: StableFunction<u8, u8, _> =
            StableFunction::new(Vec::<u8>::new(), |k: &u8| *k).unwrap();
        assert!(none.domain.is_none());
        assert_eq!(
            none.apply(&1u8),
            Err(StableError::InputNotAllowed {
                input: "1".to_string()
            })
        );
        assert_eq!(none.keys().count(), 0);
        assert_eq!(format!("{none:?}"), "StableFunction({})");

        let no_suits: StableEnumFunction<Suit, usize, _> =
            StableEnumFunction::new([], |s: Suit| s.ordinal()).unwrap();
        assert!(no_suits.domain.is_none());
        assert!(matches!(
            no_suits.apply(Suit::Hearts),
            Err(StableError::InputNotAllowed { .. })
        ));
    }

    #[test]
    fn enum_function() {
        let red = StableEnumFunction::new([Suit::Diamonds, Suit::Hearts], |s: Suit| {
            format!("{s:?} is red")
        })
        .unwrap();
        assert_eq!(red.apply(Suit::Hearts).unwrap(), "Hearts is red");
        assert_eq!(
            red.apply(Suit::Spades),
            Err(StableError::InputNotAllowed {
                input: "Spades".to_string()
            })
        );
        assert!(red.apply(Suit::Clubs).is_err());
    }

    #[test]
    fn enum_function_failure_is_retried() {
        let attempts = Cell::new(0);
        let f = StableEnumFunction::new([Suit::Clubs], |_: Suit| {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(LoadError::Flaky)
            } else {
                Ok("ok")
            }
        })
        .unwrap();
        assert_eq!(f.try_apply(Suit::Clubs), Err(LoadError::Flaky));
        assert_eq!(f.try_apply(Suit::Clubs), Err(LoadError::Flaky));
        assert_eq!(f.try_apply(Suit::Clubs), Ok(&"ok"));
        assert_eq!(f.try_apply(Suit::Clubs), Ok(&"ok"));
        assert_eq!(
            f.try_apply(Suit::Spades),
            Err(LoadError::Stable(StableError::InputNotAllowed {
                input: "Spades".to_string()
            }))
        );
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn int_function() {
        let calls = Cell::new(0);
        let cubes = StableIntFunction::new(3, |i: usize| {
            calls.set(calls.get() + 1);
            i * i * i
        });
        assert_eq!(format!("{cubes:?}"), "StableIntFunction([.unset, .unset, .unset])");
        assert_eq!(cubes.apply(2), Ok(&8));
        assert_eq!(format!("{cubes:?}"), "StableIntFunction([.unset, .unset, 8])");
        let all: Result<Vec<_>, _> = cubes.iter().collect();
        assert_eq!(all.unwrap(), [&0, &1, &8]);
        assert_eq!(calls.get(), 3);
        assert_eq!(
            cubes.apply(3),
            Err(StableError::InputNotAllowed {
                input: "3".to_string()
            })
        );
    }

    #[test]
    fn int_function_try_apply() {
        let parse = StableIntFunction::new(2, |i: usize| match i {
            0 => Ok(10),
            _ => Err(LoadError::Flaky),
        });
        assert_eq!(parse.try_apply(0), Ok(&10));
        assert_eq!(parse.try_apply(1), Err(LoadError::Flaky));
        assert!(matches!(
            parse.try_apply(2),
            Err(LoadError::Stable(StableError::InputNotAllowed { .. }))
        ));
    }
}
