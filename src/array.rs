//! This is the StableArray implementation.

use core::fmt;

use crate::error::StableError;
use crate::render;
use crate::slots::{Element, Slots};

/// A fixed-length array of independently resolved stable slots.
///
/// The length is chosen at construction and never changes. Each index has
/// its own lock, so threads resolving different indices never contend.
///
/// # Examples
/// ```
/// # use stablecell::StableArray;
/// let squares = StableArray::new(4);
/// let nine = squares.get(3).unwrap().get_or_compute(|| 3 * 3).unwrap();
/// assert_eq!(*nine, 9);
/// assert!(!squares.get(0).unwrap().is_set());
/// assert!(squares.get(4).is_err());
/// ```
pub struct StableArray<T> {
    slots: Slots<T>,
}

impl<T> StableArray<T> {
    /// Create an array of `len` unset slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: Slots::new(len),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slot at `index`, or [`StableError::IndexOutOfBounds`].
    pub fn get(&self, index: usize) -> Result<Element<'_, T>, StableError> {
        let len = self.len();
        if index >= len {
            return Err(StableError::IndexOutOfBounds { index, len });
        }
        Ok(self.slots.element(index))
    }

    /// Iterate over every slot's handle, in index order.
    pub fn iter(&self) -> impl Iterator<Item = Element<'_, T>> + '_ {
        (0..self.len()).map(move |index| self.slots.element(index))
    }
}

impl<T: fmt::Debug> fmt::Debug for StableArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render::list(f, (0..self.len()).map(|index| self.slots.peek(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::StableArray;
    use crate::error::StableError;
    use rstest::rstest;

    #[rstest]
    #[case(0, true)]
    #[case(4, true)]
    #[case(5, false)]
    #[case(usize::MAX, false)]
    fn bounds(#[case] index: usize, #[case] ok: bool) {
        let array = StableArray::<u8>::new(5);
        match array.get(index) {
            Ok(element) => {
                assert!(ok);
                assert_eq!(element.index(), index);
            }
            Err(err) => {
                assert!(!ok);
                assert_eq!(err, StableError::IndexOutOfBounds { index, len: 5 });
            }
        }
    }

    #[test]
    fn empty_array() {
        let array = StableArray::<u8>::new(0);
        assert!(array.is_empty());
        assert!(array.get(0).is_err());
        assert_eq!(array.iter().count(), 0);
        assert_eq!(format!("{array:?}"), "[]");
    }

    #[test]
    fn handles_are_interchangeable() {
        let array = StableArray::new(3);
        let first = array.get(1).unwrap();
        let second = array.get(1).unwrap();
        assert_eq!(first, second);
        first.try_set('x').unwrap();
        assert_eq!(second.get(), Some(&'x'));
    }

    #[test]
    fn render() {
        let array = StableArray::new(3);
        array.get(0).unwrap().try_set(10).unwrap();
        array.get(2).unwrap().try_set(30).unwrap();
        assert_eq!(format!("{array:?}"), "[10, .unset, 30]");
        let set: Vec<bool> = array.iter().map(|e| e.is_set()).collect();
        assert_eq!(set, [true, false, true]);
    }
}
