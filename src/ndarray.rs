//! This is the StableNdArray implementation.

use core::fmt;

use crate::error::StableError;
use crate::render;
use crate::slots::{Element, Slots};

/// The dimensions of a multi-dimensional holder, with row-major strides.
///
/// A zero-dimensional shape has exactly one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    dims: Box<[usize]>,
    strides: Box<[usize]>,
    len: usize,
}

impl Shape {
    /// Fails with [`StableError::ShapeOverflow`] if the element count does
    /// not fit in `usize`.
    pub fn new(dims: &[usize]) -> Result<Self, StableError> {
        let mut strides = vec![0; dims.len()];
        let mut len: usize = 1;
        for (axis, &dim) in dims.iter().enumerate().rev() {
            strides[axis] = len;
            len = len.checked_mul(dim).ok_or(StableError::ShapeOverflow)?;
        }
        Ok(Self {
            dims: dims.into(),
            strides: strides.into_boxed_slice(),
            len,
        })
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The row-major flat index of `coords`.
    ///
    /// `index = i0*d1*d2*... + i1*d2*... + ...`
    pub fn flat_index(&self, coords: &[usize]) -> Result<usize, StableError> {
        if coords.len() != self.rank() {
            return Err(StableError::ShapeMismatch {
                expected: self.rank(),
                actual: coords.len(),
            });
        }
        let mut index = 0;
        for (axis, (&coord, &dim)) in coords.iter().zip(self.dims.iter()).enumerate() {
            if coord >= dim {
                return Err(StableError::CoordinateOutOfBounds {
                    axis,
                    index: coord,
                    len: dim,
                });
            }
            index += coord * self.strides[axis];
        }
        Ok(index)
    }
}

/// A multi-dimensional array of stable slots.
///
/// Slots live in one flat array addressed in row-major order; the shape is
/// fixed at construction.
///
/// # Examples
/// ```
/// # use stablecell::{StableError, StableNdArray};
/// let grid = StableNdArray::new(&[2, 3]).unwrap();
/// grid.get2(1, 2).unwrap().try_set('x').unwrap();
/// assert!(!grid.get2(0, 0).unwrap().is_set());
/// assert!(matches!(grid.get2(2, 0), Err(StableError::CoordinateOutOfBounds { .. })));
/// assert!(matches!(grid.get1(0), Err(StableError::ShapeMismatch { .. })));
/// ```
pub struct StableNdArray<T> {
    shape: Shape,
    slots: Slots<T>,
}

impl<T> StableNdArray<T> {
    pub fn new(dims: &[usize]) -> Result<Self, StableError> {
        Ok(Self::with_shape(Shape::new(dims)?))
    }

    pub fn with_shape(shape: Shape) -> Self {
        let slots = Slots::new(shape.len());
        Self { shape, slots }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The slot at `coords`; one coordinate per axis.
    pub fn get(&self, coords: &[usize]) -> Result<Element<'_, T>, StableError> {
        let index = self.shape.flat_index(coords)?;
        Ok(self.slots.element(index))
    }

    /// The single slot of a zero-dimensional array.
    pub fn get0(&self) -> Result<Element<'_, T>, StableError> {
        self.get(&[])
    }

    pub fn get1(&self, i: usize) -> Result<Element<'_, T>, StableError> {
        self.get(&[i])
    }

    pub fn get2(&self, i: usize, j: usize) -> Result<Element<'_, T>, StableError> {
        self.get(&[i, j])
    }

    pub fn get3(&self, i: usize, j: usize, k: usize) -> Result<Element<'_, T>, StableError> {
        self.get(&[i, j, k])
    }
}

impl<T: fmt::Debug> fmt::Debug for StableNdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<Option<&T>> = (0..self.slots.len()).map(|i| self.slots.peek(i)).collect();
        render::nested(f, self.shape.dims(), &slots)
    }
}

#[cfg(test)]
mod tests {
    use super::{Shape, StableNdArray};
    use crate::error::StableError;
    use proptest::prelude::*;

    #[test]
    fn two_by_three() {
        let grid = StableNdArray::new(&[2, 3]).unwrap();
        let corner = grid.get2(1, 2).unwrap();
        let origin = grid.get2(0, 0).unwrap();
        assert_ne!(corner, origin);
        assert_eq!(corner.index(), 5);
        corner.try_set("corner").unwrap();
        assert!(!origin.is_set());
        assert_eq!(origin.get_or_compute(|| "origin"), Ok(&"origin"));
        assert_eq!(
            grid.get2(2, 0).err(),
            Some(StableError::CoordinateOutOfBounds {
                axis: 0,
                index: 2,
                len: 2
            })
        );
        assert_eq!(
            grid.get3(0, 0, 0).err(),
            Some(StableError::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            format!("{grid:?}"),
            r#"[["origin", .unset, .unset], [.unset, .unset, "corner"]]"#
        );
    }

    #[test]
    fn zero_dimensional_is_scalar() {
        let scalar = StableNdArray::new(&[]).unwrap();
        assert_eq!(scalar.shape().len(), 1);
        assert_eq!(format!("{scalar:?}"), ".unset");
        scalar.get0().unwrap().try_set(7).unwrap();
        assert_eq!(scalar.get(&[]).unwrap().get(), Some(&7));
        assert!(matches!(
            scalar.get1(0),
            Err(StableError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn three_dimensional() {
        let cube = StableNdArray::<u32>::new(&[2, 3, 4]).unwrap();
        assert_eq!(cube.get3(1, 2, 3).unwrap().index(), 23);
        assert_eq!(cube.get3(0, 1, 0).unwrap().index(), 4);
        assert!(cube.get3(0, 3, 0).is_err());
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(
            Shape::new(&[usize::MAX, 2]).err(),
            Some(StableError::ShapeOverflow)
        );
    }

    proptest! {
        #[test]
        fn row_major_is_a_bijection(dims in prop::collection::vec(1usize..5, 0..4)) {
            let shape = Shape::new(&dims).unwrap();
            let mut seen = vec![false; shape.len()];
            let mut coords = vec![0; dims.len()];
            loop {
                let index = shape.flat_index(&coords).unwrap();
                prop_assert!(!seen[index]);
                seen[index] = true;

                // Odometer increment, last axis fastest.
                let mut axis = dims.len();
                loop {
                    if axis == 0 {
                        prop_assert!(seen.iter().all(|&s| s));
                        return Ok(());
                    }
                    axis -= 1;
                    coords[axis] += 1;
                    if coords[axis] < dims[axis] {
                        break;
                    }
                    coords[axis] = 0;
                }
            }
        }
    }
}
