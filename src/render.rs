//! Debug rendering shared by the holders.
//!
//! Unset slots render as `.unset` so a partially resolved holder can be
//! printed without forcing anything.

use core::fmt;

pub(crate) const UNSET: &str = ".unset";

/// Renders one slot: its value's `Debug` form, or `.unset`.
pub(crate) struct SlotView<'a, T>(pub(crate) Option<&'a T>);

impl<T: fmt::Debug> fmt::Debug for SlotView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str(UNSET),
        }
    }
}

/// `[a, .unset, c]`
pub(crate) fn list<'a, T, I>(f: &mut fmt::Formatter<'_>, slots: I) -> fmt::Result
where
    T: fmt::Debug + 'a,
    I: IntoIterator<Item = Option<&'a T>>,
{
    f.debug_list().entries(slots.into_iter().map(SlotView)).finish()
}

/// `{k1: a, k2: .unset}`
pub(crate) fn map<'a, K, V, I>(f: &mut fmt::Formatter<'_>, entries: I) -> fmt::Result
where
    K: fmt::Debug + 'a,
    V: fmt::Debug + 'a,
    I: IntoIterator<Item = (&'a K, Option<&'a V>)>,
{
    f.debug_map()
        .entries(entries.into_iter().map(|(k, v)| (k, SlotView(v))))
        .finish()
}

/// Row-major nesting: `[[a, b, c], [d, .unset, f]]` for a 2x3 shape.
///
/// A zero-dimensional shape renders its single slot bare.
pub(crate) fn nested<T: fmt::Debug>(
    f: &mut fmt::Formatter<'_>,
    dims: &[usize],
    slots: &[Option<&T>],
) -> fmt::Result {
    let Some((&outer, inner)) = dims.split_first() else {
        return match slots.first() {
            Some(slot) => fmt::Debug::fmt(&SlotView(*slot), f),
            None => f.write_str("[]"),
        };
    };
    let stride: usize = inner.iter().product();
    let mut out = f.debug_list();
    for row in 0..outer {
        let start = row * stride;
        out.entry(&Nested {
            dims: inner,
            slots: &slots[start..start + stride],
        });
    }
    out.finish()
}

struct Nested<'a, 'b, T> {
    dims: &'a [usize],
    slots: &'a [Option<&'b T>],
}

impl<T: fmt::Debug> fmt::Debug for Nested<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        nested(f, self.dims, self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::{list, map, nested};
    use core::fmt;

    struct Flat(Vec<Option<u32>>);

    impl fmt::Debug for Flat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            list(f, self.0.iter().map(Option::as_ref))
        }
    }

    struct Grid(Vec<usize>, Vec<Option<u32>>);

    impl fmt::Debug for Grid {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let slots: Vec<Option<&u32>> = self.1.iter().map(Option::as_ref).collect();
            nested(f, &self.0, &slots)
        }
    }

    struct Keyed(Vec<(&'static str, Option<u32>)>);

    impl fmt::Debug for Keyed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            map(f, self.0.iter().map(|(k, v)| (k, v.as_ref())))
        }
    }

    #[test]
    fn render_list() {
        assert_eq!(format!("{:?}", Flat(vec![Some(1), None])), "[1, .unset]");
    }

    #[test]
    fn render_map() {
        let keyed = Keyed(vec![("a", Some(1)), ("b", None)]);
        assert_eq!(format!("{keyed:?}"), r#"{"a": 1, "b": .unset}"#);
    }

    #[test]
    fn render_grid() {
        let grid = Grid(vec![2, 3], vec![Some(1), Some(2), None, None, Some(5), Some(6)]);
        assert_eq!(format!("{grid:?}"), "[[1, 2, .unset], [.unset, 5, 6]]");
        assert_eq!(format!("{:?}", Grid(vec![], vec![Some(9)])), "9");
        assert_eq!(format!("{:?}", Grid(vec![], vec![None])), ".unset");
    }
}
