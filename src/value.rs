//! This is the StableValue implementation.

use core::any::type_name;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;

use crate::boxslot::BoxSlot;
use crate::error::StableError;
use crate::lock::{LockCell, LockSite};
use crate::publish;
use crate::render::SlotView;
use crate::slot::{InlineSlot, SlotStorage};

/// `StableValue` is a single-assignment, lazily-initialized container.
///
/// A `StableValue<T>` can have two possible states:
/// * unset: [`get`] returns `None`.
/// * set: [`get`] returns `Some(&T)`, forever.
///
/// The value can be supplied directly with [`try_set`] or [`set_or_fail`],
/// or computed on first use with [`get_or_compute`]. None of these need a
/// mutable reference, so a `StableValue` can be shared first and filled in
/// later. Reads never lock; only a thread that finds the value unset and
/// wants to write it takes the value's lock.
///
/// `T` may itself be an `Option`: setting `None` is a real value and is
/// distinct from the unset state.
///
/// [`get`]: StableValue::get
/// [`try_set`]: StableValue::try_set
/// [`set_or_fail`]: StableValue::set_or_fail
/// [`get_or_compute`]: StableValue::get_or_compute
pub struct StableValue<T, S: SlotStorage<T> = InlineSlot<T>> {
    slot: S,
    lock: LockCell,
    phantom: PhantomData<T>,
}

/// A [`StableValue`] that keeps its payload on the heap.
///
/// It stays one pointer plus one lock reference wide regardless of `T`, and
/// it derefs to `T` once set, panicking if it is not.
pub type StableBox<T> = StableValue<T, BoxSlot<T>>;

impl<T, S: SlotStorage<T>> StableValue<T, S> {
    /// Create an unset `StableValue`.
    ///
    /// This works in const context, which is desirable for global `static`
    /// memoized values.
    ///
    /// # Examples
    /// ```
    /// # use stablecell::StableValue;
    /// static GREETING: StableValue<String> = StableValue::new();
    /// let v = GREETING.get_or_compute(|| "hello".to_string()).unwrap();
    /// assert_eq!(v, "hello");
    /// ```
    pub const fn new() -> Self {
        Self {
            slot: S::EMPTY,
            lock: LockCell::new(),
            phantom: PhantomData,
        }
    }

    /// Create a `StableValue` that is already set.
    pub fn with_value(value: T) -> Self {
        let this = Self::new();
        // SAFETY: nobody else can see `this` yet, so it is unset and no
        // other writer exists.
        unsafe { this.slot.publish(value) };
        this.lock.retire();
        this
    }

    /// Set the value if it is unset.
    ///
    /// Returns `Ok(true)` if this call stored `value`, `Ok(false)` if a value
    /// was already present (in which case `value` is dropped). Blocks only
    /// while another thread is in the middle of setting this value.
    ///
    /// Fails with [`StableError::RecursiveInitialization`] if called from a
    /// generator that is computing this same value.
    pub fn try_set(&self, value: T) -> Result<bool, StableError> {
        publish::try_set(&self.slot, &self.lock, value)
    }

    /// Set the value, failing with [`StableError::AlreadySet`] if it was
    /// already present.
    pub fn set_or_fail(&self, value: T) -> Result<(), StableError> {
        if self.try_set(value)? {
            Ok(())
        } else {
            Err(StableError::AlreadySet)
        }
    }

    /// Test whether the value is set.
    pub fn is_set(&self) -> bool {
        self.slot.is_set()
    }

    /// Get the value, if set.
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    /// Get the value, or `fallback` if unset.
    pub fn get_or<'a>(&'a self, fallback: &'a T) -> &'a T {
        self.get().unwrap_or(fallback)
    }

    /// Get the value, failing with [`StableError::NotSet`] if unset.
    pub fn get_or_fail(&self) -> Result<&T, StableError> {
        self.get().ok_or(StableError::NotSet)
    }

    /// Get the value, computing it with `generator` if it is unset.
    ///
    /// Concurrent callers wait for a single computation; `generator` runs on
    /// at most one thread and its result is shared by all of them.
    pub fn get_or_compute<F>(&self, generator: F) -> Result<&T, StableError>
    where
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(|| Ok(generator()))
    }

    /// Get the value, computing it with a fallible `generator` if unset.
    ///
    /// If `generator` fails, its error is returned unchanged and the value
    /// stays unset: the next call runs a generator again.
    ///
    /// # Examples
    /// ```
    /// # use stablecell::{StableError, StableValue};
    /// let port: StableValue<u16> = StableValue::new();
    /// let bad: Result<&u16, StableError> = port.try_get_or_compute(|| Err(StableError::NotSet));
    /// assert!(bad.is_err());
    /// assert!(!port.is_set());
    /// assert_eq!(port.try_get_or_compute::<StableError, _>(|| Ok(8080)), Ok(&8080));
    /// ```
    pub fn try_get_or_compute<E, F>(&self, generator: F) -> Result<&T, E>
    where
        E: From<StableError>,
        F: FnOnce() -> Result<T, E>,
    {
        publish::get_or_compute(&self.slot, &self.lock, generator)
    }

    /// Consume the `StableValue` and return its contents.
    pub fn into_inner(mut self) -> Option<T> {
        self.slot.take()
    }
}

impl<T, S: SlotStorage<T>> Default for StableValue<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: SlotStorage<T>> From<T> for StableValue<T, S> {
    fn from(value: T) -> Self {
        Self::with_value(value)
    }
}

impl<T: fmt::Debug, S: SlotStorage<T>> fmt::Debug for StableValue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StableValue")
            .field(&SlotView(self.get()))
            .finish()
    }
}

impl<T> Deref for StableBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get().unwrap_or_else(|| {
            panic!(
                "attempted to deref unset StableBox<{}>",
                type_name::<T>(),
            )
        })
    }
}

/// Must fail to compile because StableValue<Rc> must not be Send.
/// ```compile_fail
/// use stablecell::StableValue;
/// use std::rc::Rc;
///
/// fn require_send<T: Send>(_t: &T) {}
///
/// let x = StableValue::<Rc<u32>>::new();
/// require_send(&x); // <- must fail to compile.
/// ```
///
/// Must fail to compile because StableValue<Cell> must not be Sync.
/// ```compile_fail
/// use stablecell::StableValue;
/// use std::cell::Cell;
///
/// fn require_sync<T: Sync>(_t: &T) {}
///
/// let x = StableValue::<Cell<u32>>::new();
/// require_sync(&x); // must fail to compile.
/// ```
struct _Unused; // Only exists to get the compile-fail doctest

#[cfg(test)]
mod tests {
    use super::{StableBox, StableValue};
    use crate::error::StableError;
    use std::cell::Cell;
    use std::sync::Arc;

    #[test]
    fn stablevalue_test() {
        // Arc is used to check whether drop occurred.
        let x = Arc::new("hello".to_string());
        let y: StableValue<Arc<String>> = StableValue::new();
        assert!(!y.is_set());
        assert_eq!(y.try_set(x.clone()), Ok(true));
        assert!(y.is_set());
        assert_eq!(**y.get().unwrap(), "hello");

        // Verify that dropping the StableValue caused its inner value to be dropped too.
        assert_eq!(Arc::strong_count(&x), 2);
        drop(y);
        assert_eq!(Arc::strong_count(&x), 1);
    }

    #[test]
    fn single_assignment() {
        let v = StableValue::<_>::new();
        assert_eq!(v.try_set(1), Ok(true));
        assert_eq!(v.try_set(2), Ok(false));
        assert_eq!(v.set_or_fail(3), Err(StableError::AlreadySet));
        assert_eq!(v.get(), Some(&1));
    }

    #[test]
    fn unset_reads() {
        let v = StableValue::<u32>::new();
        assert_eq!(v.get(), None);
        assert_eq!(v.get_or(&5), &5);
        assert_eq!(v.get_or_fail(), Err(StableError::NotSet));
        v.set_or_fail(6).unwrap();
        assert_eq!(v.get_or(&5), &6);
        assert_eq!(v.get_or_fail(), Ok(&6));
    }

    #[test]
    fn none_is_not_unset() {
        let v = StableValue::<Option<u32>>::new();
        assert_eq!(v.try_set(None), Ok(true));
        assert!(v.is_set());
        assert_eq!(v.get_or_fail(), Ok(&None));

        let computed = StableBox::<Option<u32>>::new();
        assert_eq!(computed.get_or_compute(|| None), Ok(&None));
        assert!(computed.is_set());
    }

    #[test]
    fn compute_once() {
        let calls = Cell::new(0);
        let v = StableValue::<_>::new();
        for _ in 0..3 {
            let got = v.get_or_compute(|| {
                calls.set(calls.get() + 1);
                "computed"
            });
            assert_eq!(got, Ok(&"computed"));
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(v.try_set("late"), Ok(false));
    }

    #[test]
    fn recursive_compute_fails() {
        let v = StableValue::<u32>::new();
        let got = v.get_or_compute(|| match v.get_or_compute(|| 1) {
            Err(StableError::RecursiveInitialization) => 2,
            other => panic!("unexpected {other:?}"),
        });
        assert_eq!(got, Ok(&2));
    }

    #[test]
    fn panicking_generator_leaves_unset() {
        let v = StableValue::<u32>::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = v.get_or_compute(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!v.is_set());
        assert_eq!(v.get_or_compute(|| 4), Ok(&4));
    }

    #[test]
    fn with_value_and_into_inner() {
        let v: StableValue<String> = StableValue::with_value("x".to_string());
        assert!(v.is_set());
        assert_eq!(v.try_set("y".to_string()), Ok(false));
        assert_eq!(v.into_inner(), Some("x".to_string()));
        assert_eq!(StableValue::<String>::new().into_inner(), None);
    }

    #[test]
    fn stablebox_deref() {
        let b: StableBox<String> = StableBox::new();
        b.set_or_fail("hello".to_string()).unwrap();
        // implicit deref sees through to the String.
        assert_eq!(b.len(), 5);
        assert_eq!(&b[2..], "llo");
    }

    #[test]
    #[should_panic]
    #[cfg_attr(miri, ignore)] // Miri doesn't understand should_panic
    fn stablebox_panic_deref() {
        let b = StableBox::<String>::new();
        let _y = b.len();
    }

    #[test]
    fn debug_render() {
        let v = StableValue::<u32>::new();
        assert_eq!(format!("{v:?}"), "StableValue(.unset)");
        v.try_set(3).unwrap();
        assert_eq!(format!("{v:?}"), "StableValue(3)");
    }

    #[test]
    fn const_test() {
        static X: StableBox<String> = StableBox::new();
        X.try_set("hello".to_string()).unwrap();
        assert_eq!(*X, "hello");
    }
}
