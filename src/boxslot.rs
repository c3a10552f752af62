//! This is the BoxSlot implementation.

use core::marker::PhantomData;
use core::ptr::null_mut;
use core::sync::atomic::AtomicPtr;

use crate::ordering;
use crate::slot::{Sealed, SlotStorage};

/// A slot that stores its payload on the heap.
///
/// A `BoxSlot<T>` can have two possible states:
/// * unset: the inner pointer is null.
/// * set: the inner pointer owns a `Box<T>`.
///
/// The null pointer is the only sentinel; a published `None` or unit value
/// still gets its own allocation, so "set to nothing" and "unset" never
/// collide. The slot itself stays one pointer wide no matter how large `T`
/// is, which keeps holders of big values cheap while they are unset.
pub struct BoxSlot<T> {
    inner: AtomicPtr<T>,
    phantom: PhantomData<T>,
}

impl<T> BoxSlot<T> {
    pub(crate) const fn new() -> Self {
        Self {
            inner: AtomicPtr::new(null_mut()),
            phantom: PhantomData,
        }
    }
}

impl<T> Sealed for BoxSlot<T> {}

unsafe impl<T> SlotStorage<T> for BoxSlot<T> {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Self = Self::new();

    #[inline]
    fn get(&self) -> Option<&T> {
        let ptr = ordering::read_settled(&self.inner, null_mut());

        // SAFETY: the inner pointer can only be in two states:
        // 1. Unset (null pointer): `as_ref` returns None and no &T is made.
        // 2. Set (valid owning pointer), observed with acquire semantics, so
        //    the boxed value is fully visible. Because we own the inner
        //    memory and never replace it while shared, it's safe for us to
        //    hand out shared references for as long as the BoxSlot lives.
        unsafe { ptr.as_ref() }
    }

    unsafe fn publish(&self, value: T) -> &T {
        let ptr = Box::into_raw(Box::new(value));
        // The caller holds the slot lock and saw a null pointer, so a plain
        // release publish is enough; there is no competing writer to CAS
        // against.
        ordering::publish(&self.inner, ptr);
        // SAFETY: `ptr` was just created from a Box and is now owned by the
        // slot until it is dropped or taken.
        unsafe { &*ptr }
    }

    fn take(&mut self) -> Option<T> {
        let ptr = core::mem::replace(self.inner.get_mut(), null_mut());
        if ptr.is_null() {
            return None;
        }

        // SAFETY: because we have exclusive access, we must have sole
        // ownership of the contents. `publish` created `ptr` from an owning
        // `Box<T>`, so it's safe for us to recreate that Box.
        let tmp_box = unsafe { Box::from_raw(ptr) };
        Some(*tmp_box)
    }
}

impl<T> Default for BoxSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BoxSlot<T> {
    fn drop(&mut self) {
        // We have exclusive access to the container, so this doesn't need
        // to be atomic.
        let inner = self.inner.get_mut();

        if !inner.is_null() {
            // SAFETY: We have exclusive access to the inner value, and this
            // is the last time that pointer will be seen.
            let _owned = unsafe { Box::<T>::from_raw(*inner) };
        }
    }
}

// SAFETY: same contract as InlineSlot; the payload is only reachable
// through `&T` once published and is moved in by value.
unsafe impl<T: Send + Sync> Sync for BoxSlot<T> {}
unsafe impl<T: Send> Send for BoxSlot<T> {}

#[cfg(test)]
mod tests {
    use super::BoxSlot;
    use crate::slot::SlotStorage;
    use std::sync::Arc;

    #[test]
    fn boxslot_test() {
        // Arc is used to check whether drop occurred.
        let x = Arc::new("hello".to_string());
        let y: BoxSlot<Arc<String>> = BoxSlot::new();
        assert!(!y.is_set());
        assert!(y.get().is_none());
        unsafe { y.publish(x.clone()) };
        assert!(y.is_set());
        assert_eq!(**y.get().unwrap(), "hello");

        // Verify that dropping the BoxSlot caused its inner value to be dropped too.
        assert_eq!(Arc::strong_count(&x), 2);
        drop(y);
        assert_eq!(Arc::strong_count(&x), 1);
    }

    #[test]
    fn unit_is_not_null() {
        let y: BoxSlot<()> = BoxSlot::new();
        unsafe { y.publish(()) };
        assert_eq!(y.get(), Some(&()));
    }

    #[test]
    fn consume_test() {
        let mut x = BoxSlot::<String>::new();
        unsafe { x.publish("hello".to_string()) };
        assert_eq!(x.take(), Some("hello".to_string()));
        assert_eq!(x.take(), None);
    }
}
