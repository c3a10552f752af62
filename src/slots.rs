//! The slot arena behind every multi-slot holder, and the handle onto one
//! of its slots.

use core::fmt;
use core::ptr;

use crate::error::StableError;
use crate::lock::Locks;
use crate::publish;
use crate::render::SlotView;
use crate::slot::{InlineSlot, SlotStorage};

/// A fixed number of slots with a lock array of the same length.
///
/// Operations on different slots never share a lock.
pub(crate) struct Slots<T> {
    slots: Box<[InlineSlot<T>]>,
    locks: Locks,
}

impl<T> Slots<T> {
    /// `len` slots, all of which can be resolved.
    pub(crate) fn new(len: usize) -> Self {
        Self::with_pending(len, len)
    }

    /// `len` slots, of which only `pending` will ever be resolved. The lock
    /// array is released once that many slots are set.
    pub(crate) fn with_pending(len: usize, pending: usize) -> Self {
        Self {
            slots: (0..len).map(|_| InlineSlot::new()).collect(),
            locks: Locks::new(len, pending),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// The handle onto slot `index`. Callers validate `index` first.
    pub(crate) fn element(&self, index: usize) -> Element<'_, T> {
        debug_assert!(index < self.slots.len());
        Element { slots: self, index }
    }

    /// The current value of slot `index`, without forcing anything.
    pub(crate) fn peek(&self, index: usize) -> Option<&T> {
        self.slots[index].get()
    }

    #[cfg(test)]
    pub(crate) fn locks(&self) -> &Locks {
        &self.locks
    }
}

/// A handle onto one slot of a multi-slot holder.
///
/// It offers the same operations as [`StableValue`](crate::StableValue).
/// Handles are cheap to copy, and two handles onto the same slot of the same
/// holder compare equal.
pub struct Element<'a, T> {
    slots: &'a Slots<T>,
    index: usize,
}

impl<'a, T> Element<'a, T> {
    fn slot(&self) -> &'a InlineSlot<T> {
        &self.slots.slots[self.index]
    }

    /// The flat position of this slot inside its holder.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Set the value if it is unset. See [`StableValue::try_set`].
    ///
    /// [`StableValue::try_set`]: crate::StableValue::try_set
    pub fn try_set(&self, value: T) -> Result<bool, StableError> {
        publish::try_set(self.slot(), &self.slots.locks.site(self.index), value)
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

    pub fn is_set(&self) -> bool {
        self.slot().is_set()
    }

    pub fn get(&self) -> Option<&'a T> {
        self.slot().get()
    }

    /// Get the value, or `fallback` if unset.
    pub fn get_or(&self, fallback: &'a T) -> &'a T {
        self.get().unwrap_or(fallback)
    }

    /// Get the value, failing with [`StableError::NotSet`] if unset.
    pub fn get_or_fail(&self) -> Result<&'a T, StableError> {
        self.get().ok_or(StableError::NotSet)
    }

    /// Get the value, computing it with `generator` if it is unset.
    pub fn get_or_compute<F>(&self, generator: F) -> Result<&'a T, StableError>
    where
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(|| Ok(generator()))
    }

    /// Get the value, computing it with a fallible `generator` if unset.
    /// Failures are returned unchanged and not cached.
    pub fn try_get_or_compute<E, F>(&self, generator: F) -> Result<&'a T, E>
    where
        E: From<StableError>,
        F: FnOnce() -> Result<T, E>,
    {
        publish::get_or_compute(self.slot(), &self.slots.locks.site(self.index), generator)
    }
}

impl<T> Clone for Element<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Element<'_, T> {}

impl<T> PartialEq for Element<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.slots, other.slots) && self.index == other.index
    }
}

impl<T> Eq for Element<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for Element<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("index", &self.index)
            .field("value", &SlotView(self.get()))
            .finish()
    }
}
