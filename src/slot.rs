//! Slot storage: the memory location that goes from unset to set once.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::AtomicU8;

use crate::ordering;

const UNSET: u8 = 0;
const SET: u8 = 1;

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// Storage strategy for a single slot.
///
/// Two strategies exist, and holders behave identically with either:
/// * [`InlineSlot`] stores the payload in place next to a status byte.
/// * [`BoxSlot`](crate::BoxSlot) stores the payload on the heap behind an
///   atomic pointer, with null meaning "unset".
///
/// This trait is sealed; it only exists so holders can be generic over the
/// two strategies.
///
/// # Safety
///
/// Implementations must only hand out references to a payload after
/// observing its publication with acquire semantics, and must never change a
/// published payload while shared references to the slot exist.
pub unsafe trait SlotStorage<T>: Sealed {
    /// An unset slot.
    const EMPTY: Self;

    /// Return the published payload, if any.
    fn get(&self) -> Option<&T>;

    /// Write the payload and publish it.
    ///
    /// # Safety
    ///
    /// The caller must hold the slot's lock and must have observed the slot
    /// unset while holding it.
    unsafe fn publish(&self, value: T) -> &T;

    /// Take the payload out of an exclusively-owned slot.
    fn take(&mut self) -> Option<T>;

    /// Test whether the slot holds a value.
    fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

/// A slot that stores its payload in place, paired with a status byte.
///
/// No allocation happens on publish, and `T` may be a zero-sized type or an
/// `Option` whose `None` is a legitimate published value.
pub struct InlineSlot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> InlineSlot<T> {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNSET),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

impl<T> Sealed for InlineSlot<T> {}

unsafe impl<T> SlotStorage<T> for InlineSlot<T> {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Self = Self::new();

    #[inline]
    fn get(&self) -> Option<&T> {
        if ordering::read_settled(&self.state, UNSET) == UNSET {
            return None;
        }
        // SAFETY: the status byte was observed as SET with acquire
        // semantics, so the payload write that preceded the release fence in
        // `publish` is visible and fully initialized. It is never written
        // again while `&self` is alive.
        Some(unsafe { (*self.value.get()).assume_init_ref() })
    }

    unsafe fn publish(&self, value: T) -> &T {
        // SAFETY: the caller holds the slot lock and saw the slot unset, so
        // no reader can be looking at the payload and no other writer exists.
        let stored = unsafe { (*self.value.get()).write(value) };
        ordering::publish(&self.state, SET);
        stored
    }

    fn take(&mut self) -> Option<T> {
        let state = self.state.get_mut();
        if *state == UNSET {
            return None;
        }
        *state = UNSET;
        // SAFETY: we have exclusive access and the payload was initialized.
        // Resetting the state first keeps Drop from touching it again.
        Some(unsafe { self.value.get_mut().assume_init_read() })
    }
}

impl<T> Default for InlineSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for InlineSlot<T> {
    fn drop(&mut self) {
        // We have exclusive access to the slot, so this doesn't need
        // to be atomic.
        if *self.state.get_mut() != UNSET {
            // SAFETY: the payload was initialized by `publish` and this is
            // the last time it will be seen.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

// SAFETY: a shared InlineSlot hands out `&T` to any thread (T: Sync) and
// lets any thread move a T into it (T: Send).
unsafe impl<T: Send + Sync> Sync for InlineSlot<T> {}
unsafe impl<T: Send> Send for InlineSlot<T> {}
