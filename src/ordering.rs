//! Memory-ordering helpers for the publish protocol.
//!
//! Every slot has a status word whose "unset" value is known up front: a
//! status byte, a payload pointer, or an integer field. Writers publish a
//! payload with [`publish`], readers observe it with [`read_settled`].
//!
//! Reasoning about the atomic ordering:
//! The writer stores the payload first, then issues a `Release` fence, then
//! stores the status word. A reader that observes a settled status word
//! must then issue an `Acquire` fence (or perform an `Acquire` load) before
//! touching the payload, which pairs with the writer's fence and makes the
//! payload and everything the generator wrote before returning visible.
//!
//! Once a slot is warm, the common case is a `Relaxed` load followed by an
//! `Acquire` fence, which is free on most targets. A `Relaxed` load that
//! sees "unset" proves nothing, so it is repeated with `Acquire` before the
//! caller is allowed to conclude the slot is empty.

use core::sync::atomic::{fence, AtomicI32, AtomicI64, AtomicPtr, AtomicU8, Ordering};

/// An atomic word that can carry a slot's status.
pub(crate) trait StatusWord {
    type Raw: Copy + PartialEq;

    fn load(&self, order: Ordering) -> Self::Raw;
    fn store(&self, value: Self::Raw, order: Ordering);
}

macro_rules! status_word {
    ($atomic:ty, $raw:ty) => {
        impl StatusWord for $atomic {
            type Raw = $raw;

            #[inline]
            fn load(&self, order: Ordering) -> $raw {
                <$atomic>::load(self, order)
            }

            #[inline]
            fn store(&self, value: $raw, order: Ordering) {
                <$atomic>::store(self, value, order)
            }
        }
    };
}

status_word!(AtomicU8, u8);
status_word!(AtomicI32, i32);
status_word!(AtomicI64, i64);

impl<T> StatusWord for AtomicPtr<T> {
    type Raw = *mut T;

    #[inline]
    fn load(&self, order: Ordering) -> *mut T {
        AtomicPtr::load(self, order)
    }

    #[inline]
    fn store(&self, value: *mut T, order: Ordering) {
        AtomicPtr::store(self, value, order)
    }
}

/// Read a status word with acquire semantics, using a plain load first.
///
/// Returns `unset` only if an `Acquire` load observed it. Any other return
/// value is safe to act on: the matching payload is visible.
#[inline]
pub(crate) fn read_settled<W: StatusWord>(word: &W, unset: W::Raw) -> W::Raw {
    let plain = word.load(Ordering::Relaxed);
    if plain != unset {
        fence(Ordering::Acquire);
        return plain;
    }
    word.load(Ordering::Acquire)
}

/// Make a payload written by this thread visible through `word`.
///
/// The payload store must be complete before this is called. Callers hold
/// the slot's lock, so the word is never published twice.
#[inline]
pub(crate) fn publish<W: StatusWord>(word: &W, settled: W::Raw) {
    fence(Ordering::Release);
    word.store(settled, Ordering::Relaxed);
}
