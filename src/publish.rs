//! The publish protocol shared by every holder.
//!
//! Readers never lock: they go through [`SlotStorage::get`]. Writers find the
//! slot's lock through a [`LockSite`], re-check the slot under it, publish,
//! and retire the lock. A writer whose generator fails leaves both the slot
//! and its lock untouched, so the next caller simply tries again.

use core::hint;
use std::sync::Arc;

use crate::error::StableError;
use crate::lock::{LockSite, SlotLock};
use crate::slot::SlotStorage;

/// Find the slot's lock, or `None` if the slot turned out to be set.
fn lock_for<T, S, L>(slot: &S, site: &L) -> Option<Arc<SlotLock>>
where
    S: SlotStorage<T>,
    L: LockSite,
{
    loop {
        if slot.is_set() {
            return None;
        }
        if let Some(lock) = site.acquire() {
            return Some(lock);
        }
        // The lock was retired, so the publish that preceded the retirement
        // is about to become visible.
        hint::spin_loop();
    }
}

/// Write `value` if the slot is unset. Returns whether this call wrote.
pub(crate) fn try_set<T, S, L>(slot: &S, site: &L, value: T) -> Result<bool, StableError>
where
    S: SlotStorage<T>,
    L: LockSite,
{
    let Some(lock) = lock_for::<T, S, L>(slot, site) else {
        return Ok(false);
    };
    let _resolving = lock.enter()?;
    if slot.is_set() {
        return Ok(false);
    }
    // SAFETY: we hold the slot lock and just saw the slot unset.
    unsafe { slot.publish(value) };
    site.retire();
    Ok(true)
}

/// Return the slot's value, computing it with `generator` if it is unset.
///
/// The generator runs at most once per successful publish, while holding
/// the slot lock. If it fails, the failure is returned as is and nothing is
/// cached.
pub(crate) fn get_or_compute<'a, T, S, L, E, F>(
    slot: &'a S,
    site: &L,
    generator: F,
) -> Result<&'a T, E>
where
    S: SlotStorage<T>,
    L: LockSite,
    E: From<StableError>,
    F: FnOnce() -> Result<T, E>,
{
    if let Some(value) = slot.get() {
        return Ok(value);
    }
    let lock = match lock_for::<T, S, L>(slot, site) {
        Some(lock) => lock,
        None => return slot.get().ok_or_else(|| StableError::NotSet.into()),
    };
    let _resolving = lock.enter()?;
    if let Some(value) = slot.get() {
        // Lost the race; the winner's value stands.
        return Ok(value);
    }
    let value = generator()?;
    // SAFETY: we hold the slot lock and just saw the slot unset.
    let value = unsafe { slot.publish(value) };
    site.retire();
    Ok(value)
}
