//! Per-slot locks and their lifecycle.
//!
//! A slot's lock is created on demand by the first writer that needs it,
//! shared by every thread racing on that slot, and replaced by a tombstone
//! once the slot is resolved. Holders with many slots keep their locks in a
//! [`Locks`] table, which also counts the slots still unresolved; when that
//! count reaches zero the whole table is dropped.
//!
//! Retired locks are reference counted, so a thread that loaded a lock just
//! before it was retired can still acquire it safely. It will then find the
//! slot set and leave without writing.

use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwapOption;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::StableError;

/// The mutex guarding one slot's transition from unset to set.
///
/// It is reentrant so the owning thread can come back to it, which is how a
/// generator that asks for its own slot is caught: the busy flag is already
/// raised and the request fails instead of deadlocking.
pub(crate) struct SlotLock {
    mutex: ReentrantMutex<Cell<bool>>,
}

impl SlotLock {
    fn new() -> Self {
        Self {
            mutex: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Block until this thread owns the slot's transition.
    pub(crate) fn enter(&self) -> Result<Resolving<'_>, StableError> {
        let guard = self.mutex.lock();
        if guard.get() {
            return Err(StableError::RecursiveInitialization);
        }
        guard.set(true);
        Ok(Resolving { guard })
    }
}

/// Proof that the current thread is resolving a slot.
///
/// Dropping it (including while unwinding out of a generator) lowers the
/// busy flag and releases the lock.
pub(crate) struct Resolving<'a> {
    guard: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for Resolving<'_> {
    fn drop(&mut self) {
        self.guard.set(false);
    }
}

fn tombstone() -> &'static Arc<SlotLock> {
    static TOMBSTONE: OnceLock<Arc<SlotLock>> = OnceLock::new();
    TOMBSTONE.get_or_init(|| Arc::new(SlotLock::new()))
}

fn is_tombstone(lock: &Arc<SlotLock>) -> bool {
    Arc::ptr_eq(lock, tombstone())
}

/// Where the publish protocol finds a slot's lock.
pub(crate) trait LockSite {
    /// Return the slot's lock, creating it if needed.
    ///
    /// `None` means the slot's race is settled: its lock was retired, so the
    /// slot is already set.
    fn acquire(&self) -> Option<Arc<SlotLock>>;

    /// Retire the slot's lock after a successful publish.
    ///
    /// Must be called exactly once per slot, by the thread that published.
    fn retire(&self);
}

/// A single lock reference: absent, live, or tombstoned.
pub(crate) struct LockCell {
    lock: ArcSwapOption<SlotLock>,
}

impl LockCell {
    pub(crate) const fn new() -> Self {
        Self {
            lock: ArcSwapOption::const_empty(),
        }
    }

    #[cfg(test)]
    fn is_retired(&self) -> bool {
        match &*self.lock.load() {
            Some(lock) => is_tombstone(lock),
            None => false,
        }
    }
}

impl LockSite for LockCell {
    fn acquire(&self) -> Option<Arc<SlotLock>> {
        if let Some(lock) = self.lock.load_full() {
            return (!is_tombstone(&lock)).then_some(lock);
        }

        let fresh = Arc::new(SlotLock::new());
        // Install `fresh` only if no lock exists yet. The returned value is
        // what was there when our update went through.
        let prev = self.lock.rcu(|current| match current {
            None => Some(Arc::clone(&fresh)),
            Some(lock) => Some(Arc::clone(lock)),
        });
        match prev {
            None => {
                tracing::trace!("slot lock created");
                Some(fresh)
            }
            Some(lock) if is_tombstone(&lock) => None,
            Some(lock) => Some(lock),
        }
    }

    fn retire(&self) {
        self.lock.store(Some(Arc::clone(tombstone())));
        tracing::trace!("slot lock retired");
    }
}

impl Default for LockCell {
    fn default() -> Self {
        Self::new()
    }
}

struct LockTable {
    cells: Box<[LockCell]>,
    unresolved: AtomicUsize,
}

/// The lock array of a multi-slot holder.
pub(crate) struct Locks {
    table: ArcSwapOption<LockTable>,
}

impl Locks {
    /// Create a table of `len` lock cells, of which `pending` belong to
    /// slots that can ever be resolved.
    pub(crate) fn new(len: usize, pending: usize) -> Self {
        let table = (pending > 0).then(|| {
            Arc::new(LockTable {
                cells: (0..len).map(|_| LockCell::new()).collect(),
                unresolved: AtomicUsize::new(pending),
            })
        });
        Self {
            table: ArcSwapOption::new(table),
        }
    }

    /// The lock site of the slot at `index`.
    pub(crate) fn site(&self, index: usize) -> TableSite<'_> {
        TableSite { locks: self, index }
    }

    #[cfg(test)]
    pub(crate) fn is_live(&self) -> bool {
        self.table.load().is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_retired(&self, index: usize) -> bool {
        match &*self.table.load() {
            Some(table) => table.cells[index].is_retired(),
            None => true,
        }
    }
}

/// One slot's entry in a [`Locks`] table.
pub(crate) struct TableSite<'a> {
    locks: &'a Locks,
    index: usize,
}

impl LockSite for TableSite<'_> {
    fn acquire(&self) -> Option<Arc<SlotLock>> {
        let table = self.locks.table.load_full()?;
        table.cells[self.index].acquire()
    }

    fn retire(&self) {
        let Some(table) = self.locks.table.load_full() else {
            return;
        };
        table.cells[self.index].retire();
        if table.unresolved.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.locks.table.store(None);
            tracing::trace!(slots = table.cells.len(), "all slots resolved, lock table released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LockCell, LockSite, Locks};
    use crate::error::StableError;

    #[test]
    fn cell_lifecycle() {
        let cell = LockCell::new();
        let first = cell.acquire().unwrap();
        let second = cell.acquire().unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert!(!cell.is_retired());

        cell.retire();
        assert!(cell.is_retired());
        assert!(cell.acquire().is_none());
    }

    #[test]
    fn reentry_is_detected() {
        let cell = LockCell::new();
        let lock = cell.acquire().unwrap();
        let outer = lock.enter().unwrap();
        assert_eq!(
            lock.enter().err(),
            Some(StableError::RecursiveInitialization)
        );
        drop(outer);
        assert!(lock.enter().is_ok());
    }

    #[test]
    fn table_released_after_last_retire() {
        let locks = Locks::new(3, 2);
        assert!(locks.is_live());
        locks.site(0).acquire().unwrap();
        locks.site(0).retire();
        assert!(locks.is_retired(0));
        assert!(!locks.is_retired(2));
        assert!(locks.is_live());
        locks.site(2).retire();
        assert!(!locks.is_live());
        assert!(locks.site(1).acquire().is_none());
    }

    #[test]
    fn empty_table_is_never_live() {
        let locks = Locks::new(0, 0);
        assert!(!locks.is_live());
    }
}
