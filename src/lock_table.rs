//! Per-key lock lifecycle for the registry's slow path.
//!
//! Locks are allocated lazily: the first miss on a key installs a
//! `Pending` slot holding a fresh mutex, and only contenders on that same
//! key ever touch it. The table-wide mutex is held just long enough to
//! get-or-insert the slot, never across construction. Once a key's
//! instance lands in the cache the slot is downgraded to `Resolved`, a
//! shared no-op state, so steady-state lookups pay no per-key
//! synchronization at all.

use fnv::FnvHashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock state for one key
#[derive(Debug)]
enum Slot {
    /// Not yet constructed; contenders serialize on this mutex
    Pending(Arc<Mutex<()>>),
    /// Permanently resolved; lookups no longer synchronize
    Resolved,
}

/// A key's lock as handed to one caller.
///
/// Holds its own reference to the pending mutex, so a concurrent
/// [`LockTable::clear`] cannot invalidate a lock a caller is waiting on.
#[derive(Debug)]
pub(crate) enum KeyLock {
    Pending(Arc<Mutex<()>>),
    Resolved,
}

impl KeyLock {
    /// Acquire the lock. Resolved keys hand back a free pass immediately.
    pub(crate) fn acquire(&self) -> KeyGuard<'_> {
        match self {
            KeyLock::Pending(mutex) => {
                // A constructor that panicked while holding this mutex must
                // not wedge the key; recover and let the next caller retry.
                KeyGuard::Held(mutex.lock().unwrap_or_else(PoisonError::into_inner))
            }
            KeyLock::Resolved => KeyGuard::Free,
        }
    }
}

/// Guard returned by [`KeyLock::acquire`]; must live across the re-check
/// and construction.
#[derive(Debug)]
pub(crate) enum KeyGuard<'a> {
    Held(#[allow(dead_code)] MutexGuard<'a, ()>),
    Free,
}

impl KeyGuard<'_> {
    /// Whether this guard actually holds a mutex
    pub(crate) fn is_held(&self) -> bool {
        matches!(self, KeyGuard::Held(_))
    }
}

/// Lazily-populated map from key to lock state.
#[derive(Debug, Default)]
pub(crate) struct LockTable<K> {
    slots: Mutex<FnvHashMap<K, Slot>>,
}

impl<K> LockTable<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Get-or-insert the slot for `key`.
    ///
    /// The table mutex is held only for the map operation; construction
    /// for one key never blocks slot allocation for another beyond that.
    pub(crate) fn slot(&self, key: &K) -> KeyLock {
        let mut slots = self.lock_slots();
        match slots
            .entry(key.clone())
            .or_insert_with(|| Slot::Pending(Arc::new(Mutex::new(()))))
        {
            Slot::Pending(mutex) => KeyLock::Pending(Arc::clone(mutex)),
            Slot::Resolved => KeyLock::Resolved,
        }
    }

    /// Downgrade `key` to the no-op state.
    ///
    /// Callers still blocked on the old pending mutex keep their own
    /// reference to it; they drain, re-check the cache, hit, and the mutex
    /// is freed with the last of them.
    pub(crate) fn resolve(&self, key: &K) {
        self.lock_slots().insert(key.clone(), Slot::Resolved);
    }

    /// Drop every slot. Keys allocate fresh pending locks on next use.
    pub(crate) fn clear(&self) {
        self.lock_slots().clear();
    }

    fn lock_slots(&self) -> MutexGuard<'_, FnvHashMap<K, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn is_resolved(&self, key: &K) -> bool {
        matches!(self.lock_slots().get(key), Some(Slot::Resolved))
    }
}
