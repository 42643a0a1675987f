//! Multiton registry: at most one instance per derived key.
//!
//! The registry is a memoizing cache of constructed objects. Callers hand
//! it constructor arguments; it derives a key, and every caller whose
//! arguments derive to the same key receives the same instance, with the
//! constructor executing exactly once no matter how many callers race.
//!
//! # Locking protocol
//!
//! ```text
//! get_or_create(args, ctor)
//!   ├── derive key                      (no locks)
//!   ├── read cache ── hit ─────────────▶ return shared handle
//!   ├── get-or-insert per-key lock     (table mutex, insert only)
//!   ├── acquire per-key lock           (blocks same-key racers only)
//!   ├── re-read cache ── hit ──────────▶ return shared handle
//!   ├── ctor(&args) ── err ────────────▶ propagate, cache untouched
//!   ├── insert handle, resolve lock    (downgrade to no-op)
//!   └── return handle
//! ```
//!
//! A single global construction lock would serialize unrelated keys; a
//! plain concurrent map would let racers construct duplicates. Per-key
//! locks bound contention to callers racing on the *same* key, and the
//! downgrade removes even that cost once a key is resolved: steady-state
//! lookups are one uncontended read-lock probe.
//!
//! The constructor closure is not part of the default key; see the
//! [`key`](crate::key) module docs for the limitation and the sanctioned
//! workaround.

use crate::error::{KeyError, RegistryError};
use crate::handle::{Blueprint, Handle};
use crate::key::{ArgsKey, KeyDeriver};
use crate::lock_table::LockTable;
use fnv::FnvHashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Keyed-singleton registry for one participating type.
///
/// Generic over the argument type `A`, the managed instance type `T`, and
/// the key-derivation policy `D` (defaulting to [`ArgsKey`], which keys on
/// the arguments themselves). Two registries never share keys, even when
/// their argument shapes coincide.
///
/// # Example
///
/// ```
/// use multiton::Registry;
///
/// struct Connection {
///     dsn: String,
/// }
///
/// let registry: Registry<String, Connection> = Registry::new();
/// let a = registry
///     .get_or_init("db://primary".to_string(), |dsn| Connection { dsn: dsn.clone() })
///     .unwrap();
/// let b = registry
///     .get_or_init("db://primary".to_string(), |dsn| Connection { dsn: dsn.clone() })
///     .unwrap();
/// assert!(a.ptr_eq(&b));
/// assert_eq!(a.dsn, "db://primary");
/// ```
pub struct Registry<A, T, D = ArgsKey>
where
    D: KeyDeriver<A>,
{
    deriver: D,
    cache: RwLock<FnvHashMap<D::Key, Handle<T, A>>>,
    locks: LockTable<D::Key>,
}

impl<A, T> Registry<A, T, ArgsKey>
where
    A: Eq + Hash + Clone + Send + Sync,
{
    /// Registry keyed on the constructor arguments themselves
    pub fn new() -> Self {
        Self::with_deriver(ArgsKey)
    }
}

impl<A, T> Default for Registry<A, T, ArgsKey>
where
    A: Eq + Hash + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, D> Registry<A, T, D>
where
    D: KeyDeriver<A>,
{
    /// Registry with a custom key-derivation policy
    pub fn with_deriver(deriver: D) -> Self {
        Self {
            deriver,
            cache: RwLock::new(FnvHashMap::default()),
            locks: LockTable::new(),
        }
    }

    /// Return the instance for `args`, constructing it if absent.
    ///
    /// Exactly one racing caller per key executes `ctor`; the rest block on
    /// that key's lock and then observe the winner's instance. Callers on
    /// unrelated keys are never serialized against each other.
    ///
    /// On constructor failure the error propagates unchanged and nothing is
    /// cached: a later call with the same key is free to retry.
    pub fn get_or_create<E, F>(&self, args: A, ctor: F) -> Result<Handle<T, A>, RegistryError<E>>
    where
        F: FnOnce(&A) -> Result<T, E>,
    {
        let key = self.deriver.derive(&args)?;

        // Fast path: resolved keys cost one uncontended read probe.
        if let Some(handle) = self.read_cache().get(&key) {
            trace!("fast-path cache hit");
            return Ok(handle.share());
        }

        let lock = self.locks.slot(&key);
        let guard = lock.acquire();

        // Re-check: a racer may have won between the miss and our acquire.
        if let Some(handle) = self.read_cache().get(&key) {
            trace!("cache hit after lock acquisition");
            return Ok(handle.share());
        }

        if !guard.is_held() {
            // Resolved slot with no cache entry: a reset raced us between
            // the slot lookup and the re-check. Start over on a fresh slot.
            return self.get_or_create(args, ctor);
        }

        let value = ctor(&args).map_err(RegistryError::Construction)?;
        let handle = Handle::new(value, args);
        self.write_cache().insert(key.clone(), handle.share());
        self.locks.resolve(&key);
        debug!("constructed new instance, lock downgraded");
        Ok(handle)
    }

    /// [`get_or_create`](Self::get_or_create) for infallible constructors
    pub fn get_or_init<F>(&self, args: A, ctor: F) -> Result<Handle<T, A>, KeyError>
    where
        F: FnOnce(&A) -> T,
    {
        self.get_or_create(args, |args| Ok::<_, Infallible>(ctor(args)))
            .map_err(|err| match err {
                RegistryError::KeyDerivation(key_err) => key_err,
                RegistryError::Construction(never) => match never {},
            })
    }

    /// Whether an instance already exists for `args`.
    ///
    /// Pure lookup: never constructs, never touches the lock table. Fails
    /// only if the key-derivation policy rejects the arguments.
    pub fn is_initialized(&self, args: &A) -> Result<bool, KeyError> {
        let key = self.deriver.derive(args)?;
        Ok(self.read_cache().contains_key(&key))
    }

    /// Redeem a deserialized [`Blueprint`] for the canonical instance.
    ///
    /// Re-derives the key from the stored arguments and returns the cached
    /// instance, constructing it only if absent. This is the only road back
    /// from a serialized handle; it can never produce an unregistered copy.
    pub fn restore<E, F>(
        &self,
        blueprint: Blueprint<A>,
        ctor: F,
    ) -> Result<Handle<T, A>, RegistryError<E>>
    where
        F: FnOnce(&A) -> Result<T, E>,
    {
        self.get_or_create(blueprint.into_args(), ctor)
    }

    /// Clear every instance and every lock slot.
    ///
    /// Intended for test isolation. Both maps are cleared while the cache
    /// write lock is held, so a racing `get_or_create` observes either a
    /// whole entry or none, never a torn one; its relative ordering against
    /// the reset is otherwise unspecified.
    pub fn reset(&self) {
        let mut cache = self.write_cache();
        self.locks.clear();
        cache.clear();
        debug!("registry reset");
    }

    /// Number of cached instances
    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    /// Whether the registry holds no instances
    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    // Poisoned locks are recovered: a constructor that panicked must leave
    // its key retryable, same as one that returned an error.
    fn read_cache(&self) -> RwLockReadGuard<'_, FnvHashMap<D::Key, Handle<T, A>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, FnvHashMap<D::Key, Handle<T, A>>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
