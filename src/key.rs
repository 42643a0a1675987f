//! Key-derivation policies mapping constructor arguments to cache keys.
//!
//! A registry decides which constructions are "the same" by deriving a
//! comparable key from the constructor arguments. The default policy,
//! [`ArgsKey`], uses the argument value itself: two calls share an instance
//! iff their arguments compare equal. [`DeriveWith`] adapts a closure for
//! coarser or finer policies (hash a subset of the arguments, ignore
//! order-insensitive fields, and so on).
//!
//! Known limitation, inherited deliberately: the constructor closure passed
//! to `get_or_create` never participates in the key. Two calls with equal
//! arguments but different constructor behavior resolve to the same
//! instance. Closure identity is not stable across reconstructions, so
//! hashing it would be unreliable; register a custom deriver that folds the
//! distinguishing information into the arguments instead.

use crate::error::KeyError;
use std::hash::Hash;

/// Policy mapping constructor arguments to a cache key.
///
/// Implementations must be pure: deriving the same arguments twice must
/// yield keys that compare equal, or the exactly-once guarantee is lost.
pub trait KeyDeriver<A> {
    /// The derived key type
    type Key: Eq + Hash + Clone + Send + Sync;

    /// Derive the cache key for `args`.
    ///
    /// Failures surface to the caller before any lock is taken.
    fn derive(&self, args: &A) -> Result<Self::Key, KeyError>;
}

/// Default policy: the argument value is the key, compared structurally.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgsKey;

impl<A> KeyDeriver<A> for ArgsKey
where
    A: Eq + Hash + Clone + Send + Sync,
{
    type Key = A;

    fn derive(&self, args: &A) -> Result<A, KeyError> {
        Ok(args.clone())
    }
}

/// Adapter turning a closure into a key-derivation policy.
///
/// # Example
///
/// ```
/// use multiton::{DeriveWith, KeyDeriver, KeyError};
///
/// // Key on the host only; the port is considered irrelevant.
/// let policy = DeriveWith::new(|args: &(String, u16)| Ok::<_, KeyError>(args.0.clone()));
/// let key = policy.derive(&("db.internal".to_string(), 5432)).unwrap();
/// assert_eq!(key, "db.internal");
/// ```
#[derive(Debug, Clone)]
pub struct DeriveWith<F> {
    derive: F,
}

impl<F> DeriveWith<F> {
    /// Wrap a closure as a key policy
    pub fn new(derive: F) -> Self {
        Self { derive }
    }
}

impl<A, K, F> KeyDeriver<A> for DeriveWith<F>
where
    K: Eq + Hash + Clone + Send + Sync,
    F: Fn(&A) -> Result<K, KeyError>,
{
    type Key = K;

    fn derive(&self, args: &A) -> Result<K, KeyError> {
        (self.derive)(args)
    }
}
