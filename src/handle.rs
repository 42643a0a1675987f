//! Registry-managed instance handles and the identity guard.
//!
//! Every instance the registry hands out is wrapped in a [`Handle`], which
//! pairs the value with the constructor arguments it was built from. The
//! handle is the identity guard: it can be aliased freely with
//! [`Handle::share`] (every alias points at the one canonical instance),
//! but it refuses to duplicate the underlying value, and its serialized
//! form is the constructor arguments only, so deserialization is forced
//! back through the registry instead of minting an unregistered copy.

use crate::error::IdentityViolation;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

struct Shared<T, A> {
    value: T,
    args: A,
}

/// Shared handle to a registry-managed instance.
///
/// Dereferences to the managed value. Deliberately does not implement
/// `Clone`: cloning a handle would read like cloning the instance, and the
/// two must stay distinct. Alias with [`Handle::share`]; deep-copy
/// attempts go through [`Handle::try_duplicate`], which always fails.
pub struct Handle<T, A> {
    shared: Arc<Shared<T, A>>,
}

impl<T, A> Handle<T, A> {
    pub(crate) fn new(value: T, args: A) -> Self {
        Self {
            shared: Arc::new(Shared { value, args }),
        }
    }

    /// Another handle to the same instance.
    ///
    /// This is aliasing, not copying; `self.ptr_eq(&self.share())` always
    /// holds.
    pub fn share(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether two handles point at the same instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The constructor arguments this instance was built from
    pub fn args(&self) -> &A {
        &self.shared.args
    }

    /// Attempt a deep copy of the managed value. Always fails.
    ///
    /// A copy would be a second instance for a key the registry promises
    /// is unique. Code that genuinely needs a detached value should
    /// construct one outside the registry.
    pub fn try_duplicate(&self) -> Result<T, IdentityViolation> {
        Err(IdentityViolation::of::<T>())
    }
}

impl<T, A> Deref for Handle<T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.shared.value
    }
}

impl<T: fmt::Debug, A: fmt::Debug> fmt::Debug for Handle<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("value", &self.shared.value)
            .field("args", &self.shared.args)
            .finish()
    }
}

/// Serializes as the constructor arguments only.
///
/// The managed value itself is never serialized; the only way back from a
/// serialized handle is a [`Blueprint`] redeemed through
/// [`Registry::restore`](crate::Registry::restore), which returns the
/// canonical instance for the derived key.
impl<T, A: Serialize> Serialize for Handle<T, A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.shared.args.serialize(serializer)
    }
}

/// Deserialized form of a managed instance: the constructor arguments.
///
/// A blueprint is not an instance. Redeem it with
/// [`Registry::restore`](crate::Registry::restore) to get the canonical
/// handle for its key, constructing the instance only if it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blueprint<A> {
    args: A,
}

impl<A> Blueprint<A> {
    /// Build a blueprint directly from arguments
    pub fn new(args: A) -> Self {
        Self { args }
    }

    /// The stored constructor arguments
    pub fn args(&self) -> &A {
        &self.args
    }

    pub(crate) fn into_args(self) -> A {
        self.args
    }
}
