//! Error types for the registry, key derivation, and identity guard.

use thiserror::Error;

/// Error raised by a custom key-derivation policy.
///
/// The default policy never fails; this only surfaces when a user-supplied
/// deriver rejects the arguments. It is reported before any lock is taken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("key derivation failed: {reason}")]
pub struct KeyError {
    reason: String,
}

impl KeyError {
    /// Create a key-derivation error with a human-readable reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason the deriver rejected the arguments
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors surfaced by [`Registry::get_or_create`](crate::Registry::get_or_create)
///
/// `E` is whatever error type the caller's constructor returns. A
/// `Construction` error is propagated unchanged and leaves no cache entry
/// behind, so retrying the same key is always safe.
#[derive(Error, Debug)]
pub enum RegistryError<E> {
    /// The underlying constructor failed; nothing was cached for the key
    #[error("construction failed: {0}")]
    Construction(E),

    /// The key-derivation policy rejected the arguments
    #[error(transparent)]
    KeyDerivation(#[from] KeyError),
}

impl<E> RegistryError<E> {
    /// Unwrap the constructor's own error, if that is what went wrong
    pub fn into_construction(self) -> Option<E> {
        match self {
            RegistryError::Construction(e) => Some(e),
            RegistryError::KeyDerivation(_) => None,
        }
    }
}

/// Attempted deep copy of a registry-managed instance.
///
/// Duplicating a managed value would mint a second object for a key the
/// registry promises is unique, so the attempt fails instead of silently
/// breaking the invariant. Aliasing the handle
/// ([`Handle::share`](crate::Handle::share)) is the supported way to pass
/// the instance around.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot duplicate registry-managed instance of `{type_name}`")]
pub struct IdentityViolation {
    type_name: &'static str,
}

impl IdentityViolation {
    pub(crate) fn of<T>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the managed type whose duplication was refused
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}
