//! Multiton: thread-safe keyed-singleton registry.
//!
//! A multiton is a singleton generalized over a key: at most one instance
//! exists per logical construction key, where the key is derived from the
//! constructor arguments. It is useful when construction is expensive
//! (a database connection, a parsed ruleset), a set of similar-but-not-
//! identical objects is needed, and call sites cannot easily coordinate
//! how many times they construct.
//!
//! The registry guarantees exactly-once construction per key under
//! concurrent access, using per-key locks that are allocated lazily and
//! downgraded to a no-op once a key is resolved, so warm lookups cost a
//! single uncontended read probe.
//!
//! ```
//! use multiton::Registry;
//!
//! struct Parsed {
//!     rules: usize,
//! }
//!
//! let registry: Registry<Vec<i32>, Parsed> = Registry::new();
//!
//! let a = registry.get_or_init(vec![4], |args| Parsed { rules: args.len() }).unwrap();
//! let b = registry.get_or_init(vec![4], |args| Parsed { rules: args.len() }).unwrap();
//! let c = registry.get_or_init(vec![2], |args| Parsed { rules: args.len() }).unwrap();
//!
//! assert!(a.ptr_eq(&b)); // same key, same instance
//! assert!(!a.ptr_eq(&c)); // different key, different instance
//! assert_eq!(a.rules, 1);
//! ```
//!
//! Instances come back wrapped in a [`Handle`], the identity guard: handles
//! alias freely via [`Handle::share`], but duplicating the managed value
//! fails with [`IdentityViolation`], and serialization emits only the
//! constructor arguments so deserialization must go back through the
//! registry ([`Registry::restore`]).
//!
//! The [`timing`] module is an independent collaborator for decorating
//! callables (wrapped constructors included) with per-label duration
//! statistics; the registry itself never uses it.

pub mod error;
pub mod handle;
pub mod key;
mod lock_table;
pub mod registry;
pub mod timing;

pub use error::{IdentityViolation, KeyError, RegistryError};
pub use handle::{Blueprint, Handle};
pub use key::{ArgsKey, DeriveWith, KeyDeriver};
pub use registry::Registry;
pub use timing::{CallTimers, TimerReport, TimerStats};
