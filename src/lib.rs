//! dictcache: bounded direct-mapped lookup cache for external key/attribute
//! dictionaries.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod clock;
pub mod ds;
pub mod source;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod builder;
pub mod dict;
pub mod error;
pub mod prelude;
