//! Error types surfaced at the dictionary boundary.
//!
//! ## Key Components
//!
//! - [`CacheError`]: the single error type for construction and lookup
//!   failures. Requested-kind/declared-kind disagreements and malformed
//!   source blocks are [`CacheError::TypeMismatch`]; unknown attribute names
//!   are [`CacheError::BadArguments`]; a source without selective load is
//!   rejected at construction with [`CacheError::UnsupportedMethod`].
//!
//! Source failures are carried through verbatim in [`CacheError::Source`];
//! the cache neither retries nor translates them.
//!
//! ## Example Usage
//!
//! ```
//! use dictcache::error::CacheError;
//!
//! let err = CacheError::bad_arguments("no such attribute 'region'");
//! assert!(err.to_string().contains("region"));
//! ```

use std::error::Error;
use std::fmt;

/// Error returned by dictionary construction and lookup operations.
///
/// Every variant is fatal to the in-flight request. Locks are released via
/// scoped guards before an error propagates, so a failed call leaves the
/// cache usable (possibly with a partial update applied).
#[derive(Debug)]
pub enum CacheError {
    /// The source lacks a capability the cache requires (selective load).
    UnsupportedMethod(String),
    /// Requested attribute kind disagrees with the declared kind, or a
    /// source block has the wrong column shape.
    TypeMismatch(String),
    /// Attribute name not declared, or invalid construction parameters.
    BadArguments(String),
    /// Failure propagated from the backing source, untranslated.
    Source(Box<dyn Error + Send + Sync>),
}

impl CacheError {
    /// Creates an `UnsupportedMethod` error with the given description.
    #[inline]
    pub fn unsupported_method(msg: impl Into<String>) -> Self {
        Self::UnsupportedMethod(msg.into())
    }

    /// Creates a `TypeMismatch` error with the given description.
    #[inline]
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Creates a `BadArguments` error with the given description.
    #[inline]
    pub fn bad_arguments(msg: impl Into<String>) -> Self {
        Self::BadArguments(msg.into())
    }

    /// Wraps a source-side failure.
    #[inline]
    pub fn source(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(err))
    }

    /// Returns `true` if this error came from the backing source.
    #[inline]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMethod(msg) => write!(f, "unsupported method: {msg}"),
            Self::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Self::BadArguments(msg) => write!(f, "bad arguments: {msg}"),
            Self::Source(err) => write!(f, "source error: {err}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
