//! Builder for [`CacheDictionary`] instances.
//!
//! Collects the configuration (name, attribute structure, TTL window,
//! requested capacity) and validates it against the source at build time.
//!
//! ## Example
//!
//! ```
//! use dictcache::builder::CacheDictionaryBuilder;
//! use dictcache::source::MemorySource;
//! use dictcache::store::{AttributeKind, Value};
//!
//! let source = MemorySource::new().row(1, vec![Value::Str("one".into())]);
//!
//! let dict = CacheDictionaryBuilder::new("numbers")
//!     .attribute("word", AttributeKind::Str, Value::Str(String::new()))
//!     .lifetime(300, 360)
//!     .capacity(4096)
//!     .build(Box::new(source))
//!     .unwrap();
//!
//! assert_eq!(dict.get_string("word", 1).unwrap(), "one");
//! ```

use std::sync::Arc;

use crate::clock::{Clock, Lifetime, SystemClock, TtlSampler};
use crate::dict::CacheDictionary;
use crate::error::CacheError;
use crate::source::DictionarySource;
use crate::store::{AttributeDescriptor, AttributeKind, Value};

/// Configuration collector; see the module docs for an example.
pub struct CacheDictionaryBuilder {
    name: String,
    structure: Vec<AttributeDescriptor>,
    lifetime: Option<Lifetime>,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
    ttl_seed: Option<u64>,
}

impl CacheDictionaryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure: Vec::new(),
            lifetime: None,
            capacity: None,
            clock: Arc::new(SystemClock),
            ttl_seed: None,
        }
    }

    /// Declares the next attribute. Declaration order is the source's column
    /// order.
    pub fn attribute(
        mut self,
        name: impl Into<String>,
        kind: AttributeKind,
        null_value: impl Into<Value>,
    ) -> Self {
        self.structure
            .push(AttributeDescriptor::new(name, kind, null_value));
        self
    }

    /// Declares an attribute from a prepared descriptor.
    pub fn descriptor(mut self, descriptor: AttributeDescriptor) -> Self {
        self.structure.push(descriptor);
        self
    }

    /// TTL window in seconds; every fetched entry expires after a uniform
    /// draw from `[min_sec, max_sec]`.
    pub fn lifetime(mut self, min_sec: u64, max_sec: u64) -> Self {
        self.lifetime = Some(Lifetime::new(min_sec, max_sec));
        self
    }

    /// Requested slot count; rounded up to the next power of two.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Replaces the wall clock; tests use [`ManualClock`](crate::clock::ManualClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fixes the TTL sampler seed; tests use this for reproducible expiries.
    pub fn ttl_seed(mut self, seed: u64) -> Self {
        self.ttl_seed = Some(seed);
        self
    }

    /// Validates the configuration against `source` and constructs the
    /// dictionary.
    ///
    /// Fails with `unsupported_method` if the source lacks selective load,
    /// `bad_arguments` for an empty or duplicated structure, a missing
    /// lifetime or capacity, or an inverted TTL window, and `type_mismatch`
    /// when a null value does not carry its attribute's kind.
    pub fn build(self, source: Box<dyn DictionarySource>) -> Result<CacheDictionary, CacheError> {
        let lifetime = self
            .lifetime
            .ok_or_else(|| CacheError::bad_arguments("lifetime not configured"))?;
        if lifetime.min_sec > lifetime.max_sec {
            return Err(CacheError::bad_arguments(format!(
                "lifetime min {} exceeds max {}",
                lifetime.min_sec, lifetime.max_sec
            )));
        }
        let capacity = self
            .capacity
            .ok_or_else(|| CacheError::bad_arguments("capacity not configured"))?;

        let ttl = match self.ttl_seed {
            Some(seed) => TtlSampler::with_seed(lifetime, seed),
            None => TtlSampler::new(lifetime),
        };

        CacheDictionary::from_parts(
            self.name,
            self.structure,
            source,
            lifetime,
            capacity,
            self.clock,
            ttl,
        )
    }
}
