//! Direct-mapped cache dictionary.
//!
//! [`CacheDictionary`] resolves named attribute values for 64-bit keys,
//! memoizing source rows in a fixed power-of-two table. Eviction is
//! overwrite-on-collision; staleness is a per-entry randomized TTL.
//!
//! ## Architecture
//!
//! ```text
//!   get_u32("v", keys, out)
//!        │
//!        ▼
//!   ┌────────────────────────────────────────────────────────────┐
//!   │ read lock: scan cells                                      │
//!   │   key == 0            → null value                         │
//!   │   slot key mismatch   → null value + record miss           │
//!   │   slot expired        → null value + record miss           │
//!   │   otherwise           → attribute array value              │
//!   └────────────────────────────────────────────────────────────┘
//!        │ distinct miss keys
//!        ▼
//!   ┌────────────────────────────────────────────────────────────┐
//!   │ update: source.load_ids(misses)                            │
//!   │ write lock across the whole stream:                        │
//!   │   per row: write attributes, commit cell key + expiry,     │
//!   │            fire on_cell_updated(key, slot)                 │
//!   └────────────────────────────────────────────────────────────┘
//!        │ callback patches the miss positions in `out`
//!        ▼
//!   keys the source omitted stay at the null value
//! ```
//!
//! ## Locking discipline
//!
//! One cache-wide `parking_lot::RwLock` guards the cells, every attribute
//! array, the string buffers, and the TTL sampler. Read passes hold the
//! read lock per scan and never call the source under it. The updater holds
//! the write lock across the entire stream consumption; the guard releases
//! it on every exit path, including error unwinds. Two concurrent misses
//! for one key may both refill it; last writer wins, and both observations
//! came from the source.
//!
//! The update callback is invoked after the row's slot commit while the
//! write lock is still held, so reading the attribute array at the reported
//! slot index yields exactly the just-written value.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::builder::CacheDictionaryBuilder;
use crate::clock::{Clock, Lifetime, TtlSampler};
use crate::ds::CellTable;
use crate::error::CacheError;
use crate::source::{ColumnData, DictionarySource};
use crate::store::{AttributeArray, AttributeDescriptor, AttributeKind, FixedValue, StringColumn};

/// Mutable state behind the cache-wide readers-writer lock.
struct CacheState {
    cells: CellTable,
    attributes: Vec<AttributeArray>,
    ttl: TtlSampler,
}

/// Bounded, direct-mapped lookup cache over a [`DictionarySource`].
///
/// Constructed through [`CacheDictionary::builder`]. All getters are usable
/// from many threads concurrently.
///
/// # Example
///
/// ```
/// use dictcache::dict::CacheDictionary;
/// use dictcache::source::MemorySource;
/// use dictcache::store::{AttributeKind, Value};
///
/// let source = MemorySource::new()
///     .row(1, vec![Value::UInt(11)])
///     .row(2, vec![Value::UInt(22)]);
///
/// let dict = CacheDictionary::builder("ratings")
///     .attribute("score", AttributeKind::U32, Value::UInt(0))
///     .lifetime(60, 120)
///     .capacity(1024)
///     .build(Box::new(source))
///     .unwrap();
///
/// let mut out = [0u32; 3];
/// dict.get_u32_batch("score", &[1, 2, 3], &mut out).unwrap();
/// assert_eq!(out, [11, 22, 0]);
/// ```
pub struct CacheDictionary {
    name: String,
    structure: Vec<AttributeDescriptor>,
    index_by_name: FxHashMap<String, usize>,
    source: Box<dyn DictionarySource>,
    lifetime: Lifetime,
    capacity: usize,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
    #[cfg(feature = "metrics")]
    metrics: crate::metrics::LookupMetrics,
}

impl CacheDictionary {
    /// Starts a builder for a dictionary called `name`.
    pub fn builder(name: impl Into<String>) -> CacheDictionaryBuilder {
        CacheDictionaryBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        structure: Vec<AttributeDescriptor>,
        source: Box<dyn DictionarySource>,
        lifetime: Lifetime,
        requested_capacity: usize,
        clock: Arc<dyn Clock>,
        ttl: TtlSampler,
    ) -> Result<Self, CacheError> {
        if !source.supports_selective_load() {
            return Err(CacheError::unsupported_method(
                "source cannot be used with a cache dictionary: selective load unsupported",
            ));
        }
        if structure.is_empty() {
            return Err(CacheError::bad_arguments(
                "dictionary structure declares no attributes",
            ));
        }

        let cells = CellTable::new(requested_capacity);
        let capacity = cells.capacity();

        let mut index_by_name = FxHashMap::default();
        let mut attributes = Vec::with_capacity(structure.len());
        for descriptor in &structure {
            if index_by_name
                .insert(descriptor.name.clone(), attributes.len())
                .is_some()
            {
                return Err(CacheError::bad_arguments(format!(
                    "duplicate attribute '{}'",
                    descriptor.name
                )));
            }
            attributes.push(AttributeArray::new(
                descriptor.kind,
                &descriptor.null_value,
                capacity,
            )?);
        }

        Ok(Self {
            name,
            structure,
            index_by_name,
            source,
            lifetime,
            capacity,
            clock,
            state: RwLock::new(CacheState {
                cells,
                attributes,
                ttl,
            }),
            #[cfg(feature = "metrics")]
            metrics: crate::metrics::LookupMetrics::default(),
        })
    }

    /// Dictionary name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implementation type name.
    pub fn type_name(&self) -> &'static str {
        "CacheDictionary"
    }

    /// This dictionary caches; always `true`.
    pub fn is_cached(&self) -> bool {
        true
    }

    /// The backing source.
    pub fn source(&self) -> &dyn DictionarySource {
        self.source.as_ref()
    }

    /// The TTL window entries are assigned from.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Effective slot count (requested capacity rounded up to a power of
    /// two).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Declared attributes in declaration order.
    pub fn structure(&self) -> &[AttributeDescriptor] {
        &self.structure
    }

    /// Hierarchy is declared off for this dictionary.
    pub fn has_hierarchy(&self) -> bool {
        false
    }

    /// No parent relation is maintained; every key reports `0`.
    pub fn to_parent(&self, _key: u64) -> u64 {
        0
    }

    /// Counter snapshot; present only with the `metrics` feature.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> crate::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn attribute_index(&self, attribute_name: &str) -> Result<usize, CacheError> {
        self.index_by_name
            .get(attribute_name)
            .copied()
            .ok_or_else(|| {
                CacheError::bad_arguments(format!("no such attribute '{attribute_name}'"))
            })
    }

    fn expect_kind(
        &self,
        attribute_name: &str,
        attr_idx: usize,
        requested: AttributeKind,
    ) -> Result<(), CacheError> {
        let declared = self.structure[attr_idx].kind;
        if declared != requested {
            return Err(CacheError::type_mismatch(format!(
                "attribute '{attribute_name}' has kind {declared}, requested {requested}"
            )));
        }
        Ok(())
    }

    /// Vectorized fixed-width lookup: one read-locked scan, then a single
    /// coalesced source fetch for the distinct miss keys.
    fn get_items<T: FixedValue>(
        &self,
        attr_idx: usize,
        keys: &[u64],
        out: &mut [T],
    ) -> Result<(), CacheError> {
        if keys.len() != out.len() {
            return Err(CacheError::bad_arguments(format!(
                "output length {} does not match key count {}",
                out.len(),
                keys.len()
            )));
        }

        // key → positions awaiting that key's value
        let mut outdated: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
        {
            let state = self.state.read();
            let attribute = &state.attributes[attr_idx];
            let (values, null) = T::view(attribute).ok_or_else(|| {
                CacheError::type_mismatch(format!(
                    "attribute array holds kind {}, requested {}",
                    attribute.kind(),
                    T::KIND
                ))
            })?;
            let now = self.clock.now();

            for (i, &key) in keys.iter().enumerate() {
                if key == 0 {
                    out[i] = null;
                    continue;
                }
                let cell_idx = state.cells.slot_of(key);
                let cell = state.cells.get(cell_idx);
                if cell.key != key || cell.expired(now) {
                    out[i] = null;
                    outdated.entry(key).or_default().push(i);
                } else {
                    out[i] = values[cell_idx];
                }
            }
        }

        #[cfg(feature = "metrics")]
        {
            let misses: u64 = outdated.values().map(|v| v.len() as u64).sum();
            let probes = keys.iter().filter(|&&k| k != 0).count() as u64;
            self.metrics.record_scan(probes - misses, misses);
        }

        if outdated.is_empty() {
            return Ok(());
        }

        let required: Vec<u64> = outdated.keys().copied().collect();
        self.update(&required, |key, cell_idx, state| {
            let attribute = &state.attributes[attr_idx];
            if let Some((values, _)) = T::view(attribute) {
                let value = values[cell_idx];
                if let Some(positions) = outdated.get(&key) {
                    for &i in positions {
                        out[i] = value;
                    }
                }
            }
        })
    }

    /// Vectorized string lookup.
    ///
    /// Optimistic pass first: assume every key hits and stream bytes
    /// straight into `out`. On the first miss, discard the partial output
    /// and rerun pessimistically, partitioning into a hit map and a miss
    /// set, fetching misses once, then rebuilding `out` in input order.
    fn get_string_items(
        &self,
        attr_idx: usize,
        keys: &[u64],
        out: &mut StringColumn,
    ) -> Result<(), CacheError> {
        let base_len = out.len();
        out.reserve(0, keys.len());

        let mut found_outdated = false;
        {
            let state = self.state.read();
            let attribute = &state.attributes[attr_idx];
            let null = attribute.str_null().ok_or_else(|| {
                CacheError::type_mismatch(format!(
                    "attribute array holds kind {}, requested string",
                    attribute.kind()
                ))
            })?;
            let now = self.clock.now();

            for &key in keys {
                if key == 0 {
                    out.push(null.as_bytes());
                    continue;
                }
                let cell_idx = state.cells.slot_of(key);
                let cell = state.cells.get(cell_idx);
                if cell.key != key || cell.expired(now) {
                    found_outdated = true;
                    break;
                }
                if let Some(bytes) = attribute.str_at(cell_idx) {
                    out.push(bytes);
                }
            }
        }

        if !found_outdated {
            #[cfg(feature = "metrics")]
            self.metrics
                .record_scan(keys.iter().filter(|&&k| k != 0).count() as u64, 0);
            return Ok(());
        }

        // Pessimistic pass. Drop whatever the optimistic pass appended;
        // reserved capacity survives the truncation.
        out.truncate(base_len);

        // key → number of requested positions
        let mut outdated: FxHashMap<u64, usize> = FxHashMap::default();
        // key → owned copy of the current value
        let mut map: FxHashMap<u64, Vec<u8>> = FxHashMap::default();
        let mut total_length = 0usize;
        let null_value: String;
        {
            let state = self.state.read();
            let attribute = &state.attributes[attr_idx];
            null_value = attribute
                .str_null()
                .ok_or_else(|| {
                    CacheError::type_mismatch(format!(
                        "attribute array holds kind {}, requested string",
                        attribute.kind()
                    ))
                })?
                .to_owned();
            let now = self.clock.now();

            for &key in keys {
                if key == 0 {
                    total_length += null_value.len();
                    continue;
                }
                let cell_idx = state.cells.slot_of(key);
                let cell = state.cells.get(cell_idx);
                if cell.key != key || cell.expired(now) {
                    *outdated.entry(key).or_insert(0) += 1;
                } else if let Some(bytes) = attribute.str_at(cell_idx) {
                    total_length += bytes.len();
                    map.insert(key, bytes.to_vec());
                }
            }
        }

        #[cfg(feature = "metrics")]
        {
            let misses: u64 = outdated.values().map(|&n| n as u64).sum();
            let probes = keys.iter().filter(|&&k| k != 0).count() as u64;
            self.metrics.record_scan(probes - misses, misses);
        }

        if !outdated.is_empty() {
            let required: Vec<u64> = outdated.keys().copied().collect();
            self.update(&required, |key, cell_idx, state| {
                if let Some(bytes) = state.attributes[attr_idx].str_at(cell_idx) {
                    total_length += bytes.len();
                    map.insert(key, bytes.to_vec());
                }
            })?;
        }

        out.reserve(total_length, 0);
        for &key in keys {
            match map.get(&key) {
                Some(bytes) => out.push(bytes),
                // key 0 and keys the source did not return
                None => out.push(null_value.as_bytes()),
            }
        }
        Ok(())
    }

    /// Fetches `required` keys from the source and writes them back under
    /// the write lock, invoking `on_cell_updated` once per returned row.
    ///
    /// The callback fires after the row's attribute writes and cell commit,
    /// before the write lock is released; it receives shared access to the
    /// updated state. Keys absent from the stream are left untouched. Any
    /// source or shape error aborts the update; rows already committed stay.
    fn update(
        &self,
        required: &[u64],
        mut on_cell_updated: impl FnMut(u64, usize, &CacheState),
    ) -> Result<(), CacheError> {
        let mut stream = self.source.load_ids(required)?;
        stream.prefix()?;

        #[cfg(feature = "metrics")]
        self.metrics.record_source_request(required.len() as u64);

        let mut guard = self.state.write();
        let state = &mut *guard;

        while let Some(block) = stream.read()? {
            let keys = match block.column(0) {
                Some(ColumnData::UInt64(keys)) => keys,
                Some(_) => {
                    return Err(CacheError::type_mismatch(
                        "key column has type different from u64",
                    ))
                }
                None => return Err(CacheError::type_mismatch("block has no key column")),
            };
            if block.columns() != state.attributes.len() + 1 {
                return Err(CacheError::type_mismatch(format!(
                    "block has {} columns, expected {}",
                    block.columns(),
                    state.attributes.len() + 1
                )));
            }
            for (attr_idx, attribute) in state.attributes.iter().enumerate() {
                if let Some(column) = block.column(attr_idx + 1) {
                    if !column.carries(attribute.kind()) {
                        return Err(CacheError::type_mismatch(format!(
                            "column {} cannot feed attribute '{}' of kind {}",
                            attr_idx + 1,
                            self.structure[attr_idx].name,
                            attribute.kind()
                        )));
                    }
                }
            }

            #[cfg(feature = "metrics")]
            self.metrics.record_update_rows(keys.len() as u64);

            for (row, &key) in keys.iter().enumerate() {
                let cell_idx = state.cells.slot_of(key);
                for (attr_idx, attribute) in state.attributes.iter_mut().enumerate() {
                    let value = block
                        .column(attr_idx + 1)
                        .and_then(|column| column.value_at(row))
                        .ok_or_else(|| {
                            CacheError::type_mismatch(format!(
                                "column {} shorter than key column",
                                attr_idx + 1
                            ))
                        })?;
                    attribute.set(cell_idx, &value)?;
                }
                let now = self.clock.now();
                let expires_at = state.ttl.fresh_expiry(now);
                state.cells.commit(cell_idx, key, expires_at);
                on_cell_updated(key, cell_idx, state);
            }
        }

        // Stream completion is source I/O; it stays serialized behind the
        // write lock, which the guard releases at function exit.
        stream.suffix()?;
        Ok(())
    }
}

macro_rules! typed_getters {
    ($($scalar:ident / $batch:ident: $ty:ty => $kind:ident),+ $(,)?) => {
        impl CacheDictionary {
            $(
                /// Scalar lookup; requires the attribute to be declared with
                /// this kind.
                pub fn $scalar(&self, attribute_name: &str, key: u64) -> Result<$ty, CacheError> {
                    let mut out: [$ty; 1] = [Default::default()];
                    self.$batch(attribute_name, &[key], &mut out)?;
                    Ok(out[0])
                }

                /// Vectorized lookup; `out` must be exactly as long as
                /// `keys`, and position `i` answers key `i`.
                pub fn $batch(
                    &self,
                    attribute_name: &str,
                    keys: &[u64],
                    out: &mut [$ty],
                ) -> Result<(), CacheError> {
                    let attr_idx = self.attribute_index(attribute_name)?;
                    self.expect_kind(attribute_name, attr_idx, AttributeKind::$kind)?;
                    self.get_items::<$ty>(attr_idx, keys, out)
                }
            )+
        }
    };
}

typed_getters! {
    get_u8 / get_u8_batch: u8 => U8,
    get_u16 / get_u16_batch: u16 => U16,
    get_u32 / get_u32_batch: u32 => U32,
    get_u64 / get_u64_batch: u64 => U64,
    get_i8 / get_i8_batch: i8 => I8,
    get_i16 / get_i16_batch: i16 => I16,
    get_i32 / get_i32_batch: i32 => I32,
    get_i64 / get_i64_batch: i64 => I64,
    get_f32 / get_f32_batch: f32 => F32,
    get_f64 / get_f64_batch: f64 => F64,
}

impl CacheDictionary {
    /// Scalar string lookup; requires a `string` attribute.
    pub fn get_string(&self, attribute_name: &str, key: u64) -> Result<String, CacheError> {
        let mut out = StringColumn::new();
        self.get_string_batch(attribute_name, &[key], &mut out)?;
        let bytes = out.get(0).unwrap_or(&[]);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Vectorized string lookup appending to an external byte+offset
    /// column; appends exactly `keys.len()` elements in input order.
    pub fn get_string_batch(
        &self,
        attribute_name: &str,
        keys: &[u64],
        out: &mut StringColumn,
    ) -> Result<(), CacheError> {
        let attr_idx = self.attribute_index(attribute_name)?;
        self.expect_kind(attribute_name, attr_idx, AttributeKind::Str)?;
        self.get_string_items(attr_idx, keys, out)
    }
}

impl Clone for CacheDictionary {
    /// Produces an independent dictionary with a cloned source and an empty
    /// table.
    fn clone(&self) -> Self {
        Self::from_parts(
            self.name.clone(),
            self.structure.clone(),
            self.source.clone_source(),
            self.lifetime,
            self.capacity,
            Arc::clone(&self.clock),
            TtlSampler::new(self.lifetime),
        )
        .expect("structure validated at construction")
    }
}

impl std::fmt::Debug for CacheDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDictionary")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("lifetime", &self.lifetime)
            .field("attributes", &self.structure.len())
            .finish_non_exhaustive()
    }
}
