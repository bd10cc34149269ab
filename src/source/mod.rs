//! Dictionary source interface.
//!
//! A source is the external key→row provider behind the cache. The cache
//! only ever asks for an explicit id list (selective load) and consumes the
//! answer as a stream of column blocks.
//!
//! ## Architecture
//!
//! ```text
//!   update(required_ids)
//!        │
//!        ▼
//!   DictionarySource::load_ids ──► RecordStream
//!                                    prefix()
//!                                    read() ──► Block ──► Block ──► None
//!                                    suffix()
//!
//!   Block columns (carrier-typed, randomly indexable by row):
//!     column 0:    UInt64 keys
//!     column 1..k: attribute values in declaration order
//! ```
//!
//! Values arrive widened to the four carrier shapes of
//! [`Value`](crate::store::kind::Value); the cache narrows them to native
//! attribute widths on write. Stream errors propagate untranslated.

pub mod memory;

pub use memory::MemorySource;

use crate::error::CacheError;
use crate::store::kind::{AttributeKind, Value};

/// External key→row provider consumed by the cache.
///
/// Implementations decide how ids are fetched (remote table, file, embedded
/// map); the cache requires only selective load and cloning.
pub trait DictionarySource: Send + Sync {
    /// Returns `true` if the source can answer `load_ids`. Cache
    /// construction fails for sources that cannot.
    fn supports_selective_load(&self) -> bool;

    /// Opens a record stream for exactly the given ids. Ids unknown to the
    /// source are simply absent from the stream.
    fn load_ids(&self, ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError>;

    /// Produces an independent handle to the same source.
    fn clone_source(&self) -> Box<dyn DictionarySource>;
}

impl<T: DictionarySource + ?Sized + 'static> DictionarySource for std::sync::Arc<T> {
    fn supports_selective_load(&self) -> bool {
        T::supports_selective_load(self)
    }

    fn load_ids(&self, ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError> {
        T::load_ids(self, ids)
    }

    fn clone_source(&self) -> Box<dyn DictionarySource> {
        Box::new(std::sync::Arc::clone(self))
    }
}

/// Pull-based stream of record blocks.
///
/// `prefix` and `suffix` bracket the transfer for sources with per-request
/// setup or teardown; the defaults do nothing.
pub trait RecordStream {
    fn prefix(&mut self) -> Result<(), CacheError> {
        Ok(())
    }

    /// Returns the next block, or `None` when the stream is exhausted.
    fn read(&mut self) -> Result<Option<Block>, CacheError>;

    fn suffix(&mut self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// One batch of rows, presented as ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    columns: Vec<ColumnData>,
}

impl Block {
    pub fn new(columns: Vec<ColumnData>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at `position`.
    pub fn column(&self, position: usize) -> Option<&ColumnData> {
        self.columns.get(position)
    }

    /// Number of rows, taken from the key column.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, ColumnData::len)
    }
}

/// Carrier-typed column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    UInt64(Vec<u64>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Str(Vec<String>),
}

impl ColumnData {
    /// Number of rows in this column.
    pub fn len(&self) -> usize {
        match self {
            Self::UInt64(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    /// Returns `true` if the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the widened value at `row`.
    pub fn value_at(&self, row: usize) -> Option<Value> {
        match self {
            Self::UInt64(v) => v.get(row).map(|&x| Value::UInt(x)),
            Self::Int64(v) => v.get(row).map(|&x| Value::Int(x)),
            Self::Float64(v) => v.get(row).map(|&x| Value::Float(x)),
            Self::Str(v) => v.get(row).map(|x| Value::Str(x.clone())),
        }
    }

    /// Returns the raw key slice when this is the `UInt64` carrier.
    pub fn as_keys(&self) -> Option<&[u64]> {
        match self {
            Self::UInt64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if this carrier can feed attributes of `kind`.
    pub fn carries(&self, kind: AttributeKind) -> bool {
        match self {
            Self::UInt64(_) => matches!(
                kind,
                AttributeKind::U8 | AttributeKind::U16 | AttributeKind::U32 | AttributeKind::U64
            ),
            Self::Int64(_) => matches!(
                kind,
                AttributeKind::I8 | AttributeKind::I16 | AttributeKind::I32 | AttributeKind::I64
            ),
            Self::Float64(_) => matches!(kind, AttributeKind::F32 | AttributeKind::F64),
            Self::Str(_) => matches!(kind, AttributeKind::Str),
        }
    }
}
