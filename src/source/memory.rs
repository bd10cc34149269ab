//! In-memory reference source.
//!
//! The smallest useful [`DictionarySource`]: a key→row map served back in
//! fixed-size blocks. Doubles as the standard test double; the configurable
//! block size exercises multi-batch stream consumption.

use rustc_hash::FxHashMap;

use crate::error::CacheError;
use crate::source::{Block, ColumnData, DictionarySource, RecordStream};
use crate::store::kind::Value;

use std::error::Error;
use std::fmt;

const DEFAULT_BLOCK_ROWS: usize = 1024;

/// Map-backed source. Each row holds attribute values in declaration order,
/// already widened to carrier shape.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: FxHashMap<u64, Vec<Value>>,
    block_rows: usize,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self {
            rows: FxHashMap::default(),
            block_rows: DEFAULT_BLOCK_ROWS,
        }
    }

    /// Sets how many rows each emitted block carries.
    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows.max(1);
        self
    }

    /// Adds one row, replacing a previous row for the same key.
    pub fn row(mut self, key: u64, values: Vec<Value>) -> Self {
        self.rows.insert(key, values);
        self
    }

    /// Adds one row in place.
    pub fn insert(&mut self, key: u64, values: Vec<Value>) {
        self.rows.insert(key, values);
    }

    /// Number of keys the source knows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the source holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn build_blocks(&self, ids: &[u64]) -> Result<Vec<Block>, CacheError> {
        let found: Vec<u64> = ids.iter().copied().filter(|id| self.rows.contains_key(id)).collect();
        let mut blocks = Vec::with_capacity(found.len().div_ceil(self.block_rows));

        for chunk in found.chunks(self.block_rows) {
            let width = self.rows[&chunk[0]].len();
            let mut columns: Vec<ColumnData> = Vec::with_capacity(width + 1);
            columns.push(ColumnData::UInt64(chunk.to_vec()));

            for position in 0..width {
                let mut column = carrier_column(&self.rows[&chunk[0]][position]);
                for key in chunk {
                    let row = &self.rows[key];
                    let value = row.get(position).ok_or_else(|| {
                        CacheError::Source(Box::new(ShapeError::ragged(*key, position)))
                    })?;
                    if !column.push_value(value) {
                        return Err(CacheError::Source(Box::new(ShapeError::mixed(
                            *key, position,
                        ))));
                    }
                }
                columns.push(column);
            }

            blocks.push(Block::new(columns));
        }

        Ok(blocks)
    }
}

impl DictionarySource for MemorySource {
    fn supports_selective_load(&self) -> bool {
        true
    }

    fn load_ids(&self, ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError> {
        let blocks = self.build_blocks(ids)?;
        Ok(Box::new(MemoryStream { blocks, next: 0 }))
    }

    fn clone_source(&self) -> Box<dyn DictionarySource> {
        Box::new(self.clone())
    }
}

/// Stream over pre-built blocks.
struct MemoryStream {
    blocks: Vec<Block>,
    next: usize,
}

impl RecordStream for MemoryStream {
    fn read(&mut self) -> Result<Option<Block>, CacheError> {
        let block = self.blocks.get(self.next).cloned();
        self.next += 1;
        Ok(block)
    }
}

trait PushValue {
    fn push_value(&mut self, value: &Value) -> bool;
}

fn carrier_column(prototype: &Value) -> ColumnData {
    match prototype {
        Value::UInt(_) => ColumnData::UInt64(Vec::new()),
        Value::Int(_) => ColumnData::Int64(Vec::new()),
        Value::Float(_) => ColumnData::Float64(Vec::new()),
        Value::Str(_) => ColumnData::Str(Vec::new()),
    }
}

impl PushValue for ColumnData {
    fn push_value(&mut self, value: &Value) -> bool {
        match (self, value) {
            (ColumnData::UInt64(col), Value::UInt(v)) => col.push(*v),
            (ColumnData::Int64(col), Value::Int(v)) => col.push(*v),
            (ColumnData::Float64(col), Value::Float(v)) => col.push(*v),
            (ColumnData::Str(col), Value::Str(v)) => col.push(v.clone()),
            _ => return false,
        }
        true
    }
}

/// Row-shape defect inside the backing map.
#[derive(Debug)]
struct ShapeError {
    key: u64,
    position: usize,
    mixed: bool,
}

impl ShapeError {
    fn ragged(key: u64, position: usize) -> Self {
        Self {
            key,
            position,
            mixed: false,
        }
    }

    fn mixed(key: u64, position: usize) -> Self {
        Self {
            key,
            position,
            mixed: true,
        }
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mixed {
            write!(
                f,
                "row for key {} has a mixed carrier at position {}",
                self.key, self.position
            )
        } else {
            write!(
                f,
                "row for key {} is missing value at position {}",
                self.key, self.position
            )
        }
    }
}

impl Error for ShapeError {}
