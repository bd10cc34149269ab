//! Typed per-attribute value arrays.
//!
//! Each declared attribute owns one contiguous array of its native element
//! width, length equal to the cell table capacity. The runtime kind lives in
//! the enum tag, so reads and writes dispatch with a `match` instead of
//! virtual calls or per-attribute allocation.
//!
//! ## Architecture
//!
//! ```text
//!   cells:        [slot 0] [slot 1] [slot 2] [slot 3]
//!
//!   "views"  U32: [  11  ] [  0   ] [  22  ] [  0   ]
//!   "label"  Str: [ None ] [ b"a" ] [ None ] [ b"cd"]
//!                             │                  │
//!                             └── owned per-slot byte buffers; replaced
//!                                 wholesale on overwrite, dropped with
//!                                 the previous occupant
//! ```
//!
//! String slots hold `Option<Box<[u8]>>`: `None` for never-written slots and
//! for empty values. A slot's buffer is owned by that slot alone; assigning
//! a new value drops the previous buffer.
//!
//! Slots whose cell key does not match are never read, so their array bytes
//! may be stale values from an evicted key.

use crate::error::CacheError;
use crate::store::kind::{AttributeKind, Value};

/// Declaration of one attribute: name, kind, and the typed null value
/// returned whenever the cache cannot supply a real one.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub null_value: Value,
    /// Declared but inert: this dictionary reports no hierarchy.
    pub hierarchical: bool,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind, null_value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            null_value: null_value.into(),
            hierarchical: false,
        }
    }
}

/// One attribute's value array, tagged by kind.
///
/// Fixed-width variants carry the typed null alongside the array; the string
/// variant owns its per-slot buffers.
#[derive(Debug)]
pub enum AttributeArray {
    U8 { null: u8, values: Box<[u8]> },
    U16 { null: u16, values: Box<[u16]> },
    U32 { null: u32, values: Box<[u32]> },
    U64 { null: u64, values: Box<[u64]> },
    I8 { null: i8, values: Box<[i8]> },
    I16 { null: i16, values: Box<[i16]> },
    I32 { null: i32, values: Box<[i32]> },
    I64 { null: i64, values: Box<[i64]> },
    F32 { null: f32, values: Box<[f32]> },
    F64 { null: f64, values: Box<[f64]> },
    Str {
        null: String,
        values: Box<[Option<Box<[u8]>>]>,
    },
}

macro_rules! new_fixed {
    ($null:expr, $capacity:expr, $variant:ident, $carrier:path, $ty:ty) => {{
        match $null {
            $carrier(v) => Ok(AttributeArray::$variant {
                null: *v as $ty,
                values: vec![<$ty>::default(); $capacity].into_boxed_slice(),
            }),
            other => Err(CacheError::type_mismatch(format!(
                "null value {other} does not carry kind {}",
                AttributeKind::$variant
            ))),
        }
    }};
}

impl AttributeArray {
    /// Allocates an array of `capacity` elements for `kind`, validating that
    /// the declared null value carries that kind.
    pub fn new(kind: AttributeKind, null_value: &Value, capacity: usize) -> Result<Self, CacheError> {
        match kind {
            AttributeKind::U8 => new_fixed!(null_value, capacity, U8, Value::UInt, u8),
            AttributeKind::U16 => new_fixed!(null_value, capacity, U16, Value::UInt, u16),
            AttributeKind::U32 => new_fixed!(null_value, capacity, U32, Value::UInt, u32),
            AttributeKind::U64 => new_fixed!(null_value, capacity, U64, Value::UInt, u64),
            AttributeKind::I8 => new_fixed!(null_value, capacity, I8, Value::Int, i8),
            AttributeKind::I16 => new_fixed!(null_value, capacity, I16, Value::Int, i16),
            AttributeKind::I32 => new_fixed!(null_value, capacity, I32, Value::Int, i32),
            AttributeKind::I64 => new_fixed!(null_value, capacity, I64, Value::Int, i64),
            AttributeKind::F32 => match null_value {
                Value::Float(v) => Ok(Self::F32 {
                    null: *v as f32,
                    values: vec![0.0f32; capacity].into_boxed_slice(),
                }),
                other => Err(CacheError::type_mismatch(format!(
                    "null value {other} does not carry kind f32"
                ))),
            },
            AttributeKind::F64 => match null_value {
                Value::Float(v) => Ok(Self::F64 {
                    null: *v,
                    values: vec![0.0f64; capacity].into_boxed_slice(),
                }),
                other => Err(CacheError::type_mismatch(format!(
                    "null value {other} does not carry kind f64"
                ))),
            },
            AttributeKind::Str => match null_value {
                Value::Str(s) => Ok(Self::Str {
                    null: s.clone(),
                    values: vec![None; capacity].into_boxed_slice(),
                }),
                other => Err(CacheError::type_mismatch(format!(
                    "null value {other} does not carry kind string"
                ))),
            },
        }
    }

    /// Returns the declared kind.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::U8 { .. } => AttributeKind::U8,
            Self::U16 { .. } => AttributeKind::U16,
            Self::U32 { .. } => AttributeKind::U32,
            Self::U64 { .. } => AttributeKind::U64,
            Self::I8 { .. } => AttributeKind::I8,
            Self::I16 { .. } => AttributeKind::I16,
            Self::I32 { .. } => AttributeKind::I32,
            Self::I64 { .. } => AttributeKind::I64,
            Self::F32 { .. } => AttributeKind::F32,
            Self::F64 { .. } => AttributeKind::F64,
            Self::Str { .. } => AttributeKind::Str,
        }
    }

    /// Writes `value` at `index`, narrowing the carrier to the native width.
    ///
    /// For strings, the previous buffer is dropped; empty input stores the
    /// null buffer. A carrier that does not match the declared kind is a
    /// type mismatch and leaves the slot untouched.
    pub fn set(&mut self, index: usize, value: &Value) -> Result<(), CacheError> {
        match (self, value) {
            (Self::U8 { values, .. }, Value::UInt(v)) => values[index] = *v as u8,
            (Self::U16 { values, .. }, Value::UInt(v)) => values[index] = *v as u16,
            (Self::U32 { values, .. }, Value::UInt(v)) => values[index] = *v as u32,
            (Self::U64 { values, .. }, Value::UInt(v)) => values[index] = *v,
            (Self::I8 { values, .. }, Value::Int(v)) => values[index] = *v as i8,
            (Self::I16 { values, .. }, Value::Int(v)) => values[index] = *v as i16,
            (Self::I32 { values, .. }, Value::Int(v)) => values[index] = *v as i32,
            (Self::I64 { values, .. }, Value::Int(v)) => values[index] = *v,
            (Self::F32 { values, .. }, Value::Float(v)) => values[index] = *v as f32,
            (Self::F64 { values, .. }, Value::Float(v)) => values[index] = *v,
            (Self::Str { values, .. }, Value::Str(s)) => {
                values[index] = if s.is_empty() {
                    None
                } else {
                    Some(s.as_bytes().into())
                };
            }
            (array, value) => {
                return Err(CacheError::type_mismatch(format!(
                    "value {value} does not carry attribute kind {}",
                    array.kind()
                )))
            }
        }
        Ok(())
    }

    /// Returns the string bytes at `index`; the null buffer reads as empty.
    /// Only meaningful on the `Str` variant.
    ///
    /// The declared null value is not substituted here: a hit slot holding
    /// the null buffer represents an observed empty value, which is distinct
    /// from "key unknown".
    pub fn str_at(&self, index: usize) -> Option<&[u8]> {
        match self {
            Self::Str { values, .. } => Some(values[index].as_deref().unwrap_or(&[])),
            _ => None,
        }
    }

    /// Returns the string null value, if this is the `Str` variant.
    pub fn str_null(&self) -> Option<&str> {
        match self {
            Self::Str { null, .. } => Some(null),
            _ => None,
        }
    }
}

/// Fixed-width element types that can view their attribute array.
///
/// Implemented for the ten native widths; gives the generic lookup path
/// typed access to `(values, null)` without dynamic dispatch.
pub trait FixedValue: Copy + PartialEq + Send + Sync + 'static {
    const KIND: AttributeKind;

    /// Returns the typed value slice and null value when `array` is of this
    /// element type.
    fn view(array: &AttributeArray) -> Option<(&[Self], Self)>;
}

macro_rules! impl_fixed_value {
    ($ty:ty, $variant:ident) => {
        impl FixedValue for $ty {
            const KIND: AttributeKind = AttributeKind::$variant;

            fn view(array: &AttributeArray) -> Option<(&[Self], Self)> {
                match array {
                    AttributeArray::$variant { null, values } => Some((&values[..], *null)),
                    _ => None,
                }
            }
        }
    };
}

impl_fixed_value!(u8, U8);
impl_fixed_value!(u16, U16);
impl_fixed_value!(u32, U32);
impl_fixed_value!(u64, U64);
impl_fixed_value!(i8, I8);
impl_fixed_value!(i16, I16);
impl_fixed_value!(i32, I32);
impl_fixed_value!(i64, I64);
impl_fixed_value!(f32, F32);
impl_fixed_value!(f64, F64);
