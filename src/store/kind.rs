//! Attribute kind discriminator and the canonical value carrier.
//!
//! Source columns deliver values widened to four carrier shapes: unsigned
//! integers as `u64`, signed as `i64`, floats as `f64`, strings as owned
//! `String`s. Attribute arrays narrow the carrier to their native width on
//! write, see [`AttributeArray::set`](crate::store::attribute::AttributeArray::set).

use std::fmt;

/// Declared kind of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl AttributeKind {
    /// Returns `true` for the fixed-width (non-string) kinds.
    #[inline]
    pub fn is_fixed_width(self) -> bool {
        !matches!(self, Self::Str)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "string",
        };
        f.write_str(name)
    }
}

/// Canonical widened value flowing from source columns into attribute
/// arrays, and the shape null values are declared in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Carrier for `U8`/`U16`/`U32`/`U64`.
    UInt(u64),
    /// Carrier for `I8`/`I16`/`I32`/`I64`.
    Int(i64),
    /// Carrier for `F32`/`F64`.
    Float(f64),
    /// Carrier for `Str`.
    Str(String),
}

impl Value {
    /// Returns the attribute kinds this carrier can feed.
    pub fn carries(&self, kind: AttributeKind) -> bool {
        match self {
            Self::UInt(_) => matches!(
                kind,
                AttributeKind::U8 | AttributeKind::U16 | AttributeKind::U32 | AttributeKind::U64
            ),
            Self::Int(_) => matches!(
                kind,
                AttributeKind::I8 | AttributeKind::I16 | AttributeKind::I32 | AttributeKind::I64
            ),
            Self::Float(_) => matches!(kind, AttributeKind::F32 | AttributeKind::F64),
            Self::Str(_) => matches!(kind, AttributeKind::Str),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
