//! # Data type system
//!
//! The engine works over a closed set of primitive data kinds
//! ([`DTypeKind`]); every column stores elements of exactly one kind in a
//! fixed-width representation:
//!
//! | Kind | Rust type | Storage | Notes |
//! |------|-----------|---------|-------|
//! | `Int8`..`Int64` | `i8`..`i64` | 1–8 bytes | |
//! | `UInt8`..`UInt64` | `u8`..`u64` | 1–8 bytes | |
//! | `Float32`/`Float64` | `f32`/`f64` | 4/8 bytes | IEEE 754 |
//! | `Bool` | `u8` | 1 byte | 0 = false, 1 = true |
//! | `Str` | `u32` | 4 bytes | dictionary index |
//! | `Date` | `i32` | 4 bytes | days since 1970-01-01 |
//! | `Timestamp` | `i64` | 8 bytes | milliseconds since epoch |
//!
//! A [`DType`] pairs a kind with a `nullable` flag. [`Scalar`] is the
//! runtime value currency of the expression engine: a tagged enum over the
//! value families (signed integers, dates and timestamps travel as
//! `Scalar::Int`).

use std::cmp::Ordering;
use std::fmt;

/// Closed enumeration of primitive data kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DTypeKind {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE 754 floating-point number.
    Float32,
    /// 64-bit IEEE 754 floating-point number.
    Float64,
    /// Boolean stored as one byte (0 = false, 1 = true).
    Bool,
    /// Dictionary-encoded variable-width string (stored as `u32` index).
    Str,
    /// Date as days since 1970-01-01 (signed 32-bit).
    Date,
    /// Timestamp as milliseconds since the Unix epoch (signed 64-bit).
    Timestamp,
}

impl DTypeKind {
    /// Returns the fixed element width in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            DTypeKind::Int8 | DTypeKind::UInt8 | DTypeKind::Bool => 1,
            DTypeKind::Int16 | DTypeKind::UInt16 => 2,
            DTypeKind::Int32
            | DTypeKind::UInt32
            | DTypeKind::Float32
            | DTypeKind::Str
            | DTypeKind::Date => 4,
            DTypeKind::Int64
            | DTypeKind::UInt64
            | DTypeKind::Float64
            | DTypeKind::Timestamp => 8,
        }
    }

    /// Returns the kind's display name.
    pub fn name(&self) -> &'static str {
        match self {
            DTypeKind::Int8 => "Int8",
            DTypeKind::Int16 => "Int16",
            DTypeKind::Int32 => "Int32",
            DTypeKind::Int64 => "Int64",
            DTypeKind::UInt8 => "UInt8",
            DTypeKind::UInt16 => "UInt16",
            DTypeKind::UInt32 => "UInt32",
            DTypeKind::UInt64 => "UInt64",
            DTypeKind::Float32 => "Float32",
            DTypeKind::Float64 => "Float64",
            DTypeKind::Bool => "Bool",
            DTypeKind::Str => "String",
            DTypeKind::Date => "Date",
            DTypeKind::Timestamp => "Timestamp",
        }
    }

    /// True for integer, float, date and timestamp kinds.
    ///
    /// Date and Timestamp participate in numeric arithmetic through their
    /// integer representations.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DTypeKind::Bool | DTypeKind::Str)
    }

    /// True for the integer kinds (excluding Date/Timestamp).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DTypeKind::Int8
                | DTypeKind::Int16
                | DTypeKind::Int32
                | DTypeKind::Int64
                | DTypeKind::UInt8
                | DTypeKind::UInt16
                | DTypeKind::UInt32
                | DTypeKind::UInt64
        )
    }

    /// True for `Float32` and `Float64`.
    pub fn is_float(&self) -> bool {
        matches!(self, DTypeKind::Float32 | DTypeKind::Float64)
    }

    /// True for signed integer kinds, `Date` and `Timestamp`.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DTypeKind::Int8
                | DTypeKind::Int16
                | DTypeKind::Int32
                | DTypeKind::Int64
                | DTypeKind::Date
                | DTypeKind::Timestamp
        )
    }

    /// True for unsigned integer kinds.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            DTypeKind::UInt8
                | DTypeKind::UInt16
                | DTypeKind::UInt32
                | DTypeKind::UInt64
        )
    }
}

impl fmt::Display for DTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A data kind paired with a nullability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    /// The primitive data kind.
    pub kind: DTypeKind,
    /// Whether the column may contain nulls.
    pub nullable: bool,
}

impl DType {
    /// Create a non-nullable dtype of the given kind.
    pub fn new(kind: DTypeKind) -> Self {
        Self { kind, nullable: false }
    }

    /// Returns a copy of this dtype with the nullable flag set.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Non-nullable `Int8`.
    pub fn int8() -> Self {
        Self::new(DTypeKind::Int8)
    }

    /// Non-nullable `Int16`.
    pub fn int16() -> Self {
        Self::new(DTypeKind::Int16)
    }

    /// Non-nullable `Int32`.
    pub fn int32() -> Self {
        Self::new(DTypeKind::Int32)
    }

    /// Non-nullable `Int64`.
    pub fn int64() -> Self {
        Self::new(DTypeKind::Int64)
    }

    /// Non-nullable `UInt8`.
    pub fn uint8() -> Self {
        Self::new(DTypeKind::UInt8)
    }

    /// Non-nullable `UInt16`.
    pub fn uint16() -> Self {
        Self::new(DTypeKind::UInt16)
    }

    /// Non-nullable `UInt32`.
    pub fn uint32() -> Self {
        Self::new(DTypeKind::UInt32)
    }

    /// Non-nullable `UInt64`.
    pub fn uint64() -> Self {
        Self::new(DTypeKind::UInt64)
    }

    /// Non-nullable `Float32`.
    pub fn float32() -> Self {
        Self::new(DTypeKind::Float32)
    }

    /// Non-nullable `Float64`.
    pub fn float64() -> Self {
        Self::new(DTypeKind::Float64)
    }

    /// Non-nullable `Bool`.
    pub fn boolean() -> Self {
        Self::new(DTypeKind::Bool)
    }

    /// Non-nullable dictionary-encoded string.
    pub fn string() -> Self {
        Self::new(DTypeKind::Str)
    }

    /// Non-nullable `Date`.
    pub fn date() -> Self {
        Self::new(DTypeKind::Date)
    }

    /// Non-nullable `Timestamp`.
    pub fn timestamp() -> Self {
        Self::new(DTypeKind::Timestamp)
    }

    /// Returns the dtype's display name, e.g. `Nullable(Int32)`.
    pub fn name(&self) -> String {
        if self.nullable {
            format!("Nullable({})", self.kind.name())
        } else {
            self.kind.name().to_string()
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Result of promoting two numeric kinds for arithmetic.
///
/// Promotion ladder: any Float64 → Float64; else any Float32 → Float32;
/// else any 64-bit integer → Int64 (UInt64 only when both sides are
/// UInt64); else any 32-bit → Int32/UInt32; else any 16-bit →
/// Int16/UInt16; else Int16 (8-bit pairs promote to 16 bits to avoid
/// overflow). Date and Timestamp promote through their integer widths.
pub fn promote(a: DTypeKind, b: DTypeKind) -> Option<DTypeKind> {
    use DTypeKind::*;

    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }

    // Date/Timestamp arithmetic happens in their integer representation.
    let a = match a {
        Date => Int32,
        Timestamp => Int64,
        other => other,
    };
    let b = match b {
        Date => Int32,
        Timestamp => Int64,
        other => other,
    };

    if a == Float64 || b == Float64 {
        return Some(Float64);
    }
    if a == Float32 || b == Float32 {
        return Some(Float32);
    }
    if a == UInt64 && b == UInt64 {
        return Some(UInt64);
    }
    if matches!(a, Int64 | UInt64) || matches!(b, Int64 | UInt64) {
        return Some(Int64);
    }
    if a == UInt32 && b == UInt32 {
        return Some(UInt32);
    }
    if matches!(a, Int32 | UInt32) || matches!(b, Int32 | UInt32) {
        return Some(Int32);
    }
    if a == UInt16 && b == UInt16 {
        return Some(UInt16);
    }
    if matches!(a, Int16 | UInt16) || matches!(b, Int16 | UInt16) {
        return Some(Int16);
    }
    // Both 8-bit: widen to 16 bits.
    Some(Int16)
}

/// A single runtime value.
///
/// The expression compiler evaluates every node to a `Scalar`; signed
/// integers, dates and timestamps share the `Int` variant, and strings
/// are materialized out of the dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Absent value.
    Null,
    /// Signed 64-bit integer (also Date days and Timestamp millis).
    Int(i64),
    /// Unsigned 64-bit integer.
    UInt(u64),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Materialized string.
    Str(String),
}

impl Scalar {
    /// True when this is `Scalar::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view as `f64`, when the value is numeric or boolean.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::UInt(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Bool(v) => Some(*v as u8 as f64),
            _ => None,
        }
    }

    /// Integer view as `i64`, truncating floats toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::UInt(v) => Some(*v as i64),
            Scalar::Float(v) => Some(v.trunc() as i64),
            Scalar::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Truthiness: false for Null, `false`, zero and empty string.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(v) => *v,
            Scalar::Int(v) => *v != 0,
            Scalar::UInt(v) => *v != 0,
            Scalar::Float(v) => *v != 0.0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }

    /// Three-way comparison between two non-null scalars.
    ///
    /// Numbers compare as numbers (preserving full 64-bit integer
    /// precision when both sides are integers), strings compare
    /// byte-lexicographically. Returns `None` when either side is null
    /// or the families are incomparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => None,
            (Scalar::Str(a), Scalar::Str(b)) => {
                Some(a.as_bytes().cmp(b.as_bytes()))
            }
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::UInt(a), Scalar::UInt(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::UInt(b)) => {
                if *a < 0 {
                    Some(Ordering::Less)
                } else {
                    Some((*a as u64).cmp(b))
                }
            }
            (Scalar::UInt(a), Scalar::Int(b)) => {
                if *b < 0 {
                    Some(Ordering::Greater)
                } else {
                    Some(a.cmp(&(*b as u64)))
                }
            }
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}
