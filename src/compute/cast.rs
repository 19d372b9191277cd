//! Column casting.
//!
//! [`cast_column`] is a dispatch matrix over the cartesian product of
//! data kinds. The interesting cells:
//!
//! - **numeric → numeric** — a straight copy loop with one conversion
//!   branch at the integer/float boundary; integer targets truncate
//!   toward zero and wrap to the target width.
//! - **string → numeric / date / timestamp / bool** — each distinct
//!   dictionary entry is parsed **once** and cached by index; column
//!   values are then remapped. Unparseable entries become null.
//! - **numeric → string** — each distinct value is stringified once and
//!   interned into the supplied dictionary.
//! - **bool ↔ string** — `"true"`/`"false"` are pre-interned for the
//!   forward direction; the reverse accepts a fixed truthy/falsy set.
//!
//! Unsupported pairs yield [`CastNotSupported`](crate::Error::CastNotSupported).
//! Null bits always propagate; per-value failures degrade to null rather
//! than failing the cast.

use crate::buffer::ColumnBuffer;
use crate::dictionary::DictionaryRef;
use crate::types::{DType, DTypeKind, Scalar};
use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

const EPOCH_DAY0: i64 = 719_163; // days from CE to 1970-01-01

/// Parse a decimal number, tolerating surrounding whitespace.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a `YYYY-MM-DD` date into days since the Unix epoch.
pub(crate) fn parse_date_days(s: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    let days = date.num_days_from_ce() as i64 - EPOCH_DAY0;
    i32::try_from(days).ok()
}

/// Parse a datetime (or bare date) into milliseconds since the epoch.
pub(crate) fn parse_timestamp_millis(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    parse_date_days(trimmed).map(|days| days as i64 * 86_400_000)
}

/// Format epoch days as `YYYY-MM-DD`.
pub(crate) fn format_date(days: i32) -> String {
    match NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAY0 as i32) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => days.to_string(),
    }
}

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM:SS`.
pub(crate) fn format_timestamp(millis: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
        None => millis.to_string(),
    }
}

const TRUTHY: [&str; 5] = ["true", "t", "yes", "y", "1"];
const FALSY: [&str; 5] = ["false", "f", "no", "n", "0"];

fn parse_bool(s: &str) -> Option<bool> {
    let lower = s.trim().to_ascii_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn narrow_int(value: i64, to: DTypeKind) -> Scalar {
    match to {
        DTypeKind::Int8 => Scalar::Int(value as i8 as i64),
        DTypeKind::Int16 => Scalar::Int(value as i16 as i64),
        DTypeKind::Int32 | DTypeKind::Date => {
            Scalar::Int(value as i32 as i64)
        }
        DTypeKind::Int64 | DTypeKind::Timestamp => Scalar::Int(value),
        DTypeKind::UInt8 => Scalar::UInt(value as u8 as u64),
        DTypeKind::UInt16 => Scalar::UInt(value as u16 as u64),
        DTypeKind::UInt32 => Scalar::UInt(value as u32 as u64),
        DTypeKind::UInt64 => Scalar::UInt(value as u64),
        _ => Scalar::Null,
    }
}

/// Convert one scalar to the target kind, degrading to null when the
/// value cannot be represented.
pub(crate) fn cast_scalar(value: &Scalar, to: DTypeKind) -> Scalar {
    if value.is_null() {
        return Scalar::Null;
    }
    match to {
        DTypeKind::Str => Scalar::Str(match value {
            Scalar::Int(v) => v.to_string(),
            Scalar::UInt(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Bool(v) => {
                if *v {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            Scalar::Str(s) => s.clone(),
            Scalar::Null => unreachable!("null handled above"),
        }),
        DTypeKind::Bool => match value {
            Scalar::Bool(v) => Scalar::Bool(*v),
            Scalar::Str(s) => match parse_bool(s) {
                Some(v) => Scalar::Bool(v),
                None => Scalar::Null,
            },
            other => match other.as_f64() {
                Some(v) => Scalar::Bool(v != 0.0),
                None => Scalar::Null,
            },
        },
        DTypeKind::Float32 => match numeric_view(value) {
            Some(v) => Scalar::Float(v as f32 as f64),
            None => Scalar::Null,
        },
        DTypeKind::Float64 => match numeric_view(value) {
            Some(v) => Scalar::Float(v),
            None => Scalar::Null,
        },
        integer => match value {
            Scalar::Int(v) => narrow_int(*v, integer),
            Scalar::UInt(v) => narrow_int(*v as i64, integer),
            Scalar::Bool(v) => narrow_int(*v as i64, integer),
            Scalar::Float(v) => {
                if v.is_finite() {
                    narrow_int(v.trunc() as i64, integer)
                } else {
                    Scalar::Null
                }
            }
            Scalar::Str(s) => match integer {
                DTypeKind::Date => match parse_date_days(s) {
                    Some(days) => Scalar::Int(days as i64),
                    None => Scalar::Null,
                },
                DTypeKind::Timestamp => match parse_timestamp_millis(s) {
                    Some(ms) => Scalar::Int(ms),
                    None => Scalar::Null,
                },
                _ => match parse_number(s) {
                    Some(v) => narrow_int(v.trunc() as i64, integer),
                    None => Scalar::Null,
                },
            },
            Scalar::Null => unreachable!("null handled above"),
        },
    }
}

fn numeric_view(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Str(s) => parse_number(s),
        other => other.as_f64(),
    }
}

fn require_dict(dict: Option<&DictionaryRef>) -> Result<&DictionaryRef> {
    dict.ok_or_else(|| {
        Error::SchemaMismatch("string cast requires a dictionary".to_string())
    })
}

/// Cast a whole column to a target dtype.
///
/// `dict` is the chunk's dictionary: read from for string sources,
/// interned into for string targets.
pub fn cast_column(
    column: &ColumnBuffer,
    to: DType,
    dict: Option<&DictionaryRef>,
) -> Result<ColumnBuffer> {
    let from = column.kind();
    let rows = column.len();
    let lossy = from == DTypeKind::Str && to.kind != DTypeKind::Str;
    let out_dtype = DType {
        kind: to.kind,
        nullable: to.nullable || column.dtype().nullable || lossy,
    };

    // Pairs with no conversion at all.
    let bool_temporal = (from == DTypeKind::Bool
        && matches!(to.kind, DTypeKind::Date | DTypeKind::Timestamp))
        || (to.kind == DTypeKind::Bool
            && matches!(from, DTypeKind::Date | DTypeKind::Timestamp));
    if bool_temporal {
        return Err(Error::CastNotSupported {
            from: from.name(),
            to: to.kind.name(),
        });
    }

    let mut out = ColumnBuffer::new(out_dtype, rows.max(1))?;

    match (from, to.kind) {
        (DTypeKind::Str, DTypeKind::Str) => {
            for row in 0..rows {
                match column.str_index(row) {
                    Some(index) => out.append_str_index(index)?,
                    None => out.append_null()?,
                }
            }
        }
        (DTypeKind::Str, target) => {
            let dict = require_dict(dict)?;
            let guard = dict.read().expect("dictionary lock poisoned");
            // Parse each distinct entry once, keyed by dictionary index.
            let mut parsed: HashMap<u32, Scalar> = HashMap::new();
            for row in 0..rows {
                let Some(index) = column.str_index(row) else {
                    out.append_null()?;
                    continue;
                };
                let value = parsed
                    .entry(index)
                    .or_insert_with(|| match guard.get(index) {
                        Some(s) => {
                            cast_scalar(&Scalar::Str(s.to_string()), target)
                        }
                        None => Scalar::Null,
                    })
                    .clone();
                out.append(value)?;
            }
        }
        (source, DTypeKind::Str) => {
            let dict = require_dict(dict)?;
            let mut guard = dict.write().expect("dictionary lock poisoned");
            // Stringify each distinct value once, keyed by its raw bits.
            let mut interned: HashMap<u64, u32> = HashMap::new();
            let true_index = guard.intern_str("true");
            let false_index = guard.intern_str("false");
            for row in 0..rows {
                if column.is_null(row) {
                    out.append_null()?;
                    continue;
                }
                let value = column.value(row);
                let index = match (&value, source) {
                    (Scalar::Bool(true), _) => true_index,
                    (Scalar::Bool(false), _) => false_index,
                    _ => {
                        let bits = scalar_bits(&value);
                        match interned.get(&bits) {
                            Some(&index) => index,
                            None => {
                                let rendered =
                                    render_numeric(&value, source);
                                let index = guard.intern_str(&rendered);
                                interned.insert(bits, index);
                                index
                            }
                        }
                    }
                };
                out.append_str_index(index)?;
            }
        }
        _ => {
            for row in 0..rows {
                if column.is_null(row) {
                    out.append_null()?;
                    continue;
                }
                out.append(cast_scalar(&column.value(row), to.kind))?;
            }
        }
    }
    Ok(out)
}

fn scalar_bits(value: &Scalar) -> u64 {
    match value {
        Scalar::Int(v) => *v as u64,
        Scalar::UInt(v) => *v,
        Scalar::Float(v) => v.to_bits(),
        Scalar::Bool(v) => *v as u64,
        _ => 0,
    }
}

fn render_numeric(value: &Scalar, source: DTypeKind) -> String {
    match (value, source) {
        (Scalar::Int(v), DTypeKind::Date) => format_date(*v as i32),
        (Scalar::Int(v), DTypeKind::Timestamp) => format_timestamp(*v),
        (Scalar::Int(v), _) => v.to_string(),
        (Scalar::UInt(v), _) => v.to_string(),
        (Scalar::Float(v), _) => v.to_string(),
        (other, _) => format!("{other:?}"),
    }
}
