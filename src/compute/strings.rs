//! Dictionary-level string transforms.
//!
//! String columns are dictionary-encoded, so these operations never
//! touch row data directly: each distinct dictionary entry referenced by
//! the column is transformed **once**, the result interned, and an
//! old-index → new-index mapping remaps the column. Cost is
//! O(distinct) in the string space plus one pass over the indices.

use crate::buffer::ColumnBuffer;
use crate::dictionary::DictionaryRef;
use crate::types::DTypeKind;
use crate::{Error, Result};
use std::collections::HashMap;

/// Remap a string column through a per-entry transform.
///
/// The transform runs once per distinct entry; results are interned into
/// the same dictionary. Null slots stay null.
pub fn map_string_column<F>(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
    transform: F,
) -> Result<ColumnBuffer>
where
    F: Fn(&str) -> String,
{
    if column.kind() != DTypeKind::Str {
        return Err(Error::TypeMismatch {
            expected: "String".to_string(),
            actual: column.kind().name().to_string(),
        });
    }

    let rows = column.len();
    let mut out = ColumnBuffer::new(column.dtype(), rows.max(1))?;
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut guard = dict.write().expect("dictionary lock poisoned");

    for row in 0..rows {
        let Some(index) = column.str_index(row) else {
            out.append_null()?;
            continue;
        };
        let new_index = match remap.get(&index) {
            Some(&new_index) => new_index,
            None => {
                let transformed = match guard.get(index) {
                    Some(s) => transform(s),
                    None => {
                        return Err(Error::InvalidOffset {
                            index: index as usize,
                            len: guard.len(),
                        })
                    }
                };
                let new_index = guard.intern_str(&transformed);
                remap.insert(index, new_index);
                new_index
            }
        };
        out.append_str_index(new_index)?;
    }
    Ok(out)
}

/// Uppercase every value.
pub fn upper(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| s.to_uppercase())
}

/// Lowercase every value.
pub fn lower(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| s.to_lowercase())
}

/// Trim surrounding whitespace from every value.
pub fn trim(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| s.trim().to_string())
}

/// Replace every occurrence of `from` with `to` in each value.
pub fn replace(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
    from: &str,
    to: &str,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| s.replace(from, to))
}

/// Left-pad each value with `pad` up to `width` characters.
pub fn pad_left(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
    width: usize,
    pad: char,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| {
        let current = s.chars().count();
        if current >= width {
            s.to_string()
        } else {
            let mut padded: String =
                std::iter::repeat(pad).take(width - current).collect();
            padded.push_str(s);
            padded
        }
    })
}

/// Right-pad each value with `pad` up to `width` characters.
pub fn pad_right(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
    width: usize,
    pad: char,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| {
        let current = s.chars().count();
        let mut padded = s.to_string();
        padded.extend(std::iter::repeat(pad).take(width.saturating_sub(current)));
        padded
    })
}

/// Character substring `[start, start + len)` of each value.
pub fn substring(
    column: &ColumnBuffer,
    dict: &DictionaryRef,
    start: usize,
    len: usize,
) -> Result<ColumnBuffer> {
    map_string_column(column, dict, |s| {
        s.chars().skip(start).take(len).collect()
    })
}
