//! Null filling and dropping.
//!
//! [`fill_null`] rewrites null slots in place: with a type-checked
//! constant (interned once for string columns), or with the previous
//! (forward) / next (backward) non-null value. Filled slots get their
//! null bit cleared. [`drop_null_selection`] builds a selection vector of
//! the rows that are non-null across **all** listed columns — AND
//! semantics, no data copy; an empty column list means every nullable
//! column.

use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::dictionary::DictionaryRef;
use crate::types::{DTypeKind, Scalar};
use crate::{Error, Result};

/// How to replace null slots.
#[derive(Debug, Clone)]
pub enum FillStrategy {
    /// Write this constant into every null slot.
    Constant(Scalar),
    /// Write the previous non-null value; leading nulls stay null.
    Forward,
    /// Write the next non-null value; trailing nulls stay null.
    Backward,
}

fn constant_matches(kind: DTypeKind, value: &Scalar) -> bool {
    match value {
        Scalar::Null => false,
        Scalar::Str(_) => kind == DTypeKind::Str,
        Scalar::Bool(_) => kind == DTypeKind::Bool,
        Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_) => {
            kind.is_numeric()
        }
    }
}

/// Fill null slots of a column in place.
pub fn fill_null(
    column: &mut ColumnBuffer,
    strategy: &FillStrategy,
    dict: Option<&DictionaryRef>,
) -> Result<()> {
    let rows = column.len();
    match strategy {
        FillStrategy::Constant(value) => {
            if !constant_matches(column.kind(), value) {
                return Err(Error::InvalidFillValue(format!(
                    "{:?} does not fit a {} column",
                    value,
                    column.kind().name()
                )));
            }
            // String constants are interned exactly once.
            let stored = match value {
                Scalar::Str(s) => {
                    let dict = dict.ok_or_else(|| {
                        Error::InvalidFillValue(
                            "string fill requires a dictionary".to_string(),
                        )
                    })?;
                    Scalar::UInt(
                        dict.write()
                            .expect("dictionary lock poisoned")
                            .intern_str(s) as u64,
                    )
                }
                other => other.clone(),
            };
            for row in 0..rows {
                if column.is_null(row) {
                    column.set_value(row, &stored)?;
                    column.set_null(row, false)?;
                }
            }
        }
        FillStrategy::Forward => {
            let mut last: Option<Scalar> = None;
            for row in 0..rows {
                if column.is_null(row) {
                    if let Some(value) = &last {
                        column.set_value(row, value)?;
                        column.set_null(row, false)?;
                    }
                } else {
                    last = Some(raw_value(column, row));
                }
            }
        }
        FillStrategy::Backward => {
            let mut next: Option<Scalar> = None;
            for row in (0..rows).rev() {
                if column.is_null(row) {
                    if let Some(value) = &next {
                        column.set_value(row, value)?;
                        column.set_null(row, false)?;
                    }
                } else {
                    next = Some(raw_value(column, row));
                }
            }
        }
    }
    Ok(())
}

// Physical value including string indices, suitable for re-storing.
fn raw_value(column: &ColumnBuffer, row: usize) -> Scalar {
    if column.kind() == DTypeKind::Str {
        match column.str_index(row) {
            Some(index) => Scalar::UInt(index as u64),
            None => Scalar::Null,
        }
    } else {
        column.value(row)
    }
}

/// Build a selection vector of the logical rows that are non-null in
/// every listed column.
///
/// Resulting indices are physical, suitable for
/// [`Chunk::set_selection`]. An empty `columns` list selects over all
/// nullable columns of the schema.
pub fn drop_null_selection(
    chunk: &Chunk,
    columns: &[&str],
) -> Result<Vec<u32>> {
    let schema = chunk.schema();
    let targets: Vec<usize> = if columns.is_empty() {
        schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, def)| def.dtype.nullable)
            .map(|(index, _)| index)
            .collect()
    } else {
        columns
            .iter()
            .map(|name| schema.resolve(name))
            .collect::<Result<_>>()?
    };

    let mut selection = Vec::with_capacity(chunk.row_count());
    for row in 0..chunk.row_count() {
        let keep = targets.iter().all(|&column| !chunk.is_null(column, row));
        if keep {
            selection.push(chunk.resolve_row(row) as u32);
        }
    }
    Ok(selection)
}
