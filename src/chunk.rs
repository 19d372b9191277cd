//! Chunks: batches of columns sharing a schema and a dictionary.
//!
//! A [`Chunk`] is the unit of data flow through a pipeline: one
//! [`ColumnBuffer`] per schema column, all the same length, plus an
//! optional shared [`Dictionary`](crate::dictionary::Dictionary) for
//! string columns and an optional **selection vector**.
//!
//! The selection vector virtualizes row identity: when present, every
//! read accessor (`is_null`, `get_value`, `get_string_value`) translates
//! logical row `r` to physical row `selection[r]`. Applying a new
//! selection replaces the old one. **Materializing** copies the selected
//! rows into fresh contiguous buffers and drops the selection — required
//! before operators that append computed columns, which need dense
//! positions.
//!
//! A chunk exclusively owns its buffers and shares the dictionary with
//! upstream producers.

use crate::buffer::ColumnBuffer;
use crate::dictionary::DictionaryRef;
use crate::schema::SchemaRef;
use crate::types::{DTypeKind, Scalar};
use crate::{Error, Result};
use std::sync::Arc;

/// A batch of columnar data over one schema.
#[derive(Clone, Debug)]
pub struct Chunk {
    schema: SchemaRef,
    columns: Vec<ColumnBuffer>,
    dictionary: Option<DictionaryRef>,
    selection: Option<Vec<u32>>,
}

impl Chunk {
    /// Assemble a chunk from buffers conforming to `schema`.
    ///
    /// Validates column count, per-column kind agreement and equal
    /// lengths. Chunks containing string columns must carry a dictionary.
    pub fn new(
        schema: SchemaRef,
        columns: Vec<ColumnBuffer>,
        dictionary: Option<DictionaryRef>,
    ) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(Error::SchemaMismatch(format!(
                "expected {} columns, got {}",
                schema.len(),
                columns.len()
            )));
        }
        let mut rows = None;
        for (def, column) in schema.columns().iter().zip(&columns) {
            if def.dtype.kind != column.kind() {
                return Err(Error::TypeMismatch {
                    expected: def.dtype.kind.name().to_string(),
                    actual: column.kind().name().to_string(),
                });
            }
            match rows {
                None => rows = Some(column.len()),
                Some(expected) if expected != column.len() => {
                    return Err(Error::SchemaMismatch(format!(
                        "column '{}' has {} rows, expected {}",
                        def.name,
                        column.len(),
                        expected
                    )));
                }
                _ => {}
            }
        }
        let has_strings = schema
            .columns()
            .iter()
            .any(|def| def.dtype.kind == DTypeKind::Str);
        if has_strings && dictionary.is_none() {
            return Err(Error::SchemaMismatch(
                "chunk with string columns requires a dictionary".to_string(),
            ));
        }
        Ok(Self { schema, columns, dictionary, selection: None })
    }

    /// The chunk's schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The shared dictionary, when string columns are present.
    pub fn dictionary(&self) -> Option<&DictionaryRef> {
        self.dictionary.as_ref()
    }

    /// Number of logical rows (selection length when one is installed).
    pub fn row_count(&self) -> usize {
        match &self.selection {
            Some(selection) => selection.len(),
            None => self.physical_rows(),
        }
    }

    /// Number of physical rows stored in the buffers.
    pub fn physical_rows(&self) -> usize {
        self.columns.first().map(ColumnBuffer::len).unwrap_or(0)
    }

    /// The installed selection vector, if any.
    pub fn selection(&self) -> Option<&[u32]> {
        self.selection.as_deref()
    }

    /// Install a selection vector, replacing any existing one.
    pub fn set_selection(&mut self, selection: Vec<u32>) -> Result<()> {
        let rows = self.physical_rows();
        for &index in &selection {
            if index as usize >= rows {
                return Err(Error::InvalidOffset {
                    index: index as usize,
                    len: rows,
                });
            }
        }
        self.selection = Some(selection);
        Ok(())
    }

    /// Remove the selection vector without materializing.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Enforce the producer contract: a selection, when present, must be
    /// strictly increasing with every index in `[0, physical_rows)`.
    pub fn validate_selection(&self) -> Result<()> {
        if let Some(selection) = &self.selection {
            let rows = self.physical_rows();
            let mut prev: Option<u32> = None;
            for &index in selection {
                if index as usize >= rows {
                    return Err(Error::InvalidOffset {
                        index: index as usize,
                        len: rows,
                    });
                }
                if let Some(p) = prev {
                    if index <= p {
                        return Err(Error::InvalidOffset {
                            index: index as usize,
                            len: rows,
                        });
                    }
                }
                prev = Some(index);
            }
        }
        Ok(())
    }

    /// Translate a logical row to its physical index.
    #[inline]
    pub fn resolve_row(&self, row: usize) -> usize {
        match &self.selection {
            Some(selection) => selection[row] as usize,
            None => row,
        }
    }

    /// Column buffer at `index`.
    pub fn column(&self, index: usize) -> &ColumnBuffer {
        &self.columns[index]
    }

    /// All column buffers in schema order.
    pub fn columns(&self) -> &[ColumnBuffer] {
        &self.columns
    }

    /// Decompose into parts, discarding any selection vector.
    pub fn into_parts(
        self,
    ) -> (SchemaRef, Vec<ColumnBuffer>, Option<DictionaryRef>) {
        (self.schema, self.columns, self.dictionary)
    }

    /// Whether the value at `(column, logical row)` is null.
    pub fn is_null(&self, column: usize, row: usize) -> bool {
        self.columns[column].is_null(self.resolve_row(row))
    }

    /// Value at `(column, logical row)`.
    ///
    /// String columns yield their dictionary index as `Scalar::UInt`; use
    /// [`Chunk::get_string_value`] for the payload.
    pub fn get_value(&self, column: usize, row: usize) -> Scalar {
        self.columns[column].value(self.resolve_row(row))
    }

    /// Materialized string at `(column, logical row)`, `None` when null
    /// or when the column is not a string column.
    pub fn get_string_value(
        &self,
        column: usize,
        row: usize,
    ) -> Option<String> {
        let index = self.columns[column].str_index(self.resolve_row(row))?;
        let dict = self.dictionary.as_ref()?;
        let guard = dict.read().expect("dictionary lock poisoned");
        guard.get(index).map(str::to_string)
    }

    /// Value at `(column, logical row)` with strings materialized.
    pub fn get_scalar(&self, column: usize, row: usize) -> Scalar {
        if self.columns[column].kind() == DTypeKind::Str {
            match self.get_string_value(column, row) {
                Some(s) => Scalar::Str(s),
                None => Scalar::Null,
            }
        } else {
            self.get_value(column, row)
        }
    }

    /// Copy the selected rows into fresh contiguous buffers, producing an
    /// equivalent chunk with no selection vector.
    pub fn materialize(&self) -> Result<Chunk> {
        let selection: Vec<u32> = match &self.selection {
            Some(selection) => selection.clone(),
            None => return Ok(self.clone()),
        };
        let capacity = selection.len().max(1);
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut fresh = ColumnBuffer::new(column.dtype(), capacity)?;
            fresh.copy_from(column, &selection)?;
            columns.push(fresh);
        }
        Ok(Chunk {
            schema: Arc::clone(&self.schema),
            columns,
            dictionary: self.dictionary.clone(),
            selection: None,
        })
    }

    /// Append the value at `(column, logical row)` onto `dst`.
    ///
    /// Strings are copied by index when `dst_dict` is the same dictionary
    /// as this chunk's, and re-interned otherwise.
    pub fn copy_value_into(
        &self,
        column: usize,
        row: usize,
        dst: &mut ColumnBuffer,
        dst_dict: Option<&DictionaryRef>,
    ) -> Result<()> {
        let physical = self.resolve_row(row);
        let src = &self.columns[column];
        if src.is_null(physical) {
            return dst.append_null();
        }
        if src.kind() == DTypeKind::Str {
            let index = src.str_index(physical).ok_or(Error::InvalidOffset {
                index: physical,
                len: src.len(),
            })?;
            let src_dict = self.dictionary.as_ref().ok_or_else(|| {
                Error::SchemaMismatch(
                    "string column without dictionary".to_string(),
                )
            })?;
            let dst_dict = dst_dict.ok_or_else(|| {
                Error::SchemaMismatch(
                    "string destination without dictionary".to_string(),
                )
            })?;
            if Arc::ptr_eq(src_dict, dst_dict) {
                return dst.append_str_index(index);
            }
            let payload = {
                let guard =
                    src_dict.read().expect("dictionary lock poisoned");
                let len = guard.len();
                guard
                    .get_bytes(index)
                    .map(<[u8]>::to_vec)
                    .ok_or(Error::InvalidOffset {
                        index: index as usize,
                        len,
                    })?
            };
            let new_index = dst_dict
                .write()
                .expect("dictionary lock poisoned")
                .intern(&payload);
            return dst.append_str_index(new_index);
        }
        dst.append(src.value(physical))
    }
}
