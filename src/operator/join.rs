//! Hash join operator.
//!
//! Build–probe join with the right side as build: the right input is
//! supplied as pre-collected chunks at construction and hashed into a
//! `key → row list` table (rows with null keys are skipped). `process`
//! probes with each left chunk and emits one output row per match;
//! `Left` joins emit unmatched left rows padded with right nulls, and
//! `Right` joins emit every unmatched right row padded with left nulls
//! from `finish`, carrying a fresh dictionary.
//!
//! Output chunks share the left chunk's dictionary; right-side string
//! values are re-interned into it when the dictionaries differ.

use super::{Operator, OperatorResult};
use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::dictionary::new_dictionary;
use crate::schema::{Schema, SchemaRef};
use crate::types::{DTypeKind, Scalar};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Matched pairs only.
    Inner,
    /// All left rows; unmatched ones padded with right nulls.
    Left,
    /// All right rows; unmatched ones padded with left nulls.
    Right,
}

/// Hash join configuration.
#[derive(Debug, Clone)]
pub struct HashJoinConfig {
    /// Probe-side key column.
    pub left_key: String,
    /// Build-side key column.
    pub right_key: String,
    /// Join flavor.
    pub join_type: JoinType,
    /// Suffix applied to right columns whose names collide with left
    /// columns.
    pub suffix: String,
}

// Canonical key encoding: integral values (including integral floats)
// share one representation so cross-width keys match.
fn key_bytes(value: &Scalar, out: &mut Vec<u8>) -> bool {
    out.clear();
    match value {
        Scalar::Null => false,
        Scalar::Int(v) => {
            out.push(b'i');
            out.extend_from_slice(&v.to_le_bytes());
            true
        }
        Scalar::UInt(v) => {
            if *v <= i64::MAX as u64 {
                out.push(b'i');
                out.extend_from_slice(&(*v as i64).to_le_bytes());
            } else {
                out.push(b'u');
                out.extend_from_slice(&v.to_le_bytes());
            }
            true
        }
        Scalar::Float(v) => {
            if v.fract() == 0.0
                && *v >= i64::MIN as f64
                && *v <= i64::MAX as f64
            {
                out.push(b'i');
                out.extend_from_slice(&(*v as i64).to_le_bytes());
            } else {
                out.push(b'f');
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            true
        }
        Scalar::Bool(v) => {
            out.push(b'b');
            out.push(*v as u8);
            true
        }
        Scalar::Str(s) => {
            out.push(b's');
            out.extend_from_slice(s.as_bytes());
            true
        }
    }
}

/// Build–probe hash join with the right side as build.
pub struct HashJoinOperator {
    config: HashJoinConfig,
    input_schema: SchemaRef,
    schema: SchemaRef,
    left_key_index: usize,
    right_key_index: usize,
    right_kept: Vec<usize>,
    right_chunks: Vec<Chunk>,
    table: HashMap<Vec<u8>, Vec<(u32, u32)>>,
    right_matched: Vec<Vec<bool>>,
    left_width: usize,
}

impl HashJoinOperator {
    /// Resolve keys, derive the output schema and build the hash table
    /// from the right-side chunks.
    pub fn new(
        config: HashJoinConfig,
        left_schema: &SchemaRef,
        right_schema: &SchemaRef,
        right_chunks: Vec<Chunk>,
    ) -> Result<Self> {
        let left_key_index = left_schema.resolve(&config.left_key)?;
        let right_key_index = right_schema.resolve(&config.right_key)?;
        for chunk in &right_chunks {
            if !chunk.schema().matches(right_schema) {
                return Err(Error::SchemaMismatch(
                    "right chunk does not match the right schema"
                        .to_string(),
                ));
            }
        }

        let mut defs = Vec::new();
        for def in left_schema.columns() {
            let mut dtype = def.dtype;
            if config.join_type == JoinType::Right {
                dtype.nullable = true;
            }
            defs.push((def.name.clone(), dtype));
        }
        let drop_right_key = config.right_key == config.left_key;
        let mut right_kept = Vec::new();
        for (index, def) in right_schema.columns().iter().enumerate() {
            if drop_right_key && index == right_key_index {
                continue;
            }
            let name = if left_schema.index_of(&def.name).is_some() {
                format!("{}{}", def.name, config.suffix)
            } else {
                def.name.clone()
            };
            let mut dtype = def.dtype;
            if config.join_type == JoinType::Left {
                dtype.nullable = true;
            }
            defs.push((name, dtype));
            right_kept.push(index);
        }
        let schema = Arc::new(Schema::new(defs)?);

        // Build phase: hash every right row with a non-null key.
        let mut table: HashMap<Vec<u8>, Vec<(u32, u32)>> = HashMap::new();
        let mut key = Vec::new();
        for (chunk_index, chunk) in right_chunks.iter().enumerate() {
            for row in 0..chunk.row_count() {
                let value = chunk.get_scalar(right_key_index, row);
                if !key_bytes(&value, &mut key) {
                    continue;
                }
                table
                    .entry(key.clone())
                    .or_default()
                    .push((chunk_index as u32, row as u32));
            }
        }
        let right_matched = right_chunks
            .iter()
            .map(|chunk| vec![false; chunk.row_count()])
            .collect();

        Ok(Self {
            config,
            input_schema: Arc::clone(left_schema),
            schema,
            left_key_index,
            right_key_index,
            right_kept,
            right_chunks,
            table,
            right_matched,
            left_width: left_schema.len(),
        })
    }

    fn alloc_columns(&self, rows: usize) -> Result<Vec<ColumnBuffer>> {
        self.schema
            .columns()
            .iter()
            .map(|def| ColumnBuffer::new(def.dtype, rows.max(1)))
            .collect()
    }
}

impl Operator for HashJoinOperator {
    fn name(&self) -> &str {
        "hash_join"
    }

    // The probe side: chunks fed to `process` are left-side chunks.
    fn input_schema(&self) -> &SchemaRef {
        &self.input_schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        let rows = chunk.row_count();
        let mut key = Vec::new();

        // First pass: count output rows so buffers allocate exactly once.
        let mut total = 0usize;
        for row in 0..rows {
            let value = chunk.get_scalar(self.left_key_index, row);
            let matches = if key_bytes(&value, &mut key) {
                self.table.get(&key).map(Vec::len).unwrap_or(0)
            } else {
                0
            };
            total += if matches == 0 {
                usize::from(self.config.join_type == JoinType::Left)
            } else {
                matches
            };
        }
        if total == 0 {
            return Ok(OperatorResult::empty());
        }

        let dictionary = match chunk.dictionary() {
            Some(dict) => Some(dict.clone()),
            None => self
                .schema
                .columns()
                .iter()
                .any(|def| def.dtype.kind == DTypeKind::Str)
                .then(new_dictionary),
        };
        let mut columns = self.alloc_columns(total)?;

        for row in 0..rows {
            let value = chunk.get_scalar(self.left_key_index, row);
            let matches: &[(u32, u32)] = if key_bytes(&value, &mut key) {
                self.table.get(&key).map(Vec::as_slice).unwrap_or(&[])
            } else {
                &[]
            };

            if matches.is_empty() {
                if self.config.join_type == JoinType::Left {
                    for (column, buffer) in
                        columns.iter_mut().enumerate().take(self.left_width)
                    {
                        chunk.copy_value_into(
                            column,
                            row,
                            buffer,
                            dictionary.as_ref(),
                        )?;
                    }
                    for buffer in columns.iter_mut().skip(self.left_width) {
                        buffer.append_null()?;
                    }
                }
                continue;
            }

            for &(right_chunk, right_row) in matches {
                for (column, buffer) in
                    columns.iter_mut().enumerate().take(self.left_width)
                {
                    chunk.copy_value_into(
                        column,
                        row,
                        buffer,
                        dictionary.as_ref(),
                    )?;
                }
                let source = &self.right_chunks[right_chunk as usize];
                for (kept, buffer) in self
                    .right_kept
                    .iter()
                    .zip(columns.iter_mut().skip(self.left_width))
                {
                    source.copy_value_into(
                        *kept,
                        right_row as usize,
                        buffer,
                        dictionary.as_ref(),
                    )?;
                }
                if self.config.join_type == JoinType::Right {
                    self.right_matched[right_chunk as usize]
                        [right_row as usize] = true;
                }
            }
        }

        let out = Chunk::new(Arc::clone(&self.schema), columns, dictionary)?;
        Ok(OperatorResult::with_chunk(out))
    }

    fn finish(&mut self) -> Result<OperatorResult> {
        if self.config.join_type != JoinType::Right {
            return Ok(OperatorResult::empty());
        }

        let total: usize = self
            .right_matched
            .iter()
            .map(|flags| flags.iter().filter(|&&m| !m).count())
            .sum();
        if total == 0 {
            return Ok(OperatorResult::empty());
        }

        // The unmatched pass has no left chunk to borrow a dictionary
        // from; it owns a fresh one.
        let dictionary = self
            .schema
            .columns()
            .iter()
            .any(|def| def.dtype.kind == DTypeKind::Str)
            .then(new_dictionary);
        let mut columns = self.alloc_columns(total)?;

        for (chunk_index, chunk) in self.right_chunks.iter().enumerate() {
            for row in 0..chunk.row_count() {
                if self.right_matched[chunk_index][row] {
                    continue;
                }
                for buffer in columns.iter_mut().take(self.left_width) {
                    buffer.append_null()?;
                }
                for (kept, buffer) in self
                    .right_kept
                    .iter()
                    .zip(columns.iter_mut().skip(self.left_width))
                {
                    chunk.copy_value_into(
                        *kept,
                        row,
                        buffer,
                        dictionary.as_ref(),
                    )?;
                }
            }
        }

        let out = Chunk::new(Arc::clone(&self.schema), columns, dictionary)?;
        Ok(OperatorResult::with_chunk(out))
    }

    fn reset(&mut self) {
        for flags in &mut self.right_matched {
            flags.fill(false);
        }
    }
}
