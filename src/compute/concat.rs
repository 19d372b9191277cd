//! Vertical chunk concatenation.
//!
//! [`concat_chunks`] stacks chunks that share a schema into one chunk.
//! The first chunk's dictionary is retained; string values arriving from
//! chunks with a different dictionary are re-interned into it. Selection
//! vectors are honored — only the selected rows of each input land in
//! the output.

use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::{Error, Result};
use std::sync::Arc;

/// Vertically concatenate chunks sharing one schema.
pub fn concat_chunks(chunks: &[Chunk]) -> Result<Chunk> {
    let first = chunks.first().ok_or(Error::EmptyInput)?;
    let schema = Arc::clone(first.schema());
    for chunk in &chunks[1..] {
        if !schema.matches(chunk.schema()) {
            return Err(Error::SchemaMismatch(
                "concatenated chunks must share a schema".to_string(),
            ));
        }
    }

    let total_rows: usize = chunks.iter().map(Chunk::row_count).sum();
    let dictionary = first.dictionary().cloned();

    let mut columns = Vec::with_capacity(schema.len());
    for (index, def) in schema.columns().iter().enumerate() {
        let mut out = ColumnBuffer::new(def.dtype, total_rows.max(1))?;
        for chunk in chunks {
            for row in 0..chunk.row_count() {
                chunk.copy_value_into(
                    index,
                    row,
                    &mut out,
                    dictionary.as_ref(),
                )?;
            }
        }
        columns.push(out);
    }

    Chunk::new(schema, columns, dictionary)
}
