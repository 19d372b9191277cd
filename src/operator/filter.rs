//! Filter operator.

use super::{Operator, OperatorResult};
use crate::chunk::Chunk;
use crate::expr::{compile_predicate, CompiledPredicate, Expr};
use crate::schema::SchemaRef;
use crate::Result;

/// Keeps the rows matching a compiled predicate.
///
/// Matching row indices are collected into a reusable scratch buffer and
/// installed as the chunk's selection vector — no data is copied. Two
/// fast paths: zero matches emit nothing, and a full match on a chunk
/// with no prior selection passes the chunk through untouched.
#[derive(Debug)]
pub struct FilterOperator {
    predicate: CompiledPredicate,
    schema: SchemaRef,
    scratch: Vec<u32>,
}

impl FilterOperator {
    /// Compile `predicate` against the input schema.
    pub fn new(predicate: &Expr, input_schema: SchemaRef) -> Result<Self> {
        let compiled = compile_predicate(predicate, &input_schema)?;
        Ok(Self { predicate: compiled, schema: input_schema, scratch: Vec::new() })
    }
}

impl Operator for FilterOperator {
    fn name(&self) -> &str {
        "filter"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, mut chunk: Chunk) -> Result<OperatorResult> {
        let rows = chunk.row_count();
        self.scratch.clear();
        self.scratch.reserve(rows);
        for row in 0..rows {
            if self.predicate.eval(&chunk, row) {
                self.scratch.push(chunk.resolve_row(row) as u32);
            }
        }

        if self.scratch.is_empty() {
            return Ok(OperatorResult::empty());
        }
        if self.scratch.len() == rows && chunk.selection().is_none() {
            return Ok(OperatorResult::with_chunk(chunk));
        }
        chunk.set_selection(self.scratch.clone())?;
        Ok(OperatorResult::with_chunk(chunk))
    }

    fn reset(&mut self) {
        self.scratch.clear();
    }
}
