//! Transform operator: compute new columns.

use super::{Operator, OperatorResult};
use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::compute::append_scalar;
use crate::dictionary::new_dictionary;
use crate::expr::{compile_value, CompiledValue, Expr};
use crate::schema::{Schema, SchemaRef};
use crate::types::DTypeKind;
use crate::Result;
use std::sync::Arc;

/// Appends computed columns to each chunk.
///
/// Each new column's expression is compiled against the progressively
/// growing schema, so later columns can reference earlier ones. Chunks
/// arriving with a selection vector are materialized first: computed
/// values are appended by dense position and must line up with the
/// stored rows.
pub struct TransformOperator {
    columns: Vec<(String, CompiledValue)>,
    input_schema: SchemaRef,
    schema: SchemaRef,
}

impl TransformOperator {
    /// Compile `(name, expression)` pairs against the input schema.
    pub fn new(
        columns: Vec<(String, Expr)>,
        input_schema: &SchemaRef,
    ) -> Result<Self> {
        let mut defs: Vec<(String, _)> = input_schema
            .columns()
            .iter()
            .map(|def| (def.name.clone(), def.dtype))
            .collect();
        let mut compiled = Vec::with_capacity(columns.len());
        let mut current = Schema::new(defs.clone())?;
        for (name, expr) in columns {
            let value = compile_value(&expr, &current)?;
            defs.push((name.clone(), value.dtype()));
            current = Schema::new(defs.clone())?;
            compiled.push((name, value));
        }
        Ok(Self {
            columns: compiled,
            input_schema: Arc::clone(input_schema),
            schema: Arc::new(current),
        })
    }
}

impl Operator for TransformOperator {
    fn name(&self) -> &str {
        "transform"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.input_schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        let chunk = if chunk.selection().is_some() {
            chunk.materialize()?
        } else {
            chunk
        };
        let rows = chunk.row_count();

        // A string output column needs a dictionary even when the input
        // carried none.
        let needs_dict = self
            .columns
            .iter()
            .any(|(_, value)| value.dtype().kind == DTypeKind::Str);
        let dictionary = match chunk.dictionary() {
            Some(dict) => Some(dict.clone()),
            None if needs_dict => Some(new_dictionary()),
            None => None,
        };

        let mut appended = Vec::with_capacity(self.columns.len());
        for (_, value) in &self.columns {
            let mut buffer =
                ColumnBuffer::new(value.dtype(), rows.max(1))?;
            for row in 0..rows {
                let result = value.eval(&chunk, row);
                append_scalar(&mut buffer, &result, dictionary.as_ref())?;
            }
            appended.push(buffer);
        }

        let (_, mut columns, _) = chunk.into_parts();
        columns.extend(appended);
        let out = Chunk::new(Arc::clone(&self.schema), columns, dictionary)?;
        Ok(OperatorResult::with_chunk(out))
    }

    fn reset(&mut self) {}
}
