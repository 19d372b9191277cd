//! Projection / rename operator.

use super::{Operator, OperatorResult};
use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::schema::{Schema, SchemaRef};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Reorders, subsets and renames columns.
///
/// Built from ordered `(source, target)` pairs; a `None` target keeps
/// the source name. The emitted chunk shares the input dictionary and
/// selection vector — only the column array and schema change.
#[derive(Debug)]
pub struct ProjectOperator {
    sources: Vec<usize>,
    input_schema: SchemaRef,
    schema: SchemaRef,
}

impl ProjectOperator {
    /// Validate sources and targets against the input schema.
    pub fn new(
        columns: Vec<(String, Option<String>)>,
        input_schema: &SchemaRef,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::EmptySchema);
        }
        let mut sources = Vec::with_capacity(columns.len());
        let mut targets = HashSet::new();
        let mut defs = Vec::with_capacity(columns.len());
        for (source, target) in columns {
            let index = input_schema.resolve(&source)?;
            let name = target.unwrap_or_else(|| source.clone());
            if !targets.insert(name.clone()) {
                return Err(Error::DuplicateColumn(name));
            }
            defs.push((name, input_schema.columns()[index].dtype));
            sources.push(index);
        }
        let schema = Arc::new(Schema::new(defs)?);
        Ok(Self { sources, input_schema: Arc::clone(input_schema), schema })
    }
}

impl Operator for ProjectOperator {
    fn name(&self) -> &str {
        "project"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.input_schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        let selection = chunk.selection().map(<[u32]>::to_vec);
        let (_, columns, dictionary) = chunk.into_parts();

        // Move each buffer out on its last use; earlier uses clone.
        let mut remaining = vec![0usize; columns.len()];
        for &source in &self.sources {
            remaining[source] += 1;
        }
        let mut slots: Vec<Option<ColumnBuffer>> =
            columns.into_iter().map(Some).collect();
        let mut projected = Vec::with_capacity(self.sources.len());
        for &source in &self.sources {
            remaining[source] -= 1;
            let buffer = if remaining[source] == 0 {
                slots[source].take()
            } else {
                slots[source].clone()
            };
            projected.push(buffer.ok_or(Error::InvalidOffset {
                index: source,
                len: slots.len(),
            })?);
        }

        let mut out =
            Chunk::new(Arc::clone(&self.schema), projected, dictionary)?;
        if let Some(selection) = selection {
            out.set_selection(selection)?;
        }
        Ok(OperatorResult::with_chunk(out))
    }

    fn reset(&mut self) {}
}
