//! Limit operator.

use super::{Operator, OperatorResult};
use crate::chunk::Chunk;
use crate::schema::SchemaRef;
use crate::Result;

/// Skips `offset` rows, then passes at most `count` rows.
///
/// Partial chunks are expressed as selection vectors over the input.
/// Once the quota is reached the final chunk is emitted with
/// `done = true` so upstream producers can stop.
pub struct LimitOperator {
    count: usize,
    offset: usize,
    skipped: usize,
    passed: usize,
    schema: SchemaRef,
}

impl LimitOperator {
    /// Pass `count` rows after skipping `offset`.
    pub fn new(count: usize, offset: usize, input_schema: SchemaRef) -> Self {
        Self { count, offset, skipped: 0, passed: 0, schema: input_schema }
    }
}

impl Operator for LimitOperator {
    fn name(&self) -> &str {
        "limit"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, mut chunk: Chunk) -> Result<OperatorResult> {
        let rows = chunk.row_count();
        if self.count == 0 {
            // Nothing will ever pass; signal done on the first non-empty
            // chunk.
            return if rows > 0 {
                Ok(OperatorResult::finished(None))
            } else {
                Ok(OperatorResult::empty())
            };
        }
        if self.passed >= self.count {
            return Ok(OperatorResult::finished(None));
        }

        let skip = (self.offset - self.skipped).min(rows);
        self.skipped += skip;
        let available = rows - skip;
        if available == 0 {
            return Ok(OperatorResult::empty());
        }

        let take = (self.count - self.passed).min(available);
        self.passed += take;
        let done = self.passed == self.count;

        if skip == 0 && take == rows {
            return Ok(OperatorResult { chunk: Some(chunk), done });
        }

        let selection: Vec<u32> = (skip..skip + take)
            .map(|row| chunk.resolve_row(row) as u32)
            .collect();
        chunk.set_selection(selection)?;
        Ok(OperatorResult { chunk: Some(chunk), done })
    }

    fn reset(&mut self) {
        self.skipped = 0;
        self.passed = 0;
    }
}
