//! # Relational operators
//!
//! Operators are chunk-in/chunk-out pipeline stages implementing
//! [`Operator`]:
//!
//! - [`process`](Operator::process) transforms one input chunk. The
//!   [`OperatorResult`] carries an optional output chunk (`None` is the
//!   legal "buffering, nothing yet" signal) and a `done` flag telling
//!   the executor to stop feeding input.
//! - [`finish`](Operator::finish) runs once after input ends; buffering
//!   operators (Sort, Aggregate, GroupBy, the Right-join unmatched pass)
//!   emit their accumulated result here.
//! - [`reset`](Operator::reset) clears operator-local state so the
//!   operator can run another pass.
//!
//! Construction compiles expressions and resolves column names against
//! the input schema; a pipeline cannot be built unless every operator
//! constructs successfully.

pub mod aggregate;
pub mod filter;
pub mod group_by;
pub mod join;
pub mod limit;
pub mod project;
pub mod sort;
pub mod transform;

pub use aggregate::AggregateOperator;
pub use filter::FilterOperator;
pub use group_by::GroupByOperator;
pub use join::{HashJoinConfig, HashJoinOperator, JoinType};
pub use limit::LimitOperator;
pub use project::ProjectOperator;
pub use sort::{SortKey, SortOperator};
pub use transform::TransformOperator;

use crate::chunk::Chunk;
use crate::schema::SchemaRef;
use crate::Result;

/// The outcome of one operator step.
pub struct OperatorResult {
    /// The emitted chunk, absent when the operator buffered or dropped
    /// all input.
    pub chunk: Option<Chunk>,
    /// When set, the operator needs no further input.
    pub done: bool,
}

impl OperatorResult {
    /// Nothing emitted, more input welcome.
    pub fn empty() -> Self {
        Self { chunk: None, done: false }
    }

    /// A chunk emitted, more input welcome.
    pub fn with_chunk(chunk: Chunk) -> Self {
        Self { chunk: Some(chunk), done: false }
    }

    /// A final emission; the operator needs no further input.
    pub fn finished(chunk: Option<Chunk>) -> Self {
        Self { chunk, done: true }
    }
}

/// A pipeline stage.
pub trait Operator: Send {
    /// Operator name, for diagnostics.
    fn name(&self) -> &str;

    /// The schema this operator resolved its columns against; chunks
    /// fed to [`process`](Operator::process) must match it exactly.
    fn input_schema(&self) -> &SchemaRef;

    /// The schema of every chunk this operator emits.
    fn output_schema(&self) -> &SchemaRef;

    /// Transform one input chunk.
    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult>;

    /// Called once after input is exhausted.
    fn finish(&mut self) -> Result<OperatorResult> {
        Ok(OperatorResult::empty())
    }

    /// Clear operator-local state.
    fn reset(&mut self);
}
