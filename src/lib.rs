//! # Columnar Engine
//!
//! An in-process columnar data-processing engine: tabular data lives in
//! cache-friendly typed column buffers, batched into chunks, and flows
//! through a composable pipeline of relational operators (filter,
//! project, transform, group-by, aggregate, sort, join, limit). The
//! target is analytical work on medium-to-large tabular inputs where
//! vectorized per-core throughput and predictable memory use matter.
//!
//! # Quick Start
//!
//! ```
//! use columnar_engine::{
//!     Chunk, ColumnBuffer, DType, Pipeline, Scalar, Schema,
//! };
//! use columnar_engine::expr::{col, lit};
//! use columnar_engine::operator::{FilterOperator, ProjectOperator};
//! use std::sync::Arc;
//!
//! # fn example() -> columnar_engine::Result<()> {
//! // Describe the input.
//! let schema = Arc::new(Schema::new(vec![
//!     ("id", DType::int32()),
//!     ("age", DType::int32()),
//! ])?);
//!
//! // Build one chunk of data.
//! let mut id = ColumnBuffer::new(DType::int32(), 4)?;
//! let mut age = ColumnBuffer::new(DType::int32(), 4)?;
//! for (i, a) in [(1, 25), (2, 30), (3, 22)] {
//!     id.append(Scalar::Int(i))?;
//!     age.append(Scalar::Int(a))?;
//! }
//! let chunk = Chunk::new(Arc::clone(&schema), vec![id, age], None)?;
//!
//! // filter(age > 23) then project(age).
//! let mut pipeline = Pipeline::new(vec![
//!     Box::new(FilterOperator::new(&col("age").gt(lit(23)), schema.clone())?),
//!     Box::new(ProjectOperator::new(
//!         vec![("age".to_string(), None)],
//!         &schema,
//!     )?),
//! ])?;
//!
//! let output = pipeline.execute(vec![chunk])?;
//! assert_eq!(output.stats.rows_out, 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Modules
//!
//! - [`types`] - data kinds, dtypes and runtime scalars
//! - [`schema`] - ordered, named, typed column layouts
//! - [`buffer`] - typed column buffers with null bitmaps
//! - [`dictionary`] - string interning (byte arena + FNV-1a hash index)
//! - [`chunk`] - column batches, selection vectors, materialization
//! - [`expr`] - expression AST, type inference and compilation
//! - [`compute`] - cast/fill/unique/string/concat kernels
//! - [`operator`] - the relational operator set
//! - [`pipeline`] - the chunk-streaming executor
//! - [`pool`] - optional buffer pooling
//! - [`options`] - engine configuration
//! - [`error`] - error types, codes and the `Result` alias

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(missing_docs)]

/// Typed column buffers with null bitmaps.
pub mod buffer;
/// Column batches, selection vectors and materialization.
pub mod chunk;
/// Column-level compute kernels (cast, fill, unique, strings, concat).
pub mod compute;
/// String interning dictionary.
pub mod dictionary;
/// Error types, numeric codes and the `Result` alias.
pub mod error;
/// Expression AST, type inference and compilation.
pub mod expr;
/// Engine configuration options.
pub mod options;
/// Chunk-streaming pipeline executor.
pub mod pipeline;
/// Optional buffer pooling.
pub mod pool;
/// Schemas: ordered, named, typed column layouts.
pub mod schema;
/// Data kinds, dtypes and runtime scalars.
pub mod types;
/// Relational operators.
pub mod operator;

pub use buffer::{ColumnBuffer, ColumnData, NullBitmap, NULL_INDEX};
pub use chunk::Chunk;
pub use dictionary::{new_dictionary, Dictionary, DictionaryRef};
pub use error::{Error, ErrorCode, Result};
pub use options::EngineOptions;
pub use pipeline::{
    CancelToken, ChunkSource, Pipeline, PipelineOutput, PipelineStats,
};
pub use pool::BufferPool;
pub use schema::{ColumnDef, Schema, SchemaRef};
pub use types::{DType, DTypeKind, Scalar};
