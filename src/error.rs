//! Error types for the columnar engine.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, Error>`.
//!
//! Every [`Error`] variant maps to a stable numeric [`ErrorCode`] in a
//! closed enumeration; the human-readable message for a code is available
//! through [`ErrorCode::message`]. Construction- and compile-time failures
//! (bad schemas, unknown columns, incompatible operand types) are surfaced
//! immediately, while runtime arithmetic and cast mishaps with a natural
//! null representation (division by zero, unparseable string→number,
//! out-of-range cast) degrade to null instead of failing the pipeline.

use thiserror::Error;

/// Errors that can occur when building or executing a pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// An append exceeded the buffer's fixed capacity.
    #[error("Buffer full: capacity {capacity} exhausted")]
    BufferFull {
        /// The fixed capacity of the buffer.
        capacity: usize,
    },

    /// A buffer was created with a zero or otherwise unusable capacity.
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(usize),

    /// A row or selection index was outside the valid range.
    #[error("Invalid offset: index {index} out of range {len}")]
    InvalidOffset {
        /// The offending index.
        index: usize,
        /// The number of addressable slots.
        len: usize,
    },

    /// A write exceeded the available buffer storage.
    #[error("Buffer overflow")]
    BufferOverflow,

    /// A schema was declared with no columns.
    #[error("Empty schema")]
    EmptySchema,

    /// A column name was not found in the schema.
    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),

    /// Two columns in one schema share a name.
    #[error("Duplicate column: '{0}'")]
    DuplicateColumn(String),

    /// A column name does not match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("Invalid column name: '{0}'")]
    InvalidColumnName(String),

    /// A value's type does not match the column or operand it is used with.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The type that was expected.
        expected: String,
        /// The type that was received.
        actual: String,
    },

    /// Two chunks or schemas that must agree do not.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// An expression is structurally invalid for the requested use.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// An expression referenced a column the schema does not contain.
    #[error("Column not found: '{0}'")]
    ColumnNotFound(String),

    /// Operand types cannot be combined by the requested operation.
    #[error("Incompatible types: {left} and {right}")]
    TypeIncompatible {
        /// The left operand's type name.
        left: String,
        /// The right operand's type name.
        right: String,
    },

    /// An operand has a type the operation cannot accept at all.
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Division by zero. Reserved: runtime arithmetic returns null instead,
    /// so this code is never produced by the engine itself.
    #[error("Division by zero")]
    DivisionByZero,

    /// An aggregation was constructed over an unsupported expression shape.
    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    /// No conversion exists between the requested pair of data kinds.
    #[error("Cast not supported: {from} -> {to}")]
    CastNotSupported {
        /// The source data kind name.
        from: &'static str,
        /// The target data kind name.
        to: &'static str,
    },

    /// A cast target cannot represent the value. Reserved: runtime casts
    /// degrade to null instead.
    #[error("Cast overflow")]
    CastOverflow,

    /// A fill-null constant does not match the column's data kind.
    #[error("Invalid fill value: {0}")]
    InvalidFillValue(String),

    /// A pipeline was constructed with no operators.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Pipeline execution failed mid-stream.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// An operation that requires input received none.
    #[error("Empty input")]
    EmptyInput,
}

/// Stable numeric codes for every [`Error`] variant.
///
/// The enumeration is closed: every error the engine can produce has
/// exactly one code here, grouped by category (buffer 1xx, schema 2xx,
/// expression 3xx, cast/fill 4xx, pipeline 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Append past fixed capacity.
    BufferFull = 100,
    /// Zero or unusable capacity.
    InvalidCapacity = 101,
    /// Index outside the valid range.
    InvalidOffset = 102,
    /// Write past available storage.
    BufferOverflow = 103,
    /// Schema with no columns.
    EmptySchema = 200,
    /// Column name not in schema.
    UnknownColumn = 201,
    /// Duplicate column name.
    DuplicateColumn = 202,
    /// Malformed column name.
    InvalidColumnName = 203,
    /// Value/column type disagreement.
    TypeMismatch = 204,
    /// Chunk/schema disagreement.
    SchemaMismatch = 205,
    /// Structurally invalid expression.
    InvalidExpression = 300,
    /// Expression references a missing column.
    ColumnNotFound = 301,
    /// Operand types cannot be combined.
    TypeIncompatible = 302,
    /// Operand type unusable by the operation.
    InvalidOperand = 303,
    /// Division by zero (reserved; runtime yields null).
    DivisionByZero = 304,
    /// Unsupported aggregation shape.
    InvalidAggregation = 305,
    /// No conversion between the kinds.
    CastNotSupported = 400,
    /// Target cannot represent the value (reserved; runtime yields null).
    CastOverflow = 401,
    /// Fill constant of the wrong kind.
    InvalidFillValue = 402,
    /// Pipeline with no operators.
    InvalidPipeline = 500,
    /// Execution failed mid-stream.
    ExecutionFailed = 501,
    /// Operation requires input, got none.
    EmptyInput = 502,
}

impl ErrorCode {
    /// Returns the canonical message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::BufferFull => "buffer capacity exhausted",
            ErrorCode::InvalidCapacity => "invalid buffer capacity",
            ErrorCode::InvalidOffset => "index out of range",
            ErrorCode::BufferOverflow => "buffer overflow",
            ErrorCode::EmptySchema => "schema has no columns",
            ErrorCode::UnknownColumn => "unknown column",
            ErrorCode::DuplicateColumn => "duplicate column name",
            ErrorCode::InvalidColumnName => "invalid column name",
            ErrorCode::TypeMismatch => "type mismatch",
            ErrorCode::SchemaMismatch => "schema mismatch",
            ErrorCode::InvalidExpression => "invalid expression",
            ErrorCode::ColumnNotFound => "column not found",
            ErrorCode::TypeIncompatible => "incompatible operand types",
            ErrorCode::InvalidOperand => "invalid operand",
            ErrorCode::DivisionByZero => "division by zero",
            ErrorCode::InvalidAggregation => "invalid aggregation",
            ErrorCode::CastNotSupported => "cast not supported",
            ErrorCode::CastOverflow => "cast overflow",
            ErrorCode::InvalidFillValue => "invalid fill value",
            ErrorCode::InvalidPipeline => "invalid pipeline",
            ErrorCode::ExecutionFailed => "execution failed",
            ErrorCode::EmptyInput => "empty input",
        }
    }
}

impl Error {
    /// Returns the stable numeric code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::BufferFull { .. } => ErrorCode::BufferFull,
            Error::InvalidCapacity(_) => ErrorCode::InvalidCapacity,
            Error::InvalidOffset { .. } => ErrorCode::InvalidOffset,
            Error::BufferOverflow => ErrorCode::BufferOverflow,
            Error::EmptySchema => ErrorCode::EmptySchema,
            Error::UnknownColumn(_) => ErrorCode::UnknownColumn,
            Error::DuplicateColumn(_) => ErrorCode::DuplicateColumn,
            Error::InvalidColumnName(_) => ErrorCode::InvalidColumnName,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::SchemaMismatch(_) => ErrorCode::SchemaMismatch,
            Error::InvalidExpression(_) => ErrorCode::InvalidExpression,
            Error::ColumnNotFound(_) => ErrorCode::ColumnNotFound,
            Error::TypeIncompatible { .. } => ErrorCode::TypeIncompatible,
            Error::InvalidOperand(_) => ErrorCode::InvalidOperand,
            Error::DivisionByZero => ErrorCode::DivisionByZero,
            Error::InvalidAggregation(_) => ErrorCode::InvalidAggregation,
            Error::CastNotSupported { .. } => ErrorCode::CastNotSupported,
            Error::CastOverflow => ErrorCode::CastOverflow,
            Error::InvalidFillValue(_) => ErrorCode::InvalidFillValue,
            Error::InvalidPipeline(_) => ErrorCode::InvalidPipeline,
            Error::ExecutionFailed(_) => ErrorCode::ExecutionFailed,
            Error::EmptyInput => ErrorCode::EmptyInput,
        }
    }
}

/// A type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
