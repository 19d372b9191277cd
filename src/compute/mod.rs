//! Column-level compute kernels.
//!
//! These are the chunk/column primitives the operators are built from:
//! the cast dispatch matrix, null filling and dropping, row
//! deduplication, dictionary-level string transforms and vertical
//! concatenation. They are exposed publicly as well — callers can apply
//! them directly without building a pipeline.

pub mod cast;
pub mod concat;
pub mod fill;
pub mod strings;
pub mod unique;

use crate::buffer::ColumnBuffer;
use crate::dictionary::DictionaryRef;
use crate::types::Scalar;
use crate::{Error, Result};

/// Append a scalar onto a buffer, interning strings into `dict`.
pub(crate) fn append_scalar(
    buffer: &mut ColumnBuffer,
    value: &Scalar,
    dict: Option<&DictionaryRef>,
) -> Result<()> {
    match value {
        Scalar::Null => buffer.append_null(),
        Scalar::Str(s) => {
            let dict = dict.ok_or_else(|| {
                Error::SchemaMismatch(
                    "string value without a dictionary".to_string(),
                )
            })?;
            let index = dict
                .write()
                .expect("dictionary lock poisoned")
                .intern_str(s);
            buffer.append_str_index(index)
        }
        other => buffer.append(other.clone()),
    }
}
