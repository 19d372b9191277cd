//! Schemas: ordered, named, typed column layouts.
//!
//! A [`Schema`] is an ordered sequence of [`ColumnDef`]s plus a
//! name→index map for O(1) lookup. Names must be non-empty, unique, and
//! match `[A-Za-z_][A-Za-z0-9_]*`; a schema has at least one column. Each
//! definition carries a `row_offset`: the cumulative byte width of the
//! preceding columns, i.e. the field offset a row-oriented view of the
//! schema would use.

use crate::types::DType;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A single named, typed column in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub dtype: DType,
    /// Cumulative byte width of all preceding columns.
    pub row_offset: usize,
}

/// An ordered set of named, typed columns.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    index: HashMap<String, usize>,
    row_width: usize,
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Schema {
    /// Build a schema from `(name, dtype)` pairs.
    ///
    /// Validates that the list is non-empty, every name is well-formed and
    /// no name repeats, and assigns row offsets from the cumulative element
    /// widths.
    pub fn new<S: Into<String>>(columns: Vec<(S, DType)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::EmptySchema);
        }

        let mut defs = Vec::with_capacity(columns.len());
        let mut index = HashMap::with_capacity(columns.len());
        let mut offset = 0usize;

        for (name, dtype) in columns {
            let name = name.into();
            if !valid_name(&name) {
                return Err(Error::InvalidColumnName(name));
            }
            if index.contains_key(&name) {
                return Err(Error::DuplicateColumn(name));
            }
            index.insert(name.clone(), defs.len());
            defs.push(ColumnDef { name, dtype, row_offset: offset });
            offset += dtype.kind.size_bytes();
        }

        Ok(Self { columns: defs, index, row_width: offset })
    }

    /// Build a schema directly from column definitions, revalidating names
    /// and recomputing offsets.
    pub fn from_defs(defs: Vec<ColumnDef>) -> Result<Self> {
        Self::new(defs.into_iter().map(|d| (d.name, d.dtype)).collect())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// A schema is never empty once constructed; this exists for symmetry.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The ordered column definitions.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column definition at `index`.
    pub fn column(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.get(index)
    }

    /// Index of the column with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Index of the column with the given name, or `UnknownColumn`.
    pub fn resolve(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Total byte width of one row across all columns.
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Structural equality check: same names, kinds and nullability in the
    /// same order.
    pub fn matches(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.name == b.name && a.dtype == b.dtype)
    }
}

/// Shared schema handle: schemas are immutable once built and cheaply
/// cloned between chunks and operators.
pub type SchemaRef = Arc<Schema>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_schema_basic() {
        let schema = Schema::new(vec![
            ("id", DType::int32()),
            ("name", DType::string()),
            ("score", DType::float64().nullable()),
        ])
        .unwrap();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("name"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert_eq!(schema.column(2).unwrap().dtype, DType::float64().nullable());
    }

    #[test]
    fn test_row_offsets_are_cumulative() {
        let schema = Schema::new(vec![
            ("a", DType::int8()),
            ("b", DType::int32()),
            ("c", DType::timestamp()),
        ])
        .unwrap();

        assert_eq!(schema.column(0).unwrap().row_offset, 0);
        assert_eq!(schema.column(1).unwrap().row_offset, 1);
        assert_eq!(schema.column(2).unwrap().row_offset, 5);
        assert_eq!(schema.row_width(), 13);
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = Schema::new(Vec::<(&str, DType)>::new()).unwrap_err();
        assert!(matches!(err, Error::EmptySchema));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Schema::new(vec![
            ("x", DType::int32()),
            ("x", DType::int64()),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(_)));
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "1abc", "a-b", "a b", "é"] {
            let err = Schema::new(vec![(bad, DType::int32())]).unwrap_err();
            assert!(
                matches!(err, Error::InvalidColumnName(_)),
                "expected rejection for {:?}",
                bad
            );
        }
        // Leading underscore and digits after the first char are fine.
        assert!(Schema::new(vec![("_x1", DType::int32())]).is_ok());
    }

    #[test]
    fn test_schema_matches() {
        let a = Schema::new(vec![("x", DType::int32())]).unwrap();
        let b = Schema::new(vec![("x", DType::int32())]).unwrap();
        let c = Schema::new(vec![("x", DType::int64())]).unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
