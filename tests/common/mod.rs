#![allow(dead_code)]
/// Common test helpers for integration tests
use columnar_engine::{
    new_dictionary, Chunk, ColumnBuffer, DType, DictionaryRef, Scalar,
    Schema, SchemaRef,
};
use std::sync::Arc;

/// A cell value used by the chunk builders.
#[derive(Clone, Debug)]
pub enum Cell {
    Null,
    I(i64),
    F(f64),
    B(bool),
    S(&'static str),
}

/// Build a schema from `(name, dtype)` pairs.
pub fn schema(columns: Vec<(&str, DType)>) -> SchemaRef {
    Arc::new(Schema::new(columns).expect("valid test schema"))
}

/// Build a chunk from a schema and row-major cell data, interning
/// strings into a fresh dictionary (or the one provided).
pub fn chunk_with_dict(
    schema: &SchemaRef,
    rows: &[Vec<Cell>],
    dict: Option<DictionaryRef>,
) -> Chunk {
    let capacity = rows.len().max(1);
    let needs_dict = schema
        .columns()
        .iter()
        .any(|def| def.dtype.kind == columnar_engine::DTypeKind::Str);
    let dict = match (dict, needs_dict) {
        (Some(dict), _) => Some(dict),
        (None, true) => Some(new_dictionary()),
        (None, false) => None,
    };

    let mut columns: Vec<ColumnBuffer> = schema
        .columns()
        .iter()
        .map(|def| {
            ColumnBuffer::new(def.dtype, capacity).expect("valid buffer")
        })
        .collect();

    for row in rows {
        assert_eq!(row.len(), schema.len(), "row width matches schema");
        for (cell, column) in row.iter().zip(columns.iter_mut()) {
            match cell {
                Cell::Null => column.append_null().expect("nullable column"),
                Cell::I(v) => {
                    column.append(Scalar::Int(*v)).expect("append int")
                }
                Cell::F(v) => {
                    column.append(Scalar::Float(*v)).expect("append float")
                }
                Cell::B(v) => {
                    column.append(Scalar::Bool(*v)).expect("append bool")
                }
                Cell::S(s) => {
                    let dict = dict.as_ref().expect("dictionary present");
                    let index = dict
                        .write()
                        .expect("dictionary lock")
                        .intern_str(s);
                    column.append_str_index(index).expect("append string");
                }
            }
        }
    }

    Chunk::new(Arc::clone(schema), columns, dict).expect("valid chunk")
}

/// Build a chunk with a fresh dictionary.
pub fn chunk(schema: &SchemaRef, rows: &[Vec<Cell>]) -> Chunk {
    chunk_with_dict(schema, rows, None)
}

/// Collect one column of a chunk as integer options.
pub fn int_column(chunk: &Chunk, column: usize) -> Vec<Option<i64>> {
    (0..chunk.row_count())
        .map(|row| match chunk.get_value(column, row) {
            Scalar::Null => None,
            Scalar::Int(v) => Some(v),
            other => panic!("expected int, got {other:?}"),
        })
        .collect()
}

/// Collect one column of a chunk as float options.
pub fn float_column(chunk: &Chunk, column: usize) -> Vec<Option<f64>> {
    (0..chunk.row_count())
        .map(|row| match chunk.get_value(column, row) {
            Scalar::Null => None,
            Scalar::Float(v) => Some(v),
            Scalar::Int(v) => Some(v as f64),
            other => panic!("expected float, got {other:?}"),
        })
        .collect()
}

/// Collect one column of a chunk as materialized strings.
pub fn string_column(chunk: &Chunk, column: usize) -> Vec<Option<String>> {
    (0..chunk.row_count())
        .map(|row| chunk.get_string_value(column, row))
        .collect()
}
