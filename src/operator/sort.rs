//! Sort operator.

use super::{Operator, OperatorResult};
use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::schema::SchemaRef;
use crate::types::Scalar;
use crate::Result;
use std::cmp::Ordering;
use std::sync::Arc;

/// One sort key.
#[derive(Debug, Clone)]
pub struct SortKey {
    /// Key column name.
    pub column: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
    /// Place nulls before non-nulls.
    pub nulls_first: bool,
}

impl SortKey {
    /// Ascending key with nulls last.
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: false, nulls_first: false }
    }

    /// Descending key with nulls last.
    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: true, nulls_first: false }
    }

    /// Place nulls before non-nulls.
    pub fn nulls_first(mut self) -> Self {
        self.nulls_first = true;
        self
    }
}

/// Buffers all input, then emits one chunk in sorted order.
///
/// `finish` builds `(chunk, row)` pairs over every buffered row,
/// stable-sorts them with a comparator derived from the key list, and
/// copies rows into fresh buffers. String keys compare
/// byte-lexicographically; numbers numerically; null against null is a
/// tie and one-sided nulls order by `nulls_first`.
pub struct SortOperator {
    keys: Vec<(usize, bool, bool)>,
    schema: SchemaRef,
    buffered: Vec<Chunk>,
}

impl SortOperator {
    /// Resolve the key columns against the input schema.
    pub fn new(keys: Vec<SortKey>, input_schema: SchemaRef) -> Result<Self> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in &keys {
            let index = input_schema.resolve(&key.column)?;
            resolved.push((index, key.descending, key.nulls_first));
        }
        Ok(Self { keys: resolved, schema: input_schema, buffered: Vec::new() })
    }
}

fn compare_key(
    a: &Scalar,
    b: &Scalar,
    descending: bool,
    nulls_first: bool,
) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if nulls_first {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, true) => {
            if nulls_first {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, false) => {
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

impl Operator for SortOperator {
    fn name(&self) -> &str {
        "sort"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        self.buffered.push(chunk);
        Ok(OperatorResult::empty())
    }

    fn finish(&mut self) -> Result<OperatorResult> {
        if self.buffered.is_empty() {
            return Ok(OperatorResult::finished(None));
        }

        // Materialize key values up front so the comparator never
        // touches the dictionary.
        let mut key_values: Vec<Vec<Vec<Scalar>>> =
            Vec::with_capacity(self.keys.len());
        for &(column, _, _) in &self.keys {
            let per_chunk: Vec<Vec<Scalar>> = self
                .buffered
                .iter()
                .map(|chunk| {
                    (0..chunk.row_count())
                        .map(|row| chunk.get_scalar(column, row))
                        .collect()
                })
                .collect();
            key_values.push(per_chunk);
        }

        let mut pairs: Vec<(u32, u32)> = Vec::new();
        for (chunk_index, chunk) in self.buffered.iter().enumerate() {
            for row in 0..chunk.row_count() {
                pairs.push((chunk_index as u32, row as u32));
            }
        }

        pairs.sort_by(|&(ac, ar), &(bc, br)| {
            for (k, &(_, descending, nulls_first)) in
                self.keys.iter().enumerate()
            {
                let a = &key_values[k][ac as usize][ar as usize];
                let b = &key_values[k][bc as usize][br as usize];
                let ordering = compare_key(a, b, descending, nulls_first);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let total = pairs.len();
        let dictionary = self
            .buffered
            .iter()
            .find_map(|chunk| chunk.dictionary().cloned());
        let mut columns = Vec::with_capacity(self.schema.len());
        for (index, def) in self.schema.columns().iter().enumerate() {
            let mut out = ColumnBuffer::new(def.dtype, total.max(1))?;
            for &(chunk_index, row) in &pairs {
                self.buffered[chunk_index as usize].copy_value_into(
                    index,
                    row as usize,
                    &mut out,
                    dictionary.as_ref(),
                )?;
            }
            columns.push(out);
        }

        let chunk =
            Chunk::new(Arc::clone(&self.schema), columns, dictionary)?;
        self.buffered.clear();
        Ok(OperatorResult::finished(Some(chunk)))
    }

    fn reset(&mut self) {
        self.buffered.clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::types::DType;

    fn chunk_ab(rows: &[(Option<i64>, Option<i64>)]) -> Chunk {
        let schema = Arc::new(
            Schema::new(vec![
                ("a", DType::int64().nullable()),
                ("b", DType::int64().nullable()),
            ])
            .unwrap(),
        );
        let mut a =
            ColumnBuffer::new(DType::int64().nullable(), rows.len().max(1))
                .unwrap();
        let mut b =
            ColumnBuffer::new(DType::int64().nullable(), rows.len().max(1))
                .unwrap();
        for &(x, y) in rows {
            match x {
                Some(v) => a.append(Scalar::Int(v)).unwrap(),
                None => a.append_null().unwrap(),
            }
            match y {
                Some(v) => b.append(Scalar::Int(v)).unwrap(),
                None => b.append_null().unwrap(),
            }
        }
        Chunk::new(schema, vec![a, b], None).unwrap()
    }

    fn column(chunk: &Chunk, index: usize) -> Vec<Option<i64>> {
        (0..chunk.row_count())
            .map(|row| match chunk.get_value(index, row) {
                Scalar::Int(v) => Some(v),
                Scalar::Null => None,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_single_key_ascending() {
        let chunk = chunk_ab(&[
            (Some(3), Some(1)),
            (Some(1), Some(2)),
            (Some(2), Some(3)),
        ]);
        let schema = chunk.schema().clone();
        let mut op =
            SortOperator::new(vec![SortKey::asc("a")], schema).unwrap();
        op.process(chunk).unwrap();
        let result = op.finish().unwrap();
        assert!(result.done);
        let out = result.chunk.unwrap();
        assert_eq!(column(&out, 0), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(column(&out, 1), vec![Some(2), Some(3), Some(1)]);
    }

    #[test]
    fn test_multi_key_with_nulls() {
        let chunk = chunk_ab(&[
            (Some(1), Some(10)),
            (None, Some(5)),
            (Some(1), Some(5)),
            (Some(2), None),
        ]);
        let schema = chunk.schema().clone();
        let mut op = SortOperator::new(
            vec![SortKey::asc("a").nulls_first(), SortKey::desc("b")],
            schema,
        )
        .unwrap();
        op.process(chunk).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(
            column(&out, 0),
            vec![None, Some(1), Some(1), Some(2)]
        );
        assert_eq!(
            column(&out, 1),
            vec![Some(5), Some(10), Some(5), None]
        );
    }

    #[test]
    fn test_sort_collapses_chunks() {
        let schema = chunk_ab(&[]).schema().clone();
        let mut op =
            SortOperator::new(vec![SortKey::asc("a")], schema).unwrap();
        op.process(chunk_ab(&[(Some(5), Some(1)), (Some(1), Some(2))]))
            .unwrap();
        op.process(chunk_ab(&[(Some(3), Some(3))])).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(column(&out, 0), vec![Some(1), Some(3), Some(5)]);
    }

    #[test]
    fn test_stability_on_all_null_key() {
        // Every key value null: nulls tie, so input order is preserved.
        let chunk = chunk_ab(&[
            (None, Some(1)),
            (None, Some(2)),
            (None, Some(3)),
        ]);
        let schema = chunk.schema().clone();
        let mut op = SortOperator::new(
            vec![SortKey::asc("a").nulls_first()],
            schema,
        )
        .unwrap();
        op.process(chunk).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(column(&out, 1), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_finish_on_empty_input() {
        let schema = chunk_ab(&[]).schema().clone();
        let mut op =
            SortOperator::new(vec![SortKey::asc("a")], schema).unwrap();
        let result = op.finish().unwrap();
        assert!(result.chunk.is_none());
    }

    #[test]
    fn test_honors_selection_vectors() {
        let mut chunk = chunk_ab(&[
            (Some(9), Some(1)),
            (Some(1), Some(2)),
            (Some(5), Some(3)),
        ]);
        chunk.set_selection(vec![0, 2]).unwrap();
        let schema = chunk.schema().clone();
        let mut op =
            SortOperator::new(vec![SortKey::asc("a")], schema).unwrap();
        op.process(chunk).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(column(&out, 0), vec![Some(5), Some(9)]);
    }
}
