//! Full-table aggregation operator.

use super::{Operator, OperatorResult};
use crate::buffer::ColumnBuffer;
use crate::chunk::Chunk;
use crate::compute::append_scalar;
use crate::dictionary::new_dictionary;
use crate::expr::{compile_value, infer_type, AggOp, CompiledValue, Expr};
use crate::schema::{Schema, SchemaRef};
use crate::types::{DType, DTypeKind, Scalar};
use crate::{Error, Result};
use std::sync::Arc;

/// Accumulator state for one aggregation slot.
#[derive(Debug, Clone)]
pub(crate) enum AggState {
    /// Running float64 sum; null until a non-null value arrives.
    Sum { sum: f64, seen: bool },
    /// Sum and count for the mean.
    Avg { sum: f64, count: i64 },
    /// Count of non-null values.
    Count { count: i64 },
    /// Count of all rows.
    CountAll { count: i64 },
    /// Minimum, tracked in float64.
    Min { value: f64, seen: bool },
    /// Maximum, tracked in float64.
    Max { value: f64, seen: bool },
    /// First non-null value.
    First { value: Option<Scalar> },
    /// Last non-null value.
    Last { value: Option<Scalar> },
}

impl AggState {
    pub(crate) fn for_op(op: AggOp) -> Self {
        match op {
            AggOp::Sum => AggState::Sum { sum: 0.0, seen: false },
            AggOp::Avg => AggState::Avg { sum: 0.0, count: 0 },
            AggOp::Count => AggState::Count { count: 0 },
            AggOp::CountAll => AggState::CountAll { count: 0 },
            AggOp::Min => AggState::Min { value: f64::INFINITY, seen: false },
            AggOp::Max => {
                AggState::Max { value: f64::NEG_INFINITY, seen: false }
            }
            AggOp::First => AggState::First { value: None },
            AggOp::Last => AggState::Last { value: None },
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = match self {
            AggState::Sum { .. } => AggState::Sum { sum: 0.0, seen: false },
            AggState::Avg { .. } => AggState::Avg { sum: 0.0, count: 0 },
            AggState::Count { .. } => AggState::Count { count: 0 },
            AggState::CountAll { .. } => AggState::CountAll { count: 0 },
            AggState::Min { .. } => {
                AggState::Min { value: f64::INFINITY, seen: false }
            }
            AggState::Max { .. } => {
                AggState::Max { value: f64::NEG_INFINITY, seen: false }
            }
            AggState::First { .. } => AggState::First { value: None },
            AggState::Last { .. } => AggState::Last { value: None },
        };
    }

    pub(crate) fn accumulate(&mut self, value: &Scalar) {
        match self {
            AggState::Sum { sum, seen } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *seen = true;
                }
            }
            AggState::Avg { sum, count } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *count += 1;
                }
            }
            AggState::Count { count } => {
                if !value.is_null() {
                    *count += 1;
                }
            }
            AggState::CountAll { count } => *count += 1,
            AggState::Min { value: current, seen } => {
                if let Some(v) = value.as_f64() {
                    if v < *current {
                        *current = v;
                    }
                    *seen = true;
                }
            }
            AggState::Max { value: current, seen } => {
                if let Some(v) = value.as_f64() {
                    if v > *current {
                        *current = v;
                    }
                    *seen = true;
                }
            }
            AggState::First { value: current } => {
                if current.is_none() && !value.is_null() {
                    *current = Some(value.clone());
                }
            }
            AggState::Last { value: current } => {
                if !value.is_null() {
                    *current = Some(value.clone());
                }
            }
        }
    }

    pub(crate) fn result(&self) -> Scalar {
        match self {
            AggState::Sum { sum, seen } => {
                if *seen {
                    Scalar::Float(*sum)
                } else {
                    Scalar::Null
                }
            }
            AggState::Avg { sum, count } => {
                if *count > 0 {
                    Scalar::Float(*sum / *count as f64)
                } else {
                    Scalar::Null
                }
            }
            AggState::Count { count } => Scalar::Int(*count),
            AggState::CountAll { count } => Scalar::Int(*count),
            AggState::Min { value, seen } | AggState::Max { value, seen } => {
                if *seen {
                    Scalar::Float(*value)
                } else {
                    Scalar::Null
                }
            }
            AggState::First { value } | AggState::Last { value } => {
                value.clone().unwrap_or(Scalar::Null)
            }
        }
    }
}

#[derive(Debug)]
struct AggSlot {
    op: AggOp,
    input: Option<CompiledValue>,
    state: AggState,
}

/// Aggregates the whole input into one row.
///
/// Each `(output name, aggregation expression)` pair becomes one output
/// column; `process` accumulates and emits nothing, `finish` produces
/// the single-row result chunk.
#[derive(Debug)]
pub struct AggregateOperator {
    slots: Vec<AggSlot>,
    input_schema: SchemaRef,
    schema: SchemaRef,
}

/// Split an expression into its aggregation operator and inner input.
pub(crate) fn split_aggregation(
    expr: &Expr,
) -> Result<(AggOp, Option<&Expr>)> {
    match expr.unaliased() {
        Expr::Agg { op, expr } => Ok((*op, expr.as_deref())),
        other => Err(Error::InvalidAggregation(format!(
            "expected an aggregation expression, got {other:?}"
        ))),
    }
}

impl AggregateOperator {
    /// Compile `(output name, aggregation)` pairs against the input
    /// schema.
    pub fn new(
        aggregations: Vec<(String, Expr)>,
        input_schema: &SchemaRef,
    ) -> Result<Self> {
        if aggregations.is_empty() {
            return Err(Error::InvalidAggregation(
                "aggregate requires at least one aggregation".to_string(),
            ));
        }
        let mut slots = Vec::with_capacity(aggregations.len());
        let mut defs = Vec::with_capacity(aggregations.len());
        for (name, expr) in &aggregations {
            let (dtype, is_aggregate) = infer_type(expr, input_schema)?;
            if !is_aggregate {
                return Err(Error::InvalidAggregation(format!(
                    "'{name}' is not an aggregation"
                )));
            }
            let (op, inner) = split_aggregation(expr)?;
            let input = match inner {
                Some(inner) => Some(compile_value(inner, input_schema)?),
                None => None,
            };
            slots.push(AggSlot { op, input, state: AggState::for_op(op) });
            defs.push((name.clone(), dtype));
        }
        let schema = Arc::new(Schema::new(defs)?);
        Ok(Self { slots, input_schema: Arc::clone(input_schema), schema })
    }
}

impl Operator for AggregateOperator {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn input_schema(&self) -> &SchemaRef {
        &self.input_schema
    }

    fn output_schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn process(&mut self, chunk: Chunk) -> Result<OperatorResult> {
        let rows = chunk.row_count();
        for slot in &mut self.slots {
            match (&slot.input, slot.op) {
                (_, AggOp::CountAll) => {
                    for _ in 0..rows {
                        slot.state.accumulate(&Scalar::Int(0));
                    }
                }
                (Some(input), _) => {
                    for row in 0..rows {
                        let value = input.eval(&chunk, row);
                        slot.state.accumulate(&value);
                    }
                }
                (None, _) => {}
            }
        }
        Ok(OperatorResult::empty())
    }

    fn finish(&mut self) -> Result<OperatorResult> {
        let needs_dict = self
            .schema
            .columns()
            .iter()
            .any(|def| def.dtype.kind == DTypeKind::Str);
        let dictionary = needs_dict.then(new_dictionary);

        let mut columns = Vec::with_capacity(self.slots.len());
        for (slot, def) in self.slots.iter().zip(self.schema.columns()) {
            let mut buffer = ColumnBuffer::new(def.dtype, 1)?;
            append_scalar(
                &mut buffer,
                &slot.state.result(),
                dictionary.as_ref(),
            )?;
            columns.push(buffer);
        }
        let chunk =
            Chunk::new(Arc::clone(&self.schema), columns, dictionary)?;
        Ok(OperatorResult::finished(Some(chunk)))
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.state.reset();
        }
    }
}

/// Output dtype helper shared with the grouped variant.
pub(crate) fn aggregate_output_dtype(
    op: AggOp,
    input: Option<DType>,
) -> DType {
    match op {
        AggOp::Sum | AggOp::Avg => DType::float64().nullable(),
        AggOp::Count | AggOp::CountAll => DType::int64(),
        AggOp::Min | AggOp::Max | AggOp::First | AggOp::Last => {
            input.map(DType::nullable).unwrap_or_else(|| {
                DType::float64().nullable()
            })
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::expr::{avg, col, count, count_all, first, last, max, min, sum};

    fn sample_chunk() -> Chunk {
        let schema = Arc::new(
            Schema::new(vec![
                ("v", DType::int64().nullable()),
                ("w", DType::float64()),
            ])
            .unwrap(),
        );
        let mut v =
            ColumnBuffer::new(DType::int64().nullable(), 8).unwrap();
        let mut w = ColumnBuffer::new(DType::float64(), 8).unwrap();
        for value in [Some(1), None, Some(3), Some(6)] {
            match value {
                Some(x) => v.append(Scalar::Int(x)).unwrap(),
                None => v.append_null().unwrap(),
            }
        }
        for value in [0.5, 1.5, 2.5, 3.5] {
            w.append(Scalar::Float(value)).unwrap();
        }
        Chunk::new(schema, vec![v, w], None).unwrap()
    }

    #[test]
    fn test_sum_avg_count() {
        let chunk = sample_chunk();
        let input = chunk.schema().clone();
        let mut op = AggregateOperator::new(
            vec![
                ("s".to_string(), sum(col("v"))),
                ("a".to_string(), avg(col("v"))),
                ("c".to_string(), count(col("v"))),
                ("n".to_string(), count_all()),
            ],
            &input,
        )
        .unwrap();

        op.process(chunk).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.get_value(0, 0), Scalar::Float(10.0));
        assert_eq!(out.get_value(1, 0), Scalar::Float(10.0 / 3.0));
        assert_eq!(out.get_value(2, 0), Scalar::Int(3));
        assert_eq!(out.get_value(3, 0), Scalar::Int(4));
    }

    #[test]
    fn test_min_max_first_last() {
        let chunk = sample_chunk();
        let input = chunk.schema().clone();
        let mut op = AggregateOperator::new(
            vec![
                ("lo".to_string(), min(col("v"))),
                ("hi".to_string(), max(col("v"))),
                ("head".to_string(), first(col("v"))),
                ("tail".to_string(), last(col("v"))),
            ],
            &input,
        )
        .unwrap();

        op.process(chunk).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        // Min/Max carry the inner dtype.
        assert_eq!(out.get_value(0, 0), Scalar::Int(1));
        assert_eq!(out.get_value(1, 0), Scalar::Int(6));
        assert_eq!(out.get_value(2, 0), Scalar::Int(1));
        assert_eq!(out.get_value(3, 0), Scalar::Int(6));
    }

    #[test]
    fn test_empty_input_yields_nulls_and_zero_counts() {
        let input = sample_chunk().schema().clone();
        let mut op = AggregateOperator::new(
            vec![
                ("s".to_string(), sum(col("v"))),
                ("c".to_string(), count(col("v"))),
                ("n".to_string(), count_all()),
            ],
            &input,
        )
        .unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(out.row_count(), 1);
        assert!(out.is_null(0, 0));
        assert_eq!(out.get_value(1, 0), Scalar::Int(0));
        assert_eq!(out.get_value(2, 0), Scalar::Int(0));
    }

    #[test]
    fn test_accumulation_spans_chunks() {
        let input = sample_chunk().schema().clone();
        let mut op = AggregateOperator::new(
            vec![("s".to_string(), sum(col("w")))],
            &input,
        )
        .unwrap();
        op.process(sample_chunk()).unwrap();
        op.process(sample_chunk()).unwrap();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(out.get_value(0, 0), Scalar::Float(16.0));
    }

    #[test]
    fn test_non_aggregate_rejected() {
        let input = sample_chunk().schema().clone();
        let err = AggregateOperator::new(
            vec![("x".to_string(), col("v"))],
            &input,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAggregation(_)));
    }

    #[test]
    fn test_reset_clears_state() {
        let input = sample_chunk().schema().clone();
        let mut op = AggregateOperator::new(
            vec![("n".to_string(), count_all())],
            &input,
        )
        .unwrap();
        op.process(sample_chunk()).unwrap();
        op.reset();
        let out = op.finish().unwrap().chunk.unwrap();
        assert_eq!(out.get_value(0, 0), Scalar::Int(0));
    }
}
