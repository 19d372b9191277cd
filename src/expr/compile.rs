//! Expression compilation.
//!
//! Compilation turns a validated [`Expr`] tree into a runnable form bound
//! to one schema: column names become captured column indices, literal
//! values are captured once, and every node is lowered into a tagged-enum
//! instruction tree walked by a small interpreter. Two entry points:
//!
//! - [`compile_value`] → [`CompiledValue`]: `(chunk, row) → Scalar`
//! - [`compile_predicate`] → [`CompiledPredicate`]: `(chunk, row) → bool`
//!
//! Runtime semantics collapse SQL's three-valued logic to `false`: a null
//! operand anywhere in a predicate makes the predicate false. Arithmetic
//! propagates null, and division or modulo by zero degrades to null
//! rather than failing the pipeline.

use super::{infer_type, ArithOp, CmpOp, Expr, StrOp};
use crate::chunk::Chunk;
use crate::compute::cast::cast_scalar;
use crate::schema::Schema;
use crate::types::{DType, DTypeKind, Scalar};
use crate::{Error, Result};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub(crate) enum ValueNode {
    Column { index: usize, kind: DTypeKind },
    Literal(Scalar),
    Arith { op: ArithOp, left: Box<ValueNode>, right: Box<ValueNode> },
    Neg(Box<ValueNode>),
    Cast { input: Box<ValueNode>, to: DTypeKind },
    Coalesce(Vec<ValueNode>),
    Pred(Box<PredNode>),
}

#[derive(Debug, Clone)]
pub(crate) enum PredNode {
    Cmp { op: CmpOp, left: ValueNode, right: ValueNode },
    Between { value: ValueNode, low: ValueNode, high: ValueNode },
    IsNullColumn { index: usize, negated: bool },
    IsNullExpr { value: ValueNode, negated: bool },
    And2(Box<PredNode>, Box<PredNode>),
    Or2(Box<PredNode>, Box<PredNode>),
    AndN(Vec<PredNode>),
    OrN(Vec<PredNode>),
    Not(Box<PredNode>),
    StrTest { index: usize, op: StrOp, pattern: String },
    BoolColumn { index: usize },
    Const(bool),
}

/// A compiled per-row value evaluator bound to one schema.
#[derive(Debug)]
pub struct CompiledValue {
    node: ValueNode,
    dtype: DType,
}

impl CompiledValue {
    /// The inferred result dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Evaluate at `(chunk, logical row)`.
    pub fn eval(&self, chunk: &Chunk, row: usize) -> Scalar {
        eval_value(&self.node, chunk, row)
    }
}

/// A compiled per-row predicate bound to one schema.
#[derive(Debug)]
pub struct CompiledPredicate {
    node: PredNode,
}

impl CompiledPredicate {
    /// Evaluate at `(chunk, logical row)`.
    pub fn eval(&self, chunk: &Chunk, row: usize) -> bool {
        eval_pred(&self.node, chunk, row)
    }
}

/// Compile an expression for value evaluation against `schema`.
pub fn compile_value(expr: &Expr, schema: &Schema) -> Result<CompiledValue> {
    let (dtype, is_aggregate) = infer_type(expr, schema)?;
    if is_aggregate {
        return Err(Error::InvalidExpression(
            "aggregate expression in a per-row value context".to_string(),
        ));
    }
    Ok(CompiledValue { node: lower_value(expr, schema)?, dtype })
}

/// Compile an expression for predicate evaluation against `schema`.
pub fn compile_predicate(
    expr: &Expr,
    schema: &Schema,
) -> Result<CompiledPredicate> {
    let (dtype, is_aggregate) = infer_type(expr, schema)?;
    if is_aggregate {
        return Err(Error::InvalidExpression(
            "aggregate expression in a predicate context".to_string(),
        ));
    }
    if dtype.kind != DTypeKind::Bool {
        return Err(Error::InvalidExpression(format!(
            "predicate must be boolean, got {}",
            dtype.name()
        )));
    }
    Ok(CompiledPredicate { node: lower_pred(expr, schema)? })
}

fn resolve_column(schema: &Schema, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
}

fn lower_value(expr: &Expr, schema: &Schema) -> Result<ValueNode> {
    Ok(match expr {
        Expr::Column(name) => {
            let index = resolve_column(schema, name)?;
            ValueNode::Column {
                index,
                kind: schema.columns()[index].dtype.kind,
            }
        }
        Expr::Literal { value, .. } => ValueNode::Literal(value.clone()),
        Expr::Arith { op, left, right } => ValueNode::Arith {
            op: *op,
            left: Box::new(lower_value(left, schema)?),
            right: Box::new(lower_value(right, schema)?),
        },
        Expr::Neg(inner) => {
            ValueNode::Neg(Box::new(lower_value(inner, schema)?))
        }
        Expr::Cast { expr, to } => ValueNode::Cast {
            input: Box::new(lower_value(expr, schema)?),
            to: to.kind,
        },
        Expr::Coalesce(operands) => ValueNode::Coalesce(
            operands
                .iter()
                .map(|operand| lower_value(operand, schema))
                .collect::<Result<_>>()?,
        ),
        Expr::Alias { expr, .. } => lower_value(expr, schema)?,
        Expr::Agg { .. } => {
            return Err(Error::InvalidExpression(
                "aggregate expression in a per-row value context"
                    .to_string(),
            ))
        }
        // Predicate-shaped expressions evaluate to a boolean value.
        predicate => ValueNode::Pred(Box::new(lower_pred(predicate, schema)?)),
    })
}

fn lower_pred(expr: &Expr, schema: &Schema) -> Result<PredNode> {
    Ok(match expr {
        Expr::Cmp { op, left, right } => PredNode::Cmp {
            op: *op,
            left: lower_value(left, schema)?,
            right: lower_value(right, schema)?,
        },
        Expr::Between { expr, low, high } => PredNode::Between {
            value: lower_value(expr, schema)?,
            low: lower_value(low, schema)?,
            high: lower_value(high, schema)?,
        },
        Expr::IsNull(inner) => lower_null_test(inner, schema, false)?,
        Expr::IsNotNull(inner) => lower_null_test(inner, schema, true)?,
        Expr::And(operands) => {
            let mut nodes = operands
                .iter()
                .map(|operand| lower_pred(operand, schema))
                .collect::<Result<Vec<_>>>()?;
            if nodes.len() == 2 {
                let right = nodes.pop().expect("two operands");
                let left = nodes.pop().expect("two operands");
                PredNode::And2(Box::new(left), Box::new(right))
            } else {
                PredNode::AndN(nodes)
            }
        }
        Expr::Or(operands) => {
            let mut nodes = operands
                .iter()
                .map(|operand| lower_pred(operand, schema))
                .collect::<Result<Vec<_>>>()?;
            if nodes.len() == 2 {
                let right = nodes.pop().expect("two operands");
                let left = nodes.pop().expect("two operands");
                PredNode::Or2(Box::new(left), Box::new(right))
            } else {
                PredNode::OrN(nodes)
            }
        }
        Expr::Not(inner) => {
            PredNode::Not(Box::new(lower_pred(inner, schema)?))
        }
        Expr::StrTest { op, expr, pattern } => match expr.unaliased() {
            Expr::Column(name) => {
                let index = resolve_column(schema, name)?;
                if schema.columns()[index].dtype.kind != DTypeKind::Str {
                    return Err(Error::InvalidOperand(format!(
                        "string test requires a string column, got {}",
                        schema.columns()[index].dtype.name()
                    )));
                }
                PredNode::StrTest {
                    index,
                    op: *op,
                    pattern: pattern.clone(),
                }
            }
            _ => {
                return Err(Error::InvalidExpression(
                    "string test requires a column reference".to_string(),
                ))
            }
        },
        Expr::Column(name) => {
            let index = resolve_column(schema, name)?;
            if schema.columns()[index].dtype.kind != DTypeKind::Bool {
                return Err(Error::InvalidOperand(format!(
                    "predicate column must be boolean, got {}",
                    schema.columns()[index].dtype.name()
                )));
            }
            PredNode::BoolColumn { index }
        }
        Expr::Literal { value, .. } => PredNode::Const(value.is_truthy()),
        Expr::Alias { expr, .. } => lower_pred(expr, schema)?,
        Expr::Agg { .. } => {
            return Err(Error::InvalidExpression(
                "aggregate expression in a predicate context".to_string(),
            ))
        }
        other => {
            return Err(Error::InvalidExpression(format!(
                "expression is not a predicate: {other:?}"
            )))
        }
    })
}

fn lower_null_test(
    inner: &Expr,
    schema: &Schema,
    negated: bool,
) -> Result<PredNode> {
    // Bare column references test the chunk bitmap directly.
    match inner.unaliased() {
        Expr::Column(name) => Ok(PredNode::IsNullColumn {
            index: resolve_column(schema, name)?,
            negated,
        }),
        _ => Ok(PredNode::IsNullExpr {
            value: lower_value(inner, schema)?,
            negated,
        }),
    }
}

fn eval_value(node: &ValueNode, chunk: &Chunk, row: usize) -> Scalar {
    match node {
        ValueNode::Column { index, kind } => {
            if chunk.is_null(*index, row) {
                return Scalar::Null;
            }
            if *kind == DTypeKind::Str {
                match chunk.get_string_value(*index, row) {
                    Some(s) => Scalar::Str(s),
                    None => Scalar::Null,
                }
            } else {
                chunk.get_value(*index, row)
            }
        }
        ValueNode::Literal(value) => value.clone(),
        ValueNode::Arith { op, left, right } => {
            let l = eval_value(left, chunk, row);
            if l.is_null() {
                return Scalar::Null;
            }
            let r = eval_value(right, chunk, row);
            if r.is_null() {
                return Scalar::Null;
            }
            eval_arith(*op, l, r)
        }
        ValueNode::Neg(inner) => match eval_value(inner, chunk, row) {
            Scalar::Null => Scalar::Null,
            Scalar::Int(v) => Scalar::Int(v.wrapping_neg()),
            Scalar::UInt(v) => Scalar::Int((v as i64).wrapping_neg()),
            Scalar::Float(v) => Scalar::Float(-v),
            other => other,
        },
        ValueNode::Cast { input, to } => {
            let value = eval_value(input, chunk, row);
            cast_scalar(&value, *to)
        }
        ValueNode::Coalesce(operands) => {
            for operand in operands {
                let value = eval_value(operand, chunk, row);
                if !value.is_null() {
                    return value;
                }
            }
            Scalar::Null
        }
        ValueNode::Pred(pred) => Scalar::Bool(eval_pred(pred, chunk, row)),
    }
}

fn eval_arith(op: ArithOp, left: Scalar, right: Scalar) -> Scalar {
    match (&left, &right) {
        (Scalar::Int(a), Scalar::Int(b)) => int_arith(op, *a, *b),
        (Scalar::UInt(a), Scalar::UInt(b)) => uint_arith(op, *a, *b),
        (Scalar::Int(a), Scalar::UInt(b)) => int_arith(op, *a, *b as i64),
        (Scalar::UInt(a), Scalar::Int(b)) => int_arith(op, *a as i64, *b),
        _ => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Scalar::Null,
            };
            float_arith(op, a, b)
        }
    }
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> Scalar {
    match op {
        ArithOp::Add => Scalar::Int(a.wrapping_add(b)),
        ArithOp::Sub => Scalar::Int(a.wrapping_sub(b)),
        ArithOp::Mul => Scalar::Int(a.wrapping_mul(b)),
        ArithOp::Div => {
            if b == 0 {
                Scalar::Null
            } else {
                Scalar::Int(a.wrapping_div(b))
            }
        }
        ArithOp::Mod => {
            if b == 0 {
                Scalar::Null
            } else {
                Scalar::Int(a.wrapping_rem(b))
            }
        }
    }
}

fn uint_arith(op: ArithOp, a: u64, b: u64) -> Scalar {
    match op {
        ArithOp::Add => Scalar::UInt(a.wrapping_add(b)),
        ArithOp::Sub => {
            if b <= a {
                Scalar::UInt(a - b)
            } else {
                Scalar::Int((a as i64).wrapping_sub(b as i64))
            }
        }
        ArithOp::Mul => Scalar::UInt(a.wrapping_mul(b)),
        ArithOp::Div => {
            if b == 0 {
                Scalar::Null
            } else {
                Scalar::UInt(a / b)
            }
        }
        ArithOp::Mod => {
            if b == 0 {
                Scalar::Null
            } else {
                Scalar::UInt(a % b)
            }
        }
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Scalar {
    match op {
        ArithOp::Add => Scalar::Float(a + b),
        ArithOp::Sub => Scalar::Float(a - b),
        ArithOp::Mul => Scalar::Float(a * b),
        ArithOp::Div => {
            if b == 0.0 {
                Scalar::Null
            } else {
                Scalar::Float(a / b)
            }
        }
        ArithOp::Mod => {
            if b == 0.0 {
                Scalar::Null
            } else {
                Scalar::Float(a % b)
            }
        }
    }
}

fn eval_pred(node: &PredNode, chunk: &Chunk, row: usize) -> bool {
    match node {
        PredNode::Cmp { op, left, right } => {
            let l = eval_value(left, chunk, row);
            if l.is_null() {
                return false;
            }
            let r = eval_value(right, chunk, row);
            if r.is_null() {
                return false;
            }
            match l.compare(&r) {
                Some(ordering) => match op {
                    CmpOp::Eq => ordering == Ordering::Equal,
                    CmpOp::Neq => ordering != Ordering::Equal,
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Lte => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Gte => ordering != Ordering::Less,
                },
                None => false,
            }
        }
        PredNode::Between { value, low, high } => {
            let v = eval_value(value, chunk, row);
            if v.is_null() {
                return false;
            }
            let lo = eval_value(low, chunk, row);
            if lo.is_null() {
                return false;
            }
            let hi = eval_value(high, chunk, row);
            if hi.is_null() {
                return false;
            }
            matches!(
                lo.compare(&v),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ) && matches!(
                v.compare(&hi),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        }
        PredNode::IsNullColumn { index, negated } => {
            chunk.is_null(*index, row) != *negated
        }
        PredNode::IsNullExpr { value, negated } => {
            eval_value(value, chunk, row).is_null() != *negated
        }
        PredNode::And2(left, right) => {
            eval_pred(left, chunk, row) && eval_pred(right, chunk, row)
        }
        PredNode::Or2(left, right) => {
            eval_pred(left, chunk, row) || eval_pred(right, chunk, row)
        }
        PredNode::AndN(operands) => {
            operands.iter().all(|operand| eval_pred(operand, chunk, row))
        }
        PredNode::OrN(operands) => {
            operands.iter().any(|operand| eval_pred(operand, chunk, row))
        }
        PredNode::Not(inner) => !eval_pred(inner, chunk, row),
        PredNode::StrTest { index, op, pattern } => {
            match chunk.get_string_value(*index, row) {
                Some(s) => match op {
                    StrOp::Contains => s.contains(pattern.as_str()),
                    StrOp::StartsWith => s.starts_with(pattern.as_str()),
                    StrOp::EndsWith => s.ends_with(pattern.as_str()),
                },
                None => false,
            }
        }
        PredNode::BoolColumn { index } => {
            !chunk.is_null(*index, row)
                && chunk.get_value(*index, row) == Scalar::Bool(true)
        }
        PredNode::Const(value) => *value,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::buffer::ColumnBuffer;
    use crate::dictionary::new_dictionary;
    use crate::expr::{coalesce, col, lit, null_lit, sum};
    use crate::schema::Schema;
    use std::sync::Arc;

    fn sample_chunk() -> Chunk {
        let schema = Arc::new(
            Schema::new(vec![
                ("id", DType::int32()),
                ("score", DType::float64().nullable()),
                ("name", DType::string()),
                ("flag", DType::boolean()),
            ])
            .unwrap(),
        );
        let dict = new_dictionary();
        let mut ids = ColumnBuffer::new(DType::int32(), 8).unwrap();
        let mut scores =
            ColumnBuffer::new(DType::float64().nullable(), 8).unwrap();
        let mut names = ColumnBuffer::new(DType::string(), 8).unwrap();
        let mut flags = ColumnBuffer::new(DType::boolean(), 8).unwrap();
        {
            let mut guard = dict.write().unwrap();
            let rows = [
                (1, Some(10.0), "alice", true),
                (2, None, "bob", false),
                (3, Some(30.0), "carol", true),
            ];
            for (id, score, name, flag) in rows {
                ids.append(Scalar::Int(id)).unwrap();
                match score {
                    Some(v) => scores.append(Scalar::Float(v)).unwrap(),
                    None => scores.append_null().unwrap(),
                }
                names.append_str_index(guard.intern_str(name)).unwrap();
                flags.append(Scalar::Bool(flag)).unwrap();
            }
        }
        Chunk::new(schema, vec![ids, scores, names, flags], Some(dict))
            .unwrap()
    }

    #[test]
    fn test_column_value_and_nulls() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v = compile_value(&col("score"), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Float(10.0));
        assert_eq!(v.eval(&chunk, 1), Scalar::Null);

        let v = compile_value(&col("name"), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 2), Scalar::Str("carol".into()));
    }

    #[test]
    fn test_arithmetic_null_propagation() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v =
            compile_value(&col("score").add(col("id")), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Float(11.0));
        assert_eq!(v.eval(&chunk, 1), Scalar::Null);
    }

    #[test]
    fn test_division_by_zero_is_null() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v = compile_value(&col("id").div(lit(0)), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Null);
        let v = compile_value(&col("score").rem(lit(0.0)), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Null);
        let v = compile_value(&col("id").div(lit(2)), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 2), Scalar::Int(1));
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v = compile_value(&col("id").mul(lit(10)), &schema).unwrap();
        assert_eq!(v.eval(&chunk, 1), Scalar::Int(20));
    }

    #[test]
    fn test_predicate_null_collapses_to_false() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(&col("score").gt(lit(5.0)), &schema)
            .unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(!p.eval(&chunk, 1), "null comparison must be false");
        assert!(p.eval(&chunk, 2));

        // Equality against null literal is also false, not null.
        let p = compile_predicate(&col("score").eq(null_lit()), &schema)
            .unwrap();
        assert!(!p.eval(&chunk, 1));
    }

    #[test]
    fn test_is_null_fast_path() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(&col("score").is_null(), &schema).unwrap();
        assert!(!p.eval(&chunk, 0));
        assert!(p.eval(&chunk, 1));

        let p =
            compile_predicate(&col("score").is_not_null(), &schema).unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(!p.eval(&chunk, 1));
    }

    #[test]
    fn test_logical_short_circuit() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(
            &col("flag").and(col("id").lt(lit(3))),
            &schema,
        )
        .unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(!p.eval(&chunk, 1));
        assert!(!p.eval(&chunk, 2));

        let p = compile_predicate(
            &col("flag").or(col("id").eq(lit(2))),
            &schema,
        )
        .unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(p.eval(&chunk, 1));
    }

    #[test]
    fn test_string_predicates() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(&col("name").contains("ar"), &schema)
            .unwrap();
        assert!(!p.eval(&chunk, 0));
        assert!(p.eval(&chunk, 2));

        let p = compile_predicate(&col("name").starts_with("a"), &schema)
            .unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(!p.eval(&chunk, 1));

        let p =
            compile_predicate(&col("name").ends_with("b"), &schema).unwrap();
        assert!(p.eval(&chunk, 1));
    }

    #[test]
    fn test_string_predicate_requires_column() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let err = compile_predicate(
            &lit("abc").contains("b"),
            &schema,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidExpression(_)));
    }

    #[test]
    fn test_between() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(
            &col("id").between(lit(2), lit(3)),
            &schema,
        )
        .unwrap();
        assert!(!p.eval(&chunk, 0));
        assert!(p.eval(&chunk, 1));
        assert!(p.eval(&chunk, 2));
    }

    #[test]
    fn test_bool_column_as_predicate() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let p = compile_predicate(&col("flag"), &schema).unwrap();
        assert!(p.eval(&chunk, 0));
        assert!(!p.eval(&chunk, 1));

        let err = compile_predicate(&col("id"), &schema).unwrap_err();
        assert!(matches!(err, Error::InvalidOperand(_)));
    }

    #[test]
    fn test_coalesce_returns_first_non_null() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v = compile_value(
            &coalesce(vec![col("score"), col("id")]),
            &schema,
        )
        .unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Float(10.0));
        assert_eq!(v.eval(&chunk, 1), Scalar::Int(2));
    }

    #[test]
    fn test_cast_in_expression() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let v = compile_value(
            &col("score").cast(DType::int32()),
            &schema,
        )
        .unwrap();
        assert_eq!(v.eval(&chunk, 0), Scalar::Int(10));
        assert_eq!(v.eval(&chunk, 1), Scalar::Null);
    }

    #[test]
    fn test_aggregate_rejected_in_row_context() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        assert!(compile_value(&sum(col("id")), &schema).is_err());
        assert!(
            compile_predicate(&sum(col("id")).gt(lit(1)), &schema).is_err()
        );
    }

    #[test]
    fn test_unknown_column_fails_compilation() {
        let chunk = sample_chunk();
        let schema = chunk.schema().clone();
        let err = compile_value(&col("nope"), &schema).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(_)));
    }

    #[test]
    fn test_predicate_respects_selection() {
        let mut chunk = sample_chunk();
        chunk.set_selection(vec![0, 2]).unwrap();
        let schema = chunk.schema().clone();
        let p =
            compile_predicate(&col("id").eq(lit(3)), &schema).unwrap();
        assert!(!p.eval(&chunk, 0));
        assert!(p.eval(&chunk, 1));
    }
}
