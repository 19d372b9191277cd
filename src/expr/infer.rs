//! Expression type inference.
//!
//! [`infer_type`] walks an expression tree against a schema and produces
//! the result [`DType`] plus an `is_aggregate` flag, validating operand
//! compatibility along the way. Inference is the first half of
//! compilation: every tree handed to the compiler has already passed
//! through here.

use super::{AggOp, ArithOp, Expr};
use crate::schema::Schema;
use crate::types::{promote, DType, DTypeKind, Scalar};
use crate::{Error, Result};

/// Infer `(result dtype, is_aggregate)` for an expression.
pub fn infer_type(expr: &Expr, schema: &Schema) -> Result<(DType, bool)> {
    match expr {
        Expr::Column(name) => {
            let index = schema
                .index_of(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
            Ok((schema.columns()[index].dtype, false))
        }
        Expr::Literal { value, dtype } => {
            if let Some(hint) = dtype {
                return Ok((*hint, false));
            }
            Ok((infer_literal(value), false))
        }
        Expr::Cmp { left, right, .. } => {
            let (lt, la) = infer_type(left, schema)?;
            let (rt, ra) = infer_type(right, schema)?;
            if !comparable(lt.kind, rt.kind) {
                return Err(Error::TypeIncompatible {
                    left: lt.name(),
                    right: rt.name(),
                });
            }
            Ok((DType::boolean(), la || ra))
        }
        Expr::Between { expr, low, high } => {
            let (vt, va) = infer_type(expr, schema)?;
            let (lt, la) = infer_type(low, schema)?;
            let (ht, ha) = infer_type(high, schema)?;
            for bound in [lt.kind, ht.kind] {
                if !comparable(vt.kind, bound) {
                    return Err(Error::TypeIncompatible {
                        left: vt.name(),
                        right: bound.name().to_string(),
                    });
                }
            }
            Ok((DType::boolean(), va || la || ha))
        }
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            let (_, agg) = infer_type(inner, schema)?;
            Ok((DType::boolean(), agg))
        }
        Expr::And(operands) | Expr::Or(operands) => {
            if operands.is_empty() {
                return Err(Error::InvalidExpression(
                    "logical operator with no operands".to_string(),
                ));
            }
            let mut agg = false;
            for operand in operands {
                let (dtype, a) = infer_type(operand, schema)?;
                if dtype.kind != DTypeKind::Bool {
                    return Err(Error::InvalidOperand(format!(
                        "logical operand must be boolean, got {}",
                        dtype.name()
                    )));
                }
                agg |= a;
            }
            Ok((DType::boolean(), agg))
        }
        Expr::Not(inner) => {
            let (dtype, agg) = infer_type(inner, schema)?;
            if dtype.kind != DTypeKind::Bool {
                return Err(Error::InvalidOperand(format!(
                    "NOT operand must be boolean, got {}",
                    dtype.name()
                )));
            }
            Ok((DType::boolean(), agg))
        }
        Expr::Arith { op, left, right } => {
            let (lt, la) = infer_type(left, schema)?;
            let (rt, ra) = infer_type(right, schema)?;
            let kind = promote(lt.kind, rt.kind).ok_or_else(|| {
                Error::TypeIncompatible { left: lt.name(), right: rt.name() }
            })?;
            // Division and modulo can produce null for any input.
            let nullable = lt.nullable
                || rt.nullable
                || matches!(op, ArithOp::Div | ArithOp::Mod);
            Ok((DType { kind, nullable }, la || ra))
        }
        Expr::Neg(inner) => {
            let (dtype, agg) = infer_type(inner, schema)?;
            if !dtype.kind.is_numeric() {
                return Err(Error::InvalidOperand(format!(
                    "negation requires a numeric operand, got {}",
                    dtype.name()
                )));
            }
            Ok((dtype, agg))
        }
        Expr::StrTest { expr, .. } => {
            let (dtype, agg) = infer_type(expr, schema)?;
            if dtype.kind != DTypeKind::Str {
                return Err(Error::InvalidOperand(format!(
                    "string test requires a string operand, got {}",
                    dtype.name()
                )));
            }
            Ok((DType::boolean(), agg))
        }
        Expr::Agg { op, expr } => {
            let inner = match expr {
                Some(inner) => {
                    let (dtype, agg) = infer_type(inner, schema)?;
                    if agg {
                        return Err(Error::InvalidAggregation(
                            "nested aggregation".to_string(),
                        ));
                    }
                    Some(dtype)
                }
                None => None,
            };
            let dtype = match op {
                AggOp::Sum | AggOp::Avg => {
                    let inner = require_agg_input(op, inner)?;
                    if !inner.kind.is_numeric() {
                        return Err(Error::InvalidAggregation(format!(
                            "{:?} requires a numeric input, got {}",
                            op,
                            inner.name()
                        )));
                    }
                    DType::float64().nullable()
                }
                AggOp::Min | AggOp::Max => {
                    let inner = require_agg_input(op, inner)?;
                    if !inner.kind.is_numeric() {
                        return Err(Error::InvalidAggregation(format!(
                            "{:?} requires a numeric input, got {}",
                            op,
                            inner.name()
                        )));
                    }
                    inner.nullable()
                }
                AggOp::First | AggOp::Last => {
                    require_agg_input(op, inner)?.nullable()
                }
                AggOp::Count => {
                    require_agg_input(op, inner)?;
                    DType::int64()
                }
                AggOp::CountAll => DType::int64(),
            };
            Ok((dtype, true))
        }
        Expr::Cast { expr, to } => {
            let (from, agg) = infer_type(expr, schema)?;
            // Parsing casts can fail per-value, degrading to null.
            let lossy = from.kind == DTypeKind::Str
                && to.kind != DTypeKind::Str;
            let nullable = to.nullable || from.nullable || lossy;
            Ok((DType { kind: to.kind, nullable }, agg))
        }
        Expr::Coalesce(operands) => {
            if operands.is_empty() {
                return Err(Error::InvalidExpression(
                    "coalesce with no operands".to_string(),
                ));
            }
            let mut agg = false;
            let mut unified: Option<DType> = None;
            let mut all_nullable = true;
            for operand in operands {
                let (dtype, a) = infer_type(operand, schema)?;
                agg |= a;
                all_nullable &= dtype.nullable;
                unified = Some(match unified {
                    None => dtype,
                    Some(current) => {
                        let kind = unify(current.kind, dtype.kind)
                            .ok_or_else(|| Error::TypeIncompatible {
                                left: current.name(),
                                right: dtype.name(),
                            })?;
                        DType { kind, nullable: true }
                    }
                });
            }
            let mut result =
                unified.unwrap_or_else(|| DType::int32().nullable());
            result.nullable = all_nullable;
            Ok((result, agg))
        }
        Expr::Alias { expr, .. } => infer_type(expr, schema),
    }
}

fn require_agg_input(op: &AggOp, inner: Option<DType>) -> Result<DType> {
    inner.ok_or_else(|| {
        Error::InvalidAggregation(format!("{op:?} requires an input expression"))
    })
}

/// Literal dtype inference: i32-range integers are Int32, larger
/// integers Int64, floats Float64, null a nullable Int32.
fn infer_literal(value: &Scalar) -> DType {
    match value {
        Scalar::Null => DType::int32().nullable(),
        Scalar::Int(v) => {
            if i32::try_from(*v).is_ok() {
                DType::int32()
            } else {
                DType::int64()
            }
        }
        Scalar::UInt(v) => {
            if *v <= i32::MAX as u64 {
                DType::int32()
            } else if *v <= i64::MAX as u64 {
                DType::int64()
            } else {
                DType::uint64()
            }
        }
        Scalar::Float(_) => DType::float64(),
        Scalar::Bool(_) => DType::boolean(),
        Scalar::Str(_) => DType::string(),
    }
}

fn comparable(a: DTypeKind, b: DTypeKind) -> bool {
    (a.is_numeric() && b.is_numeric())
        || (a == DTypeKind::Str && b == DTypeKind::Str)
        || (a == DTypeKind::Bool && b == DTypeKind::Bool)
}

/// Common type of two coalesce operands: equal kinds, or the numeric
/// promotion of both.
fn unify(a: DTypeKind, b: DTypeKind) -> Option<DTypeKind> {
    if a == b {
        Some(a)
    } else {
        promote(a, b)
    }
}
