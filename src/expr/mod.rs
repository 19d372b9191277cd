//! # Expression subsystem
//!
//! An immutable expression AST over schema columns, built with free
//! constructor functions ([`col`], [`lit`]) and chaining builder methods
//! (`.gt()`, `.add()`, `.alias()`), mirroring how queries are assembled
//! elsewhere in the crate:
//!
//! ```
//! use columnar_engine::expr::{col, lit, sum};
//!
//! let predicate = col("age").gt(lit(23)).and(col("name").is_not_null());
//! let projection = col("price").mul(col("qty")).alias("total");
//! let aggregate = sum(col("value")).alias("total_value");
//! ```
//!
//! Trees are validated by [`infer`](crate::expr::infer_type) (producing a
//! result dtype and an aggregate flag) and turned into runnable form by
//! [`compile_value`]/[`compile_predicate`], which resolve column names to
//! indices against a fixed [`Schema`](crate::schema::Schema).

mod compile;
mod infer;

pub use compile::{compile_predicate, compile_value, CompiledPredicate, CompiledValue};
pub use infer::infer_type;

use crate::types::{DType, Scalar};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division (by zero yields null).
    Div,
    /// Remainder (by zero yields null).
    Mod,
}

/// String test operators; the pattern is always a literal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    /// Substring containment.
    Contains,
    /// Prefix test.
    StartsWith,
    /// Suffix test.
    EndsWith,
}

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    /// Running sum (float64 result).
    Sum,
    /// Arithmetic mean (float64 result).
    Avg,
    /// Minimum of non-null values.
    Min,
    /// Maximum of non-null values.
    Max,
    /// First non-null value.
    First,
    /// Last non-null value.
    Last,
    /// Count of non-null values.
    Count,
    /// Count of all rows (`count(*)`).
    CountAll,
}

/// An immutable expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a schema column by name.
    Column(String),
    /// A constant, with an optional explicit dtype hint.
    Literal {
        /// The constant value.
        value: Scalar,
        /// Explicit dtype, overriding literal inference.
        dtype: Option<DType>,
    },
    /// Binary comparison.
    Cmp {
        /// The comparison operator.
        op: CmpOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Range test `low <= expr <= high`.
    Between {
        /// The tested expression.
        expr: Box<Expr>,
        /// Inclusive lower bound.
        low: Box<Expr>,
        /// Inclusive upper bound.
        high: Box<Expr>,
    },
    /// Null test.
    IsNull(Box<Expr>),
    /// Non-null test.
    IsNotNull(Box<Expr>),
    /// N-ary short-circuit conjunction.
    And(Vec<Expr>),
    /// N-ary short-circuit disjunction.
    Or(Vec<Expr>),
    /// Boolean negation.
    Not(Box<Expr>),
    /// Binary arithmetic.
    Arith {
        /// The arithmetic operator.
        op: ArithOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Numeric sign flip.
    Neg(Box<Expr>),
    /// String predicate against a literal pattern.
    StrTest {
        /// The string test operator.
        op: StrOp,
        /// The tested expression (must be a column reference).
        expr: Box<Expr>,
        /// The literal pattern.
        pattern: String,
    },
    /// Aggregation; `expr` is `None` for `count(*)`.
    Agg {
        /// The aggregation operator.
        op: AggOp,
        /// The aggregated expression (absent for `CountAll`).
        expr: Option<Box<Expr>>,
    },
    /// Conversion to a target dtype.
    Cast {
        /// The converted expression.
        expr: Box<Expr>,
        /// The target dtype.
        to: DType,
    },
    /// First non-null of the operands.
    Coalesce(Vec<Expr>),
    /// Renames the expression's output column.
    Alias {
        /// The renamed expression.
        expr: Box<Expr>,
        /// The output name.
        name: String,
    },
}

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// A literal constant with inferred dtype.
pub fn lit(value: impl Into<Scalar>) -> Expr {
    Expr::Literal { value: value.into(), dtype: None }
}

/// A literal constant with an explicit dtype hint.
pub fn lit_typed(value: impl Into<Scalar>, dtype: DType) -> Expr {
    Expr::Literal { value: value.into(), dtype: Some(dtype) }
}

/// Typed null literal.
pub fn null_lit() -> Expr {
    Expr::Literal { value: Scalar::Null, dtype: None }
}

/// N-ary conjunction.
pub fn and(operands: Vec<Expr>) -> Expr {
    Expr::And(operands)
}

/// N-ary disjunction.
pub fn or(operands: Vec<Expr>) -> Expr {
    Expr::Or(operands)
}

/// First non-null of the operands.
pub fn coalesce(operands: Vec<Expr>) -> Expr {
    Expr::Coalesce(operands)
}

/// Sum aggregation.
pub fn sum(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Sum, expr: Some(Box::new(expr)) }
}

/// Mean aggregation.
pub fn avg(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Avg, expr: Some(Box::new(expr)) }
}

/// Minimum aggregation.
pub fn min(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Min, expr: Some(Box::new(expr)) }
}

/// Maximum aggregation.
pub fn max(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Max, expr: Some(Box::new(expr)) }
}

/// First non-null value aggregation.
pub fn first(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::First, expr: Some(Box::new(expr)) }
}

/// Last non-null value aggregation.
pub fn last(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Last, expr: Some(Box::new(expr)) }
}

/// Count of non-null values.
pub fn count(expr: Expr) -> Expr {
    Expr::Agg { op: AggOp::Count, expr: Some(Box::new(expr)) }
}

/// Count of all rows (`count(*)`).
pub fn count_all() -> Expr {
    Expr::Agg { op: AggOp::CountAll, expr: None }
}

impl Expr {
    fn cmp(self, op: CmpOp, other: Expr) -> Expr {
        Expr::Cmp { op, left: Box::new(self), right: Box::new(other) }
    }

    /// `self == other`.
    pub fn eq(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Eq, other)
    }

    /// `self != other`.
    pub fn neq(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Neq, other)
    }

    /// `self < other`.
    pub fn lt(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Lt, other)
    }

    /// `self <= other`.
    pub fn lte(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Lte, other)
    }

    /// `self > other`.
    pub fn gt(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Gt, other)
    }

    /// `self >= other`.
    pub fn gte(self, other: Expr) -> Expr {
        self.cmp(CmpOp::Gte, other)
    }

    /// `low <= self <= high`.
    pub fn between(self, low: Expr, high: Expr) -> Expr {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    /// `self IS NULL`.
    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    /// `self IS NOT NULL`.
    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(Box::new(self))
    }

    /// `self AND other`.
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(vec![self, other])
    }

    /// `self OR other`.
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(vec![self, other])
    }

    /// `NOT self`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    fn arith(self, op: ArithOp, other: Expr) -> Expr {
        Expr::Arith { op, left: Box::new(self), right: Box::new(other) }
    }

    /// `self + other`.
    pub fn add(self, other: Expr) -> Expr {
        self.arith(ArithOp::Add, other)
    }

    /// `self - other`.
    pub fn sub(self, other: Expr) -> Expr {
        self.arith(ArithOp::Sub, other)
    }

    /// `self * other`.
    pub fn mul(self, other: Expr) -> Expr {
        self.arith(ArithOp::Mul, other)
    }

    /// `self / other` (division by zero yields null).
    pub fn div(self, other: Expr) -> Expr {
        self.arith(ArithOp::Div, other)
    }

    /// `self % other` (modulo by zero yields null).
    pub fn rem(self, other: Expr) -> Expr {
        self.arith(ArithOp::Mod, other)
    }

    /// `-self`.
    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }

    /// Substring containment test against a literal pattern.
    pub fn contains(self, pattern: impl Into<String>) -> Expr {
        Expr::StrTest {
            op: StrOp::Contains,
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    /// Prefix test against a literal pattern.
    pub fn starts_with(self, pattern: impl Into<String>) -> Expr {
        Expr::StrTest {
            op: StrOp::StartsWith,
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    /// Suffix test against a literal pattern.
    pub fn ends_with(self, pattern: impl Into<String>) -> Expr {
        Expr::StrTest {
            op: StrOp::EndsWith,
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    /// Conversion to a target dtype.
    pub fn cast(self, to: DType) -> Expr {
        Expr::Cast { expr: Box::new(self), to }
    }

    /// Rename the output column.
    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias { expr: Box::new(self), name: name.into() }
    }

    /// The output name: the innermost alias, or the column name for bare
    /// column references.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expr::Alias { name, .. } => Some(name),
            Expr::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Strip alias layers.
    pub fn unaliased(&self) -> &Expr {
        match self {
            Expr::Alias { expr, .. } => expr.unaliased(),
            other => other,
        }
    }
}
