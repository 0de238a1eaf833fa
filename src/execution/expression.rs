use std::cmp::Ordering;

use crate::tuple::{Schema, Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOp {
    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::LtEq => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Row-level expression evaluated against a tuple. Comparisons involving
/// NULL evaluate to false.
#[derive(Debug, Clone)]
pub enum Expression {
    /// The value of the column at this index
    ColumnValue(usize),
    /// A literal
    Constant(Value),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn column(index: usize) -> Self {
        Expression::ColumnValue(index)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple, _schema: &Schema) -> Value {
        match self {
            Expression::ColumnValue(index) => {
                tuple.value(*index).cloned().unwrap_or(Value::Null)
            }
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left, right } => {
                let lhs = left.evaluate(tuple, _schema);
                let rhs = right.evaluate(tuple, _schema);
                match lhs.compare(&rhs) {
                    Some(ordering) => Value::Boolean(op.matches(ordering)),
                    None => Value::Boolean(false),
                }
            }
        }
    }

    /// True only for an actual boolean true result.
    pub fn evaluate_as_predicate(&self, tuple: &Tuple, schema: &Schema) -> bool {
        matches!(self.evaluate(tuple, schema), Value::Boolean(true))
    }
}

/// The accumulator kinds a hash aggregation maintains per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    Count,
    Sum,
    Min,
    Max,
}

/// Expression evaluated over a finished aggregation row: the group-by
/// values and the accumulator values.
#[derive(Debug, Clone)]
pub enum AggregateExpression {
    /// The i-th group-by value
    GroupBy(usize),
    /// The i-th aggregate accumulator
    Aggregate(usize),
    Constant(Value),
    Comparison {
        op: ComparisonOp,
        left: Box<AggregateExpression>,
        right: Box<AggregateExpression>,
    },
}

impl AggregateExpression {
    pub fn group_by(index: usize) -> Self {
        AggregateExpression::GroupBy(index)
    }

    pub fn aggregate(index: usize) -> Self {
        AggregateExpression::Aggregate(index)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        AggregateExpression::Constant(value.into())
    }

    pub fn comparison(
        op: ComparisonOp,
        left: AggregateExpression,
        right: AggregateExpression,
    ) -> Self {
        AggregateExpression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate_aggregate(&self, group_bys: &[Value], aggregates: &[Value]) -> Value {
        match self {
            AggregateExpression::GroupBy(index) => {
                group_bys.get(*index).cloned().unwrap_or(Value::Null)
            }
            AggregateExpression::Aggregate(index) => {
                aggregates.get(*index).cloned().unwrap_or(Value::Null)
            }
            AggregateExpression::Constant(value) => value.clone(),
            AggregateExpression::Comparison { op, left, right } => {
                let lhs = left.evaluate_aggregate(group_bys, aggregates);
                let rhs = right.evaluate_aggregate(group_bys, aggregates);
                match lhs.compare(&rhs) {
                    Some(ordering) => Value::Boolean(op.matches(ordering)),
                    None => Value::Boolean(false),
                }
            }
        }
    }
}
