use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::{RecordId, Result, SlotId, INVALID_PAGE_ID};
use crate::tuple::{Schema, Tuple, Value};

use super::executor::Executor;
use super::expression::{AggregateExpression, AggregationType, Expression};

/// Group-by key with value-based hashing (floats hash by bit pattern).
#[derive(Debug, Clone, PartialEq)]
struct AggregateKey(Vec<Value>);

impl Eq for AggregateKey {}

impl Hash for AggregateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Null => {}
                Value::Boolean(v) => v.hash(state),
                Value::TinyInt(v) => v.hash(state),
                Value::SmallInt(v) => v.hash(state),
                Value::Integer(v) => v.hash(state),
                Value::BigInt(v) => v.hash(state),
                Value::Float(v) => v.to_bits().hash(state),
                Value::Double(v) => v.to_bits().hash(state),
                Value::String(v) => v.hash(state),
                Value::Timestamp(v) => v.hash(state),
            }
        }
    }
}

/// Per-group accumulators, one slot per aggregate expression.
struct AggregationHashTable {
    agg_types: Vec<AggregationType>,
    groups: HashMap<AggregateKey, Vec<Value>>,
}

impl AggregationHashTable {
    fn new(agg_types: Vec<AggregationType>) -> Self {
        Self {
            agg_types,
            groups: HashMap::new(),
        }
    }

    fn initial_values(&self) -> Vec<Value> {
        self.agg_types
            .iter()
            .map(|agg_type| match agg_type {
                AggregationType::Count => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

    /// Folds one input row into its group's accumulators.
    fn insert_combine(&mut self, key: AggregateKey, inputs: Vec<Value>) {
        let initial = self.initial_values();
        let accumulators = self.groups.entry(key).or_insert(initial);

        for (i, agg_type) in self.agg_types.iter().enumerate() {
            let input = &inputs[i];
            let acc = &mut accumulators[i];

            match agg_type {
                AggregationType::Count => {
                    if let Value::Integer(n) = acc {
                        *n += 1;
                    }
                }
                AggregationType::Sum => {
                    *acc = add_values(acc, input);
                }
                AggregationType::Min => {
                    let replace = match acc.compare(input) {
                        Some(std::cmp::Ordering::Greater) => true,
                        None => acc.is_null() && !input.is_null(),
                        _ => false,
                    };
                    if replace {
                        *acc = input.clone();
                    }
                }
                AggregationType::Max => {
                    let replace = match acc.compare(input) {
                        Some(std::cmp::Ordering::Less) => true,
                        None => acc.is_null() && !input.is_null(),
                        _ => false,
                    };
                    if replace {
                        *acc = input.clone();
                    }
                }
            }
        }
    }
}

/// Numeric accumulation for SUM; a null accumulator adopts the input.
fn add_values(acc: &Value, input: &Value) -> Value {
    match (acc, input) {
        (Value::Null, _) => input.clone(),
        (_, Value::Null) => acc.clone(),
        (Value::TinyInt(a), Value::TinyInt(b)) => Value::TinyInt(a.wrapping_add(*b)),
        (Value::SmallInt(a), Value::SmallInt(b)) => Value::SmallInt(a.wrapping_add(*b)),
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(*b)),
        (Value::BigInt(a), Value::BigInt(b)) => Value::BigInt(a.wrapping_add(*b)),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
        _ => Value::Null,
    }
}

/// Hash aggregation: `init` drains the child into a group-by hash table;
/// `next` walks the groups, applies the HAVING predicate, and projects the
/// output expressions.
pub struct AggregationExecutor {
    child: Box<dyn Executor>,
    group_by_exprs: Vec<Expression>,
    agg_exprs: Vec<Expression>,
    agg_types: Vec<AggregationType>,
    having: Option<AggregateExpression>,
    output_exprs: Vec<AggregateExpression>,
    output_schema: Arc<Schema>,
    /// Snapshot of the finished hash table, walked by `next`
    groups: Vec<(Vec<Value>, Vec<Value>)>,
    cursor: usize,
}

impl AggregationExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        child: Box<dyn Executor>,
        group_by_exprs: Vec<Expression>,
        agg_exprs: Vec<Expression>,
        agg_types: Vec<AggregationType>,
        having: Option<AggregateExpression>,
        output_exprs: Vec<AggregateExpression>,
        output_schema: Arc<Schema>,
    ) -> Self {
        assert_eq!(agg_exprs.len(), agg_types.len());
        Self {
            child,
            group_by_exprs,
            agg_exprs,
            agg_types,
            having,
            output_exprs,
            output_schema,
            groups: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;

        let mut table = AggregationHashTable::new(self.agg_types.clone());
        while let Some((tuple, _rid)) = self.child.next()? {
            let schema = Arc::clone(tuple.schema());

            let key = AggregateKey(
                self.group_by_exprs
                    .iter()
                    .map(|expr| expr.evaluate(&tuple, &schema))
                    .collect(),
            );
            let inputs = self
                .agg_exprs
                .iter()
                .map(|expr| expr.evaluate(&tuple, &schema))
                .collect();

            table.insert_combine(key, inputs);
        }

        self.groups = table
            .groups
            .into_iter()
            .map(|(key, accumulators)| (key.0, accumulators))
            .collect();
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        while self.cursor < self.groups.len() {
            let (group_bys, aggregates) = &self.groups[self.cursor];
            self.cursor += 1;

            let passes = match &self.having {
                Some(having) => matches!(
                    having.evaluate_aggregate(group_bys, aggregates),
                    Value::Boolean(true)
                ),
                None => true,
            };
            if !passes {
                continue;
            }

            let values = self
                .output_exprs
                .iter()
                .map(|expr| expr.evaluate_aggregate(group_bys, aggregates))
                .collect();
            let tuple = Tuple::new(Arc::clone(&self.output_schema), values);
            // Aggregation output rows have no storage location.
            let rid = RecordId::new(INVALID_PAGE_ID, SlotId::new(0));
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }
}
