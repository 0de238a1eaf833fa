mod aggregation_executor;
mod delete_executor;
mod executor;
mod expression;
mod insert_executor;
mod seq_scan_executor;

pub use aggregation_executor::AggregationExecutor;
pub use delete_executor::DeleteExecutor;
pub use executor::{Executor, ExecutorContext};
pub use expression::{AggregateExpression, AggregationType, ComparisonOp, Expression};
pub use insert_executor::{InsertExecutor, InsertSource};
pub use seq_scan_executor::SeqScanExecutor;
