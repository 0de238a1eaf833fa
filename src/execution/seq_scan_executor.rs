use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{RecordId, Result, StrataError, TableOid};
use crate::storage::TableIterator;
use crate::tuple::Tuple;

use super::executor::{Executor, ExecutorContext};
use super::expression::Expression;

/// Sequential scan over a table heap with an optional filter predicate.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    table_oid: TableOid,
    predicate: Option<Expression>,
    table_info: Option<Arc<TableInfo>>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, table_oid: TableOid, predicate: Option<Expression>) -> Self {
        Self {
            ctx,
            table_oid,
            predicate,
            table_info: None,
            iter: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        let table_info = self
            .ctx
            .catalog()
            .get_table(self.table_oid)
            .ok_or_else(|| StrataError::TableNotFound(format!("oid {}", self.table_oid)))?;

        self.iter = Some(Arc::clone(&table_info.table).iter());
        self.table_info = Some(table_info);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let table_info = self.table_info.as_ref().expect("init() must run first");
        let iter = self.iter.as_mut().expect("init() must run first");

        for row in iter {
            let (rid, bytes) = row?;
            let tuple = Tuple::from_bytes(Arc::clone(&table_info.schema), &bytes)
                .ok_or(StrataError::TupleSerialization)?;

            let accepted = match &self.predicate {
                Some(predicate) => predicate.evaluate_as_predicate(&tuple, &table_info.schema),
                None => true,
            };
            if accepted {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }
}
