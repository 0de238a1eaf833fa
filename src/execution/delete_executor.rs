use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::{RecordId, Result, StrataError, TableOid};
use crate::tuple::Tuple;

use super::executor::{Executor, ExecutorContext};

/// Deletes every row produced by its child from the table heap, removing
/// the matching entry from the table's first index when one exists.
/// Produces no output rows.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table_oid: TableOid,
    child: Box<dyn Executor>,
    table_info: Option<Arc<TableInfo>>,
    index_info: Option<Arc<IndexInfo>>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, table_oid: TableOid, child: Box<dyn Executor>) -> Self {
        Self {
            ctx,
            table_oid,
            child,
            table_info: None,
            index_info: None,
            done: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        let table_info = self
            .ctx
            .catalog()
            .get_table(self.table_oid)
            .ok_or_else(|| StrataError::TableNotFound(format!("oid {}", self.table_oid)))?;

        self.index_info = self
            .ctx
            .catalog()
            .get_table_indexes(&table_info.name)
            .first()
            .cloned();
        self.table_info = Some(table_info);

        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut victims = Vec::new();
        while let Some((tuple, rid)) = self.child.next()? {
            victims.push((tuple, rid));
        }

        let table_info = self.table_info.as_ref().expect("init() must run first");
        let txn = self.ctx.transaction();

        for (tuple, rid) in victims {
            table_info.table.apply_delete(rid, txn)?;

            if let Some(index_info) = &self.index_info {
                let key = tuple.key_from_tuple(
                    Arc::clone(&index_info.key_schema),
                    &index_info.key_attrs,
                );
                index_info.index.delete_entry(&key, rid, txn)?;
            }
        }
        Ok(None)
    }
}
