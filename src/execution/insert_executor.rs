use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::{RecordId, Result, StrataError, TableOid};
use crate::tuple::{Tuple, Value};

use super::executor::{Executor, ExecutorContext};

/// Where an insert's rows come from: literal value rows, or a child
/// executor's output.
pub enum InsertSource {
    Raw(Vec<Vec<Value>>),
    Child(Box<dyn Executor>),
}

/// Inserts tuples into a table heap and maintains the table's first index
/// (tables without indexes are fine). Produces no output rows.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table_oid: TableOid,
    source: InsertSource,
    table_info: Option<Arc<TableInfo>>,
    index_info: Option<Arc<IndexInfo>>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, table_oid: TableOid, source: InsertSource) -> Self {
        Self {
            ctx,
            table_oid,
            source,
            table_info: None,
            index_info: None,
            done: false,
        }
    }

    fn insert_one(&self, tuple: &Tuple) -> Result<RecordId> {
        let table_info = self.table_info.as_ref().unwrap();
        let txn = self.ctx.transaction();

        let bytes = tuple.to_bytes().ok_or(StrataError::TupleSerialization)?;
        let rid = table_info.table.insert_tuple(&bytes, txn)?;

        if let Some(index_info) = &self.index_info {
            let key = tuple.key_from_tuple(
                Arc::clone(&index_info.key_schema),
                &index_info.key_attrs,
            );
            index_info.index.insert_entry(&key, rid, txn)?;
        }
        Ok(rid)
    }
}

impl Executor for InsertExecutor {
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

        if let InsertSource::Child(child) = &mut self.source {
            child.init()?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let table_info = Arc::clone(self.table_info.as_ref().expect("init() must run first"));

        match &mut self.source {
            InsertSource::Raw(rows) => {
                let rows = std::mem::take(rows);
                for values in rows {
                    let tuple = Tuple::new(Arc::clone(&table_info.schema), values);
                    self.insert_one(&tuple)?;
                }
            }
            InsertSource::Child(child) => {
                let mut pending = Vec::new();
                while let Some((tuple, _rid)) = child.next()? {
                    pending.push(tuple);
                }
                for tuple in pending {
                    self.insert_one(&tuple)?;
                }
            }
        }
        Ok(None)
    }
}
