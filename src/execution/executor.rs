use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::{RecordId, Result};
use crate::transaction::Transaction;
use crate::tuple::Tuple;

/// Everything an executor needs to run: the catalog, the buffer pool and
/// the (possibly absent) transaction context.
pub struct ExecutorContext {
    catalog: Arc<Catalog>,
    bpm: Arc<BufferPoolManager>,
    txn: Option<Arc<Transaction>>,
}

impl ExecutorContext {
    pub fn new(
        catalog: Arc<Catalog>,
        bpm: Arc<BufferPoolManager>,
        txn: Option<Arc<Transaction>>,
    ) -> Self {
        Self { catalog, bpm, txn }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.txn.as_deref()
    }
}

/// Pull-model operator. `init` prepares state (and may consume the whole
/// child, as aggregation does); `next` produces one row at a time until it
/// returns `None`.
pub trait Executor {
    fn init(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>>;
}
