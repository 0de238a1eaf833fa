use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{RecordId, Result, StrataError, TableOid};
use crate::index::{BPlusTree, GenericComparator, GenericKey};
use crate::storage::TableHeap;
use crate::transaction::Transaction;
use crate::tuple::{Schema, Tuple};

/// Serialized width of index keys produced from key tuples.
pub const INDEX_KEY_SIZE: usize = 8;

pub type IndexKey = GenericKey<INDEX_KEY_SIZE>;
type IndexTree = BPlusTree<IndexKey, RecordId, GenericComparator<INDEX_KEY_SIZE>>;

/// An executor-facing secondary index: a B+Tree keyed by the columns in
/// `key_attrs`, mapping key tuples to record ids.
pub struct Index {
    name: String,
    key_schema: Arc<Schema>,
    key_attrs: Vec<usize>,
    tree: IndexTree,
}

impl Index {
    fn new(
        name: String,
        bpm: Arc<BufferPoolManager>,
        key_schema: Arc<Schema>,
        key_attrs: Vec<usize>,
    ) -> Result<Self> {
        let tree = BPlusTree::with_default_sizes(
            name.clone(),
            bpm,
            GenericComparator::new(Arc::clone(&key_schema)),
        )?;
        Ok(Self {
            name,
            key_schema,
            key_attrs,
            tree,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_schema(&self) -> &Arc<Schema> {
        &self.key_schema
    }

    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    /// Inserts a key tuple. Returns false on a duplicate key.
    pub fn insert_entry(
        &self,
        key_tuple: &Tuple,
        rid: RecordId,
        txn: Option<&Transaction>,
    ) -> Result<bool> {
        let key = IndexKey::from_tuple(key_tuple).ok_or(StrataError::TupleSerialization)?;
        self.tree.insert(&key, &rid, txn)
    }

    /// Removes a key tuple's entry if present.
    pub fn delete_entry(
        &self,
        key_tuple: &Tuple,
        _rid: RecordId,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        let key = IndexKey::from_tuple(key_tuple).ok_or(StrataError::TupleSerialization)?;
        self.tree.remove(&key, txn)
    }

    /// Point lookup by key tuple.
    pub fn get_value(&self, key_tuple: &Tuple) -> Result<Option<RecordId>> {
        let key = IndexKey::from_tuple(key_tuple).ok_or(StrataError::TupleSerialization)?;
        self.tree.get_value(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Catalog entry for a table.
pub struct TableInfo {
    pub name: String,
    pub schema: Arc<Schema>,
    pub table: Arc<TableHeap>,
    pub oid: TableOid,
}

/// Catalog entry for an index over a table.
pub struct IndexInfo {
    pub name: String,
    pub table_name: String,
    pub index: Arc<Index>,
    pub key_schema: Arc<Schema>,
    pub key_attrs: Vec<usize>,
}

/// In-memory registry of tables and their indexes. Table heaps and index
/// roots live in the shared buffer pool; the registry itself is not
/// persisted.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: Mutex<HashMap<TableOid, Arc<TableInfo>>>,
    table_names: Mutex<HashMap<String, TableOid>>,
    indexes: Mutex<HashMap<String, Vec<Arc<IndexInfo>>>>,
    next_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: Mutex::new(HashMap::new()),
            table_names: Mutex::new(HashMap::new()),
            indexes: Mutex::new(HashMap::new()),
            next_oid: AtomicU32::new(0),
        }
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<TableInfo>> {
        let name = name.into();
        let mut table_names = self.table_names.lock();
        if table_names.contains_key(&name) {
            return Err(StrataError::TableAlreadyExists(name));
        }

        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(TableHeap::new(Arc::clone(&self.bpm))?);
        let info = Arc::new(TableInfo {
            name: name.clone(),
            schema: Arc::new(schema),
            table,
            oid,
        });

        table_names.insert(name, oid);
        self.tables.lock().insert(oid, Arc::clone(&info));
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.tables.lock().get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let oid = *self.table_names.lock().get(name)?;
        self.get_table(oid)
    }

    /// Creates a B+Tree index over `key_attrs` of an existing table.
    pub fn create_index(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>> {
        let index_name = index_name.into();
        let table_info = self
            .get_table_by_name(table_name)
            .ok_or_else(|| StrataError::TableNotFound(table_name.to_string()))?;

        let key_schema = Arc::new(
            table_info
                .schema
                .project(&key_attrs)
                .ok_or(StrataError::TupleSerialization)?,
        );

        let index = Arc::new(Index::new(
            index_name.clone(),
            Arc::clone(&self.bpm),
            Arc::clone(&key_schema),
            key_attrs.clone(),
        )?);

        let info = Arc::new(IndexInfo {
            name: index_name,
            table_name: table_name.to_string(),
            index,
            key_schema,
            key_attrs,
        });

        self.indexes
            .lock()
            .entry(table_name.to_string())
            .or_default()
            .push(Arc::clone(&info));
        Ok(info)
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.indexes
            .lock()
            .get(table_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use crate::tuple::{DataType, TupleBuilder};
    use tempfile::NamedTempFile;

    fn create_catalog() -> (Catalog, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        (Catalog::new(bpm), temp_file)
    }

    fn test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(32))
            .build()
    }

    #[test]
    fn test_catalog_create_and_lookup() {
        let (catalog, _temp) = create_catalog();

        let info = catalog.create_table("users", test_schema()).unwrap();
        assert_eq!(info.name, "users");
        assert_eq!(catalog.get_table(info.oid).unwrap().oid, info.oid);
        assert!(catalog.get_table_by_name("users").is_some());
        assert!(catalog.get_table_by_name("ghosts").is_none());

        assert!(catalog.create_table("users", test_schema()).is_err());
    }

    #[test]
    fn test_catalog_create_index_and_probe() {
        let (catalog, _temp) = create_catalog();
        let info = catalog.create_table("users", test_schema()).unwrap();

        let index_info = catalog.create_index("users_pk", "users", vec![0]).unwrap();
        assert_eq!(index_info.key_schema.column_count(), 1);
        assert_eq!(catalog.get_table_indexes("users").len(), 1);
        assert!(catalog.get_table_indexes("orders").is_empty());

        // Insert through the heap + index pair and probe back.
        let tuple = TupleBuilder::new(Arc::clone(&info.schema))
            .value(42)
            .value("alice")
            .build();
        let rid = info
            .table
            .insert_tuple(&tuple.to_bytes().unwrap(), None)
            .unwrap();

        let key = tuple.key_from_tuple(Arc::clone(&index_info.key_schema), &index_info.key_attrs);
        assert!(index_info.index.insert_entry(&key, rid, None).unwrap());
        assert_eq!(index_info.index.get_value(&key).unwrap(), Some(rid));

        index_info.index.delete_entry(&key, rid, None).unwrap();
        assert_eq!(index_info.index.get_value(&key).unwrap(), None);
    }
}
