//! Strata - the storage and indexing core of a disk-backed relational
//! engine.
//!
//! Data lives in fixed-size pages in a single database file. A buffer pool
//! caches pages in memory frames with pin-reference counting and strict
//! LRU eviction; everything above it borrows pages through RAII guards
//! that pair each fetch with exactly one unpin.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page I/O and page organization
//!   - `DiskManager` / `DiskScheduler`: synchronous page store behind a
//!     background I/O worker
//!   - `HeaderPage`: reserved page 0, maps index names to root pages
//!   - `TablePage` / `TableHeap`: slotted tuple pages chained into heaps
//!
//! - **Buffer Pool** (`buffer`): `BufferPoolManager`, `LruReplacer`, and
//!   the `PageReadGuard`/`PageWriteGuard` pair
//!
//! - **Index** (`index`): a concurrent `BPlusTree` over generic keys,
//!   traversed with latch crabbing, plus its forward `IndexIterator`
//!
//! - **Catalog** (`catalog`): in-memory table and index registry
//!
//! - **Execution** (`execution`): pull-model executors (sequential scan,
//!   insert, delete, hash aggregation) over the heap and index layers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::index::{BPlusTree, OrdComparator};
//! use strata::storage::disk::DiskManager;
//! use strata::common::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//!
//! let tree = BPlusTree::<i64, RecordId, _>::with_default_sizes(
//!     "demo_index",
//!     bpm.clone(),
//!     OrdComparator::new(),
//! )
//! .unwrap();
//!
//! let rid = RecordId::new(PageId::new(100), SlotId::new(0));
//! tree.insert(&42, &rid, None).unwrap();
//! assert_eq!(tree.get_value(&42).unwrap(), Some(rid));
//!
//! bpm.flush_all().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod index;
pub mod storage;
pub mod transaction;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StrataError};
pub use transaction::Transaction;
