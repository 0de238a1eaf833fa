pub mod btree;
pub mod btree_page;
pub mod index_iterator;
pub mod key;

pub use btree::BPlusTree;
pub use btree_page::{
    BTreePageRef, BTreePageType, InternalPageMut, InternalPageRef, LeafPageMut, LeafPageRef,
};
pub use index_iterator::IndexIterator;
pub use key::{GenericComparator, GenericKey, KeyComparator, OrdComparator, Storable};
