use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
use crate::common::{PageId, Result, HEADER_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::HeaderPage;
use crate::transaction::Transaction;

use super::btree_page::{
    set_parent_page_id_raw, BTreePageRef, InternalPageMut, InternalPageRef, LeafPageMut,
    LeafPageRef, INTERNAL_HEADER_SIZE, LEAF_HEADER_SIZE,
};
use super::index_iterator::IndexIterator;
use super::key::{KeyComparator, Storable};

/// What a write descent intends to do; decides when a node is "safe"
/// (an insert or removal on it cannot propagate to its parent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

/// Latches accumulated by a write descent: the tree-level root latch plus
/// every ancestor that might still be modified. Releasing the context
/// unlatches and unpins top-down state in one place.
struct Context<'a> {
    /// Held while the root id may still change.
    root_guard: Option<RwLockWriteGuard<'a, PageId>>,
    /// Write-latched unsafe ancestors, top-down; back = deepest.
    write_set: VecDeque<PageWriteGuard>,
}

impl Context<'_> {
    fn release_all(&mut self) {
        self.root_guard.take();
        self.write_set.clear();
    }
}

/// A disk-resident B+Tree index over fixed-width keys and values.
///
/// Nodes are buffer-pool pages; traversal uses latch crabbing (read
/// latches for lookups, conservative write crabbing for mutations). The
/// root page id is owned by the tree, guarded by a tree-level latch, and
/// persisted through the header page whenever it changes.
pub struct BPlusTree<K, V, C> {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
    root_page_id: RwLock<PageId>,
    _marker: PhantomData<(K, V)>,
}

impl<K: Storable, V: Storable, C: KeyComparator<K>> BPlusTree<K, V, C> {
    /// Opens (or registers) the index named `index_name`. The root page id
    /// is loaded from the header page if the index already exists.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let index_name = index_name.into();
        assert!(leaf_max_size >= 2 && leaf_max_size < Self::leaf_capacity());
        assert!(internal_max_size >= 3 && internal_max_size < Self::internal_capacity());

        let root_page_id = {
            let mut guard = bpm.write_page(HEADER_PAGE_ID)?;
            let mut header = HeaderPage::new(guard.data_mut());
            match header.get_record(&index_name) {
                Some(root) => root,
                None => {
                    if !header.insert_record(&index_name, INVALID_PAGE_ID) {
                        return Err(crate::common::StrataError::HeaderPageFull);
                    }
                    INVALID_PAGE_ID
                }
            }
        };

        Ok(Self {
            index_name,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_page_id: RwLock::new(root_page_id),
            _marker: PhantomData,
        })
    }

    /// Opens the index with the largest node sizes the page format allows
    /// (one slot is reserved for the transient overflow before a split).
    pub fn with_default_sizes(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
    ) -> Result<Self> {
        Self::new(
            index_name,
            bpm,
            comparator,
            Self::leaf_capacity() - 1,
            Self::internal_capacity() - 1,
        )
    }

    fn leaf_capacity() -> usize {
        (PAGE_SIZE - LEAF_HEADER_SIZE) / (K::SIZE + V::SIZE)
    }

    fn internal_capacity() -> usize {
        (PAGE_SIZE - INTERNAL_HEADER_SIZE) / (K::SIZE + PageId::SIZE)
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.read() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    /// Point lookup.
    pub fn get_value(&self, key: &K) -> Result<Option<V>> {
        let Some(guard) = self.find_leaf_read(Some(key))? else {
            return Ok(None);
        };
        let leaf = LeafPageRef::<K, V>::new(guard.data());
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a unique key. Returns false if the key already exists.
    pub fn insert(&self, key: &K, value: &V, txn: Option<&Transaction>) -> Result<bool> {
        let (mut ctx, leaf_guard) = self.find_leaf_write(key, WriteOp::Insert)?;

        let Some(mut leaf_guard) = leaf_guard else {
            self.start_new_tree(&mut ctx, key, value)?;
            return Ok(true);
        };

        let overflow = {
            let mut leaf = LeafPageMut::<K, V>::new(leaf_guard.data_mut());
            if leaf.lookup(key, &self.comparator).is_some() {
                return Ok(false);
            }
            leaf.insert(key, value, &self.comparator) > leaf.max_size()
        };

        if overflow {
            self.split_leaf(&mut ctx, leaf_guard, txn)?;
        }
        Ok(true)
    }

    /// Removes a key if present. Underfull leaves trigger redistribution
    /// or coalescing up the tree.
    pub fn remove(&self, key: &K, txn: Option<&Transaction>) -> Result<()> {
        let (mut ctx, leaf_guard) = self.find_leaf_write(key, WriteOp::Remove)?;

        let Some(mut leaf_guard) = leaf_guard else {
            return Ok(());
        };

        let underflow = {
            let mut leaf = LeafPageMut::<K, V>::new(leaf_guard.data_mut());
            leaf.remove_and_delete_record(key, &self.comparator) < leaf.min_size()
        };

        if underflow {
            self.coalesce_or_redistribute_leaf(&mut ctx, leaf_guard, txn)?;
        }
        Ok(())
    }

    /// Iterator positioned at the first entry of the tree.
    pub fn begin(&self) -> Result<IndexIterator<K, V>> {
        // The iterator takes its own pin while the leaf is still latched.
        let guard = self.find_leaf_read(None)?;
        let iter = IndexIterator::new(
            Arc::clone(&self.bpm),
            guard.as_ref().map(|g| g.page_id()),
            0,
        );
        Ok(iter)
    }

    /// Iterator positioned at the first entry with key >= `key`.
    pub fn begin_at(&self, key: &K) -> Result<IndexIterator<K, V>> {
        let Some(guard) = self.find_leaf_read(Some(key))? else {
            return Ok(IndexIterator::new(Arc::clone(&self.bpm), None, 0));
        };
        let index = LeafPageRef::<K, V>::new(guard.data()).key_index(key, &self.comparator);
        let iter = IndexIterator::new(Arc::clone(&self.bpm), Some(guard.page_id()), index);
        Ok(iter)
    }

    // -----------------------------------------------------------------
    // Descent
    // -----------------------------------------------------------------

    /// Read-crabs from the root to a leaf: the child's latch is taken
    /// before the parent's is released. `None` key means leftmost.
    fn find_leaf_read(&self, key: Option<&K>) -> Result<Option<PageReadGuard>> {
        let root_lock = self.root_page_id.read();
        let root_id = *root_lock;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.bpm.read_page(root_id)?;
        drop(root_lock);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                return Ok(Some(guard));
            }
            let internal = InternalPageRef::<K>::new(guard.data());
            let child_id = match key {
                Some(key) => internal.lookup(key, &self.comparator),
                None => internal.value_at(0),
            };
            let child = self.bpm.read_page(child_id)?;
            guard = child;
        }
    }

    /// Write-crabs from the root to the leaf for `key`. Ancestors stay
    /// latched in the context until the current node is safe for `op`;
    /// the virtual latch above the root is the tree-level root latch.
    /// Returns `None` as the leaf when the tree is empty.
    fn find_leaf_write(
        &self,
        key: &K,
        op: WriteOp,
    ) -> Result<(Context<'_>, Option<PageWriteGuard>)> {
        let mut ctx = Context {
            root_guard: Some(self.root_page_id.write()),
            write_set: VecDeque::new(),
        };

        let root_id = **ctx.root_guard.as_ref().unwrap();
        if root_id == INVALID_PAGE_ID {
            return Ok((ctx, None));
        }

        let mut guard = self.bpm.write_page(root_id)?;
        loop {
            let (is_leaf, is_safe, child_id) = {
                let page = BTreePageRef::new(guard.data());
                let is_safe = Self::is_safe(&page, op);
                let child_id = if page.is_leaf() {
                    INVALID_PAGE_ID
                } else {
                    InternalPageRef::<K>::new(guard.data()).lookup(key, &self.comparator)
                };
                (page.is_leaf(), is_safe, child_id)
            };

            if is_safe {
                ctx.release_all();
            }
            if is_leaf {
                return Ok((ctx, Some(guard)));
            }

            let child = self.bpm.write_page(child_id)?;
            ctx.write_set.push_back(guard);
            guard = child;
        }
    }

    /// A node is safe when the pending operation on it cannot propagate
    /// upward: room for one more entry on insert, one above the floor on
    /// remove. Root floors are relaxed to the adjust-root thresholds.
    fn is_safe(page: &BTreePageRef<'_>, op: WriteOp) -> bool {
        match op {
            WriteOp::Insert => page.size() < page.max_size(),
            WriteOp::Remove => {
                if page.is_root() {
                    if page.is_leaf() {
                        page.size() > 1
                    } else {
                        page.size() > 2
                    }
                } else {
                    page.size() > page.min_size()
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Insert path
    // -----------------------------------------------------------------

    fn start_new_tree(&self, ctx: &mut Context<'_>, key: &K, value: &V) -> Result<()> {
        let mut guard = self.bpm.new_page_write()?;
        let root_id = guard.page_id();

        let mut leaf = LeafPageMut::<K, V>::new(guard.data_mut());
        leaf.init(root_id, INVALID_PAGE_ID, self.leaf_max_size);
        leaf.insert(key, value, &self.comparator);

        self.set_root_page_id(ctx, root_id)?;
        tracing::debug!(index = %self.index_name, root = root_id.as_u32(), "started new tree");
        Ok(())
    }

    /// Splits an overflowing leaf: half the entries move to a fresh right
    /// sibling, the chain is spliced, and the sibling's first key is
    /// promoted into the parent.
    fn split_leaf(
        &self,
        ctx: &mut Context<'_>,
        mut leaf_guard: PageWriteGuard,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        let mut new_guard = self.bpm.new_page_write()?;
        let new_page_id = new_guard.page_id();
        let old_page_id = leaf_guard.page_id();

        let separator = {
            let mut leaf = LeafPageMut::<K, V>::new(leaf_guard.data_mut());
            let mut new_leaf = LeafPageMut::<K, V>::new(new_guard.data_mut());
            new_leaf.init(new_page_id, leaf.parent_page_id(), self.leaf_max_size);

            leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(new_page_id);
            new_leaf.key_at(0)
        };

        tracing::debug!(
            index = %self.index_name,
            old = old_page_id.as_u32(),
            new = new_page_id.as_u32(),
            "leaf split"
        );

        // Both halves are final; release them before touching the parent
        // so child re-parenting in ancestor splits never meets a latch we
        // already hold.
        drop(leaf_guard);
        drop(new_guard);

        self.insert_into_parent(ctx, old_page_id, separator, new_page_id, txn)
    }

    /// Inserts the separator produced by a split into the parent of
    /// `old_id`, splitting ancestors as needed. When `old_id` was the
    /// root, a new root is created above both halves.
    fn insert_into_parent(
        &self,
        ctx: &mut Context<'_>,
        old_id: PageId,
        key: K,
        new_id: PageId,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        if ctx.write_set.is_empty() {
            // `old_id` was the root; the root latch is still held because a
            // full root is never safe.
            let mut root_guard = self.bpm.new_page_write()?;
            let new_root_id = root_guard.page_id();

            let mut new_root = InternalPageMut::<K>::new(root_guard.data_mut());
            new_root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
            new_root.populate_new_root(old_id, &key, new_id);
            drop(root_guard);

            self.adopt(old_id, new_root_id)?;
            self.adopt(new_id, new_root_id)?;

            self.set_root_page_id(ctx, new_root_id)?;
            tracing::debug!(index = %self.index_name, root = new_root_id.as_u32(), "new root");
            return Ok(());
        }

        let mut parent_guard = ctx.write_set.pop_back().unwrap();
        let overflow = {
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());
            parent.insert_node_after(old_id, &key, new_id) > parent.max_size()
        };
        if !overflow {
            return Ok(());
        }

        // Split the parent and keep promoting.
        let mut new_parent_guard = self.bpm.new_page_write()?;
        let new_parent_id = new_parent_guard.page_id();
        let parent_id = parent_guard.page_id();

        let separator = {
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());
            let mut new_parent = InternalPageMut::<K>::new(new_parent_guard.data_mut());
            new_parent.init(new_parent_id, parent.parent_page_id(), self.internal_max_size);
            parent.move_half_to(&mut new_parent, &self.bpm)?;
            new_parent.key_at(0)
        };

        tracing::debug!(
            index = %self.index_name,
            old = parent_id.as_u32(),
            new = new_parent_id.as_u32(),
            "internal split"
        );

        drop(parent_guard);
        drop(new_parent_guard);

        self.insert_into_parent(ctx, parent_id, separator, new_parent_id, txn)
    }

    // -----------------------------------------------------------------
    // Remove path
    // -----------------------------------------------------------------

    /// Rebalances an underfull leaf by borrowing from or merging with a
    /// sibling. The parent write latch is guaranteed to be in the context
    /// because an unsafe child never releases its ancestors.
    fn coalesce_or_redistribute_leaf(
        &self,
        ctx: &mut Context<'_>,
        mut node_guard: PageWriteGuard,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        if BTreePageRef::new(node_guard.data()).is_root() {
            return self.adjust_root(ctx, node_guard, txn);
        }

        let mut parent_guard = ctx
            .write_set
            .pop_back()
            .expect("parent latch must be retained for an unsafe child");

        let node_id = node_guard.page_id();
        let (sibling_id, node_index, sibling_is_left) = {
            let parent = InternalPageRef::<K>::new(parent_guard.data());
            let node_index = parent
                .value_index(node_id)
                .expect("node must be a child of its parent");
            if node_index == 0 {
                (parent.value_at(1), 0, false)
            } else {
                (parent.value_at(node_index - 1), node_index, true)
            }
        };
        let mut sibling_guard = self.bpm.write_page(sibling_id)?;

        let can_redistribute = {
            let node = LeafPageRef::<K, V>::new(node_guard.data());
            let sibling = LeafPageRef::<K, V>::new(sibling_guard.data());
            sibling.size() + node.size() > node.max_size()
        };

        if can_redistribute {
            let mut node = LeafPageMut::<K, V>::new(node_guard.data_mut());
            let mut sibling = LeafPageMut::<K, V>::new(sibling_guard.data_mut());
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());

            if sibling_is_left {
                sibling.move_last_to_front_of(&mut node);
                parent.set_key_at(node_index, &node.key_at(0));
            } else {
                sibling.move_first_to_end_of(&mut node);
                parent.set_key_at(1, &sibling.key_at(0));
            }
            tracing::debug!(index = %self.index_name, node = node_id.as_u32(), "leaf redistribute");
            return Ok(());
        }

        // Coalesce. Swapping so the right-hand page always drains into the
        // left-hand one keeps a single merge path.
        let (mut left_guard, mut right_guard, right_index) = if sibling_is_left {
            (sibling_guard, node_guard, node_index)
        } else {
            (node_guard, sibling_guard, 1)
        };

        {
            let mut left = LeafPageMut::<K, V>::new(left_guard.data_mut());
            let mut right = LeafPageMut::<K, V>::new(right_guard.data_mut());
            right.move_all_to(&mut left);
        }
        let right_id = right_guard.page_id();
        tracing::debug!(
            index = %self.index_name,
            merged = right_id.as_u32(),
            into = left_guard.page_id().as_u32(),
            "leaf coalesce"
        );

        drop(left_guard);
        drop(right_guard);
        self.delete_node_page(right_id, txn)?;

        let parent_underflow = {
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());
            parent.remove(right_index);
            parent.size() < parent.min_size()
        };

        if parent_underflow {
            self.coalesce_or_redistribute_internal(ctx, parent_guard, txn)?;
        }
        Ok(())
    }

    /// Same as [`Self::coalesce_or_redistribute_leaf`] for internal nodes;
    /// separator keys rotate through the parent rather than being copied.
    fn coalesce_or_redistribute_internal(
        &self,
        ctx: &mut Context<'_>,
        mut node_guard: PageWriteGuard,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        if BTreePageRef::new(node_guard.data()).is_root() {
            return self.adjust_root(ctx, node_guard, txn);
        }

        let mut parent_guard = ctx
            .write_set
            .pop_back()
            .expect("parent latch must be retained for an unsafe child");

        let node_id = node_guard.page_id();
        let (sibling_id, node_index, sibling_is_left) = {
            let parent = InternalPageRef::<K>::new(parent_guard.data());
            let node_index = parent
                .value_index(node_id)
                .expect("node must be a child of its parent");
            if node_index == 0 {
                (parent.value_at(1), 0, false)
            } else {
                (parent.value_at(node_index - 1), node_index, true)
            }
        };
        let mut sibling_guard = self.bpm.write_page(sibling_id)?;

        let can_redistribute = {
            let node = InternalPageRef::<K>::new(node_guard.data());
            let sibling = InternalPageRef::<K>::new(sibling_guard.data());
            sibling.size() + node.size() > node.max_size()
        };

        if can_redistribute {
            let mut node = InternalPageMut::<K>::new(node_guard.data_mut());
            let mut sibling = InternalPageMut::<K>::new(sibling_guard.data_mut());
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());

            if sibling_is_left {
                // Pull the separator down in front of the node, push the
                // donor's last key up in its place.
                let middle_key = parent.key_at(node_index);
                sibling.move_last_to_front_of(&mut node, &middle_key, &self.bpm)?;
                parent.set_key_at(node_index, &node.key_at(0));
            } else {
                // The donor sits at parent index 1; its separator is the
                // one that moves down.
                let middle_key = parent.key_at(1);
                sibling.move_first_to_end_of(&mut node, &middle_key, &self.bpm)?;
                parent.set_key_at(1, &sibling.key_at(0));
            }
            tracing::debug!(index = %self.index_name, node = node_id.as_u32(), "internal redistribute");
            return Ok(());
        }

        let (mut left_guard, mut right_guard, right_index) = if sibling_is_left {
            (sibling_guard, node_guard, node_index)
        } else {
            (node_guard, sibling_guard, 1)
        };

        {
            let parent = InternalPageRef::<K>::new(parent_guard.data());
            let middle_key = parent.key_at(right_index);
            let mut left = InternalPageMut::<K>::new(left_guard.data_mut());
            let mut right = InternalPageMut::<K>::new(right_guard.data_mut());
            right.move_all_to(&mut left, &middle_key, &self.bpm)?;
        }
        let right_id = right_guard.page_id();
        tracing::debug!(
            index = %self.index_name,
            merged = right_id.as_u32(),
            into = left_guard.page_id().as_u32(),
            "internal coalesce"
        );

        drop(left_guard);
        drop(right_guard);
        self.delete_node_page(right_id, txn)?;

        let parent_underflow = {
            let mut parent = InternalPageMut::<K>::new(parent_guard.data_mut());
            parent.remove(right_index);
            parent.size() < parent.min_size()
        };

        if parent_underflow {
            self.coalesce_or_redistribute_internal(ctx, parent_guard, txn)?;
        }
        Ok(())
    }

    /// Shrinks the tree at the top: an internal root with a single child
    /// promotes that child; an empty leaf root empties the tree.
    fn adjust_root(
        &self,
        ctx: &mut Context<'_>,
        mut root_guard: PageWriteGuard,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        let (is_leaf, size) = {
            let page = BTreePageRef::new(root_guard.data());
            (page.is_leaf(), page.size())
        };
        let old_root_id = root_guard.page_id();

        if !is_leaf && size == 1 {
            let new_root_id = {
                let mut root = InternalPageMut::<K>::new(root_guard.data_mut());
                root.remove_and_return_only_child()
            };
            drop(root_guard);

            {
                let mut guard = self.bpm.write_page(new_root_id)?;
                set_parent_page_id_raw(guard.data_mut(), INVALID_PAGE_ID);
            }
            self.set_root_page_id(ctx, new_root_id)?;
            self.delete_node_page(old_root_id, txn)?;
            tracing::debug!(index = %self.index_name, root = new_root_id.as_u32(), "root collapsed");
        } else if is_leaf && size == 0 {
            drop(root_guard);
            self.set_root_page_id(ctx, INVALID_PAGE_ID)?;
            self.delete_node_page(old_root_id, txn)?;
            tracing::debug!(index = %self.index_name, "tree emptied");
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Rewrites a node's parent pointer through the buffer pool. The
    /// caller must not hold the node's latch.
    fn adopt(&self, child: PageId, parent: PageId) -> Result<()> {
        let mut guard = self.bpm.write_page(child)?;
        set_parent_page_id_raw(guard.data_mut(), parent);
        Ok(())
    }

    /// The single mutation path for the root id: updates the in-memory
    /// copy under the held root latch and the persisted header record.
    fn set_root_page_id(&self, ctx: &mut Context<'_>, new_root: PageId) -> Result<()> {
        let root_guard = ctx
            .root_guard
            .as_mut()
            .expect("root latch must be held to change the root");
        **root_guard = new_root;

        let mut guard = self.bpm.write_page(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        header.update_record(&self.index_name, new_root);
        Ok(())
    }

    /// Returns a no-longer-referenced node page to the buffer pool and
    /// records it on the transaction for higher-level cleanup.
    fn delete_node_page(&self, page_id: PageId, txn: Option<&Transaction>) -> Result<()> {
        self.bpm.delete_page(page_id)?;
        if let Some(txn) = txn {
            txn.add_deleted_page(page_id);
        }
        Ok(())
    }
}
