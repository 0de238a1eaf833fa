use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, Page};
use crate::common::{PageId, INVALID_PAGE_ID};

use super::btree_page::LeafPageRef;
use super::key::Storable;

/// Forward iterator over the leaf chain of a B+Tree.
///
/// Between calls the iterator holds a pin (no latch) on exactly one leaf;
/// each step takes the leaf's read latch just long enough to copy an
/// entry out. Crossing a leaf boundary pins the next leaf before the
/// previous one is unpinned. Not restartable.
pub struct IndexIterator<K, V> {
    bpm: Arc<BufferPoolManager>,
    page: Option<Arc<Page>>,
    index: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K: Storable, V: Storable> IndexIterator<K, V> {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        start_leaf: Option<PageId>,
        index: usize,
    ) -> Self {
        let page = start_leaf.and_then(|page_id| bpm.fetch_page(page_id).ok());
        Self {
            bpm,
            page,
            index,
            _marker: PhantomData,
        }
    }

    /// True when no entries remain: past the last entry of a leaf with no
    /// successor, or detached entirely.
    pub fn is_end(&self) -> bool {
        match &self.page {
            None => true,
            Some(page) => {
                let data = page.data.read();
                let leaf = LeafPageRef::<K, V>::new(&data[..]);
                self.index >= leaf.size() && leaf.next_page_id() == INVALID_PAGE_ID
            }
        }
    }

    fn release(&mut self) {
        if let Some(page) = self.page.take() {
            self.bpm.unpin_page(page.page_id(), false);
        }
    }
}

impl<K: Storable, V: Storable> Iterator for IndexIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.page.as_ref()?;

            let (entry, next_page_id) = {
                let data = page.data.read();
                let leaf = LeafPageRef::<K, V>::new(&data[..]);
                if self.index < leaf.size() {
                    let entry = (leaf.key_at(self.index), leaf.value_at(self.index));
                    (Some(entry), INVALID_PAGE_ID)
                } else {
                    (None, leaf.next_page_id())
                }
            };

            if let Some(entry) = entry {
                self.index += 1;
                return Some(entry);
            }
            if next_page_id == INVALID_PAGE_ID {
                self.release();
                return None;
            }

            // Pin the next leaf before unpinning the previous one.
            let next_page = match self.bpm.fetch_page(next_page_id) {
                Ok(page) => page,
                Err(_) => {
                    self.release();
                    return None;
                }
            };
            let prev_id = page.page_id();
            self.bpm.unpin_page(prev_id, false);
            self.page = Some(next_page);
            self.index = 0;
        }
    }
}

impl<K, V> Drop for IndexIterator<K, V> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.bpm.unpin_page(page.page_id(), false);
        }
    }
}
