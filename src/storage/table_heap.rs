use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, SlotId};
use crate::storage::page::{TablePage, TablePageRef};
use crate::transaction::Transaction;

/// A heap file: an unordered collection of tuples spread over a chain of
/// slotted pages. Insertion is first-fit along the chain, appending a new
/// page when every existing page is full.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    /// Serializes page-chain extension so two inserts cannot both append.
    append_latch: Mutex<()>,
}

impl TableHeap {
    /// Creates a heap with one empty page.
    pub fn new(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let first_page_id = {
            let mut guard = bpm.new_page_write()?;
            let page_id = guard.page_id();
            let mut page = TablePage::new(guard.data_mut());
            page.init(page_id);
            page_id
        };

        Ok(Self {
            bpm,
            first_page_id,
            append_latch: Mutex::new(()),
        })
    }

    /// Reopens a heap whose first page already exists.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            first_page_id,
            append_latch: Mutex::new(()),
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Inserts a tuple, walking the page chain for the first page with
    /// room.
    pub fn insert_tuple(&self, tuple: &[u8], _txn: Option<&Transaction>) -> Result<RecordId> {
        let _append = self.append_latch.lock();

        let mut page_id = self.first_page_id;
        loop {
            let mut guard = self.bpm.write_page(page_id)?;
            let mut page = TablePage::new(guard.data_mut());

            if page.has_room_for(tuple.len()) {
                return page.insert_tuple(tuple);
            }

            match page.next_page_id() {
                Some(next) => {
                    drop(guard);
                    page_id = next;
                }
                None => {
                    // Chain exhausted: append a fresh page and link it.
                    let mut new_guard = self.bpm.new_page_write()?;
                    let new_page_id = new_guard.page_id();
                    let mut new_page = TablePage::new(new_guard.data_mut());
                    new_page.init(new_page_id);
                    let rid = new_page.insert_tuple(tuple)?;

                    let mut page = TablePage::new(guard.data_mut());
                    page.set_next_page_id(Some(new_page_id));
                    return Ok(rid);
                }
            }
        }
    }

    /// Returns the tuple bytes at `rid`, or None if the slot was deleted.
    pub fn get_tuple(&self, rid: RecordId, _txn: Option<&Transaction>) -> Result<Option<Vec<u8>>> {
        let guard = self.bpm.read_page(rid.page_id)?;
        let page = TablePageRef::new(guard.data());
        Ok(page.tuple_at(rid.slot_id)?.map(|bytes| bytes.to_vec()))
    }

    /// Deletes the tuple at `rid`. Returns false if it was already gone.
    pub fn apply_delete(&self, rid: RecordId, _txn: Option<&Transaction>) -> Result<bool> {
        let mut guard = self.bpm.write_page(rid.page_id)?;
        let mut page = TablePage::new(guard.data_mut());
        page.delete_tuple(rid.slot_id)
    }

    /// Iterates every live tuple in page/slot order.
    pub fn iter(self: Arc<Self>) -> TableIterator {
        let first = self.first_page_id;
        TableIterator {
            heap: self,
            current_page_id: Some(first),
            next_slot: 0,
        }
    }
}

/// Forward iterator over a table heap, yielding `(RecordId, tuple bytes)`.
pub struct TableIterator {
    heap: Arc<TableHeap>,
    current_page_id: Option<PageId>,
    next_slot: u16,
}

impl Iterator for TableIterator {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page_id = self.current_page_id?;

            let guard = match self.heap.bpm.read_page(page_id) {
                Ok(guard) => guard,
                Err(e) => {
                    self.current_page_id = None;
                    return Some(Err(e));
                }
            };
            let page = TablePageRef::new(guard.data());

            while self.next_slot < page.num_slots() {
                let slot = SlotId::new(self.next_slot);
                self.next_slot += 1;

                match page.tuple_at(slot) {
                    Ok(Some(bytes)) => {
                        return Some(Ok((RecordId::new(page_id, slot), bytes.to_vec())));
                    }
                    Ok(None) => continue, // Deleted slot
                    Err(e) => {
                        self.current_page_id = None;
                        return Some(Err(e));
                    }
                }
            }

            self.current_page_id = page.next_page_id();
            self.next_slot = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn create_heap() -> (Arc<TableHeap>, Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(16, dm));
        let heap = Arc::new(TableHeap::new(bpm.clone()).unwrap());
        (heap, bpm, temp_file)
    }

    #[test]
    fn test_table_heap_insert_get() {
        let (heap, _bpm, _temp) = create_heap();

        let rid = heap.insert_tuple(b"alpha", None).unwrap();
        assert_eq!(heap.get_tuple(rid, None).unwrap(), Some(b"alpha".to_vec()));
    }

    #[test]
    fn test_table_heap_delete() {
        let (heap, _bpm, _temp) = create_heap();

        let rid = heap.insert_tuple(b"beta", None).unwrap();
        assert!(heap.apply_delete(rid, None).unwrap());
        assert_eq!(heap.get_tuple(rid, None).unwrap(), None);
        assert!(!heap.apply_delete(rid, None).unwrap());
    }

    #[test]
    fn test_table_heap_spills_to_new_page() {
        let (heap, _bpm, _temp) = create_heap();

        // Insert enough 512-byte tuples to need several pages.
        let tuple = [9u8; 512];
        let rids: Vec<_> = (0..20)
            .map(|_| heap.insert_tuple(&tuple, None).unwrap())
            .collect();

        let distinct_pages: std::collections::HashSet<_> =
            rids.iter().map(|r| r.page_id).collect();
        assert!(distinct_pages.len() > 1);

        for rid in rids {
            assert_eq!(heap.get_tuple(rid, None).unwrap(), Some(tuple.to_vec()));
        }
    }

    #[test]
    fn test_table_heap_iterator_skips_deleted() {
        let (heap, _bpm, _temp) = create_heap();

        let r1 = heap.insert_tuple(b"one", None).unwrap();
        let r2 = heap.insert_tuple(b"two", None).unwrap();
        let r3 = heap.insert_tuple(b"three", None).unwrap();
        heap.apply_delete(r2, None).unwrap();

        let rows: Vec<_> = Arc::clone(&heap).iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (r1, b"one".to_vec()));
        assert_eq!(rows[1], (r3, b"three".to_vec()));
    }
}
