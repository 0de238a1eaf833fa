use parking_lot::Mutex;

use crate::common::PageId;

/// Opaque operation context threaded through index and heap operations.
///
/// This engine does not implement transactions; the handle only carries the
/// set of pages deleted by structural modifications so a higher layer can
/// clean up after itself. Every operation accepts `None` in its place.
pub struct Transaction {
    id: u64,
    deleted_pages: Mutex<Vec<PageId>>,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            deleted_pages: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_deleted_page(&self, page_id: PageId) {
        self.deleted_pages.lock().push(page_id);
    }

    pub fn deleted_pages(&self) -> Vec<PageId> {
        self.deleted_pages.lock().clone()
    }
}
