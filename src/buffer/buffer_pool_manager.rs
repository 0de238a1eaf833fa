use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, StrataError, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{LruReplacer, Page, PageReadGuard, PageWriteGuard};

/// Map state mutated together: page table and free list.
struct PoolInner {
    /// Page table: maps page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page at all
    free_list: LinkedList<FrameId>,
}

/// State shared with the page guards.
struct PoolState {
    /// The buffer pool frames
    frames: Vec<Arc<Page>>,
    inner: Mutex<PoolInner>,
    /// LRU replacer for eviction decisions
    replacer: LruReplacer,
}

impl PoolState {
    /// Unpins a page, OR-accumulating the dirty flag. When the pin count
    /// reaches zero the frame becomes an eviction candidate. Returns false
    /// for unknown pages or pages that were not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.unpin(frame_id);
        }
        true
    }
}

/// BufferPoolManager mediates between in-memory frames and the disk file.
/// It manages a fixed number of frames, maps page ids onto them, and uses
/// strict LRU replacement among unpinned frames. Dirty pages are always
/// written back before their frame is reused.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    state: Arc<PoolState>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Page::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Fetches a page into the buffer pool, pinning its frame.
    /// The caller must pair this with exactly one `unpin_page`; prefer the
    /// guard-returning `read_page`/`write_page` which do so automatically.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        if page_id == INVALID_PAGE_ID {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.pin(frame_id);
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let data = self.disk_scheduler.schedule_read_sync(page_id)?;
        frame.set_page_id(page_id);
        frame.copy_from(data.as_slice());
        frame.set_dirty(false);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        Ok(Arc::clone(frame))
    }

    /// Allocates a fresh page on disk and installs it in a frame with
    /// `pin_count = 1`. No disk read happens; the frame starts zeroed.
    pub fn new_page(&self) -> Result<(PageId, Arc<Page>)> {
        let mut inner = self.state.inner.lock();

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        Ok((page_id, Arc::clone(frame)))
    }

    /// Decrements a page's pin count; see [`PoolState::unpin_page`].
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Fetches a page and returns a read guard holding its latch.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard> {
        let frame = self.fetch_page(page_id)?;
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            PageReadGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| {
                    state.unpin_page(pid, is_dirty);
                }),
            )
        };
        Ok(guard)
    }

    /// Fetches a page and returns a write guard holding its latch.
    pub fn write_page(&self, page_id: PageId) -> Result<PageWriteGuard> {
        let frame = self.fetch_page(page_id)?;
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            PageWriteGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| {
                    state.unpin_page(pid, is_dirty);
                }),
            )
        };
        Ok(guard)
    }

    /// Allocates a fresh page and returns it under a write guard.
    pub fn new_page_write(&self) -> Result<PageWriteGuard> {
        let (page_id, frame) = self.new_page()?;
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            PageWriteGuard::new(
                page_id,
                frame,
                Box::new(move |pid, is_dirty| {
                    state.unpin_page(pid, is_dirty);
                }),
            )
        };
        Ok(guard)
    }

    /// Writes a page to disk and clears its dirty flag. Pin state is not
    /// consulted. Returns false for unknown pages.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flushes every page currently mapped in the page table.
    pub fn flush_all(&self) -> Result<()> {
        let inner = self.state.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk.
    /// Returns true if the page is gone (including "was never resident"),
    /// false if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() != 0 {
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        self.disk_scheduler
            .disk_manager()
            .deallocate_page(page_id)?;
        Ok(true)
    }

    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Number of frames currently eligible for eviction.
    pub fn evictable_count(&self) -> usize {
        self.state.replacer.size()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Takes a frame from the free list, or evicts the LRU victim. Dirty
    /// victims are written back before the frame is reused.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self
            .state
            .replacer
            .victim()
            .ok_or(StrataError::BufferPoolFull)?;
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            tracing::trace!(page_id = old_page_id.as_u32(), "writing back dirty victim");
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler
                .schedule_write_sync(old_page_id, &data)?;
            frame.set_dirty(false);
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_starts_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _frame) = bpm.new_page().unwrap();
        assert_eq!(page_id, PageId::new(1)); // Page 0 is the header page
        assert_eq!(bpm.get_pin_count(page_id), Some(1));

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_fetch_unpin_accounting() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, _frame) = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);

        bpm.fetch_page(page_id).unwrap();
        bpm.fetch_page(page_id).unwrap();
        assert_eq!(bpm.get_pin_count(page_id), Some(2));

        assert!(bpm.unpin_page(page_id, false));
        assert!(bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(page_id, false)); // Already at zero
    }

    #[test]
    fn test_read_write_guards() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page_write().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
            guard.page_id()
        };

        assert_eq!(bpm.get_pin_count(page_id), Some(0));

        let guard = bpm.read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data()[100], 255);
    }

    #[test]
    fn test_flush_page_persists() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        let page_id;
        {
            let dm = Arc::new(DiskManager::new(&path).unwrap());
            let bpm = BufferPoolManager::new(10, dm);

            page_id = {
                let mut guard = bpm.new_page_write().unwrap();
                guard.data_mut()[0] = 42;
                guard.page_id()
            };
            bpm.flush_page(page_id).unwrap();
        }

        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm2 = BufferPoolManager::new(10, dm);
        let guard = bpm2.read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn test_eviction_writes_back_dirty() {
        let (bpm, _temp) = create_bpm(3);

        let mut ids = Vec::new();
        for i in 0..3u8 {
            let mut guard = bpm.new_page_write().unwrap();
            guard.data_mut()[0] = i;
            ids.push(guard.page_id());
        }
        assert_eq!(bpm.free_frame_count(), 0);
        assert_eq!(bpm.evictable_count(), 3);

        // Evicts the least recently used page.
        let (_p4, frame) = bpm.new_page().unwrap();
        drop(frame);
        assert_eq!(bpm.evictable_count(), 2);

        // The evicted page still reads back correctly from disk.
        let guard = bpm.read_page(ids[0]).unwrap();
        assert_eq!(guard.data()[0], 0);
    }

    #[test]
    fn test_pool_exhaustion() {
        let (bpm, _temp) = create_bpm(2);

        let _g1 = bpm.new_page_write().unwrap();
        let _g2 = bpm.new_page_write().unwrap();

        assert!(matches!(bpm.new_page(), Err(StrataError::BufferPoolFull)));
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let guard = bpm.new_page_write().unwrap();
            guard.page_id()
        };

        // Cannot delete while pinned.
        {
            let _guard = bpm.read_page(page_id).unwrap();
            assert!(!bpm.delete_page(page_id).unwrap());
        }

        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        // Deleting an absent page reports success.
        assert!(bpm.delete_page(page_id).unwrap());
    }

    #[test]
    fn test_fetch_invalid_page_id() {
        let (bpm, _temp) = create_bpm(2);
        assert!(bpm.fetch_page(INVALID_PAGE_ID).is_err());
    }
}
