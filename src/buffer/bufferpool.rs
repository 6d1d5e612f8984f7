use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::buffer::guard::{PageGuard, ReadPageGuard, WritePageGuard};
use crate::buffer::replacer::SyncLRUKReplacer;
use crate::buffer::{AccessType, Replacer};
use crate::config::Config;
use crate::error::Result;
use crate::storage::new_disk_manager;
use crate::storage::page::{Frame, FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::scheduler::{DiskRequest, DiskScheduler};
use crate::storage::wal::LogManager;

/// The buffer pool caches fixed-size disk pages in a fixed set of
/// in-memory frames and moves them back and forth from stable storage.
/// Callers ask for a page by its id and do not know whether it is
/// already resident or has to be read from disk first.
pub(crate) struct BufferPool {
    /// frame slots; the index into this array is the FrameId.
    frames: Vec<Arc<Frame>>,
    /// tracks which frame holds which resident page.
    page_table: HashMap<PageId, FrameId>,
    /// frames currently holding no page.
    free_list: Vec<FrameId>,
    /// replacement policy for finding unpinned victim frames.
    replacer: Arc<dyn Replacer>,
    /// serialized disk I/O; every read and write goes through here.
    scheduler: DiskScheduler,
    /// carried for future write-ahead logging, not consulted yet.
    #[allow(dead_code)]
    log_manager: Option<Arc<LogManager>>,
    /// the next page id to be allocated.
    next_page_id: PageId,
}

impl BufferPool {
    fn new(
        pool_size: usize,
        scheduler: DiskScheduler,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(pool_size, replacer_k));
        for i in 0..pool_size {
            frames.push(Arc::new(Frame::new(i)));
            // initially, every frame is free
            free_list.push(i);
        }
        BufferPool {
            frames,
            page_table: HashMap::new(),
            free_list,
            replacer,
            scheduler,
            log_manager,
            next_page_id: 0,
        }
    }

    /// Create a brand-new page in a free or reclaimed frame, pinned
    /// once, with a zeroed buffer. None if every frame is pinned.
    fn new_page(&mut self) -> Result<Option<Arc<Frame>>> {
        let frame_id = match self.allocate_frame()? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        let page_id = self.allocate_page();

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();
        self.replacer.record_access(frame_id, AccessType::Unknown)?;
        self.replacer.set_evictable(frame_id, false)?;
        self.page_table.insert(page_id, frame_id);

        Ok(Some(frame))
    }

    /// Fetch a page, reading it from disk on a miss. Pins the frame.
    /// None if the page is absent and every frame is pinned.
    fn fetch_page(&mut self, page_id: PageId, access_type: AccessType) -> Result<Option<Arc<Frame>>> {
        // the page is resident already; just take another pin.
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            let frame = Arc::clone(&self.frames[frame_id]);
            frame.pin();
            self.replacer.record_access(frame_id, access_type)?;
            self.replacer.set_evictable(frame_id, false)?;
            return Ok(Some(frame));
        }

        let frame_id = match self.allocate_frame()? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        if let Err(err) = self.read_frame(&frame, page_id) {
            // hand the frame back rather than leaking it.
            self.free_list.push(frame_id);
            return Err(err);
        }
        frame.set_page_id(page_id);
        frame.pin();
        self.replacer.record_access(frame_id, access_type)?;
        self.replacer.set_evictable(frame_id, false)?;
        self.page_table.insert(page_id, frame_id);

        Ok(Some(frame))
    }

    /// Drop one pin on a resident page. The dirty hint is sticky until
    /// the page is flushed. At pin count zero the frame becomes
    /// evictable. False if the page is not resident or not pinned.
    fn unpin_page(
        &mut self,
        page_id: PageId,
        is_dirty: bool,
        _access_type: AccessType,
    ) -> Result<bool> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() == 0 {
            return Ok(false);
        }
        frame.set_dirty(frame.is_dirty() || is_dirty);
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true)?;
        }
        Ok(true)
    }

    /// Write a resident page to disk regardless of its pin count and
    /// clear its dirty flag. False if the page is not resident.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        assert_ne!(page_id, INVALID_PAGE_ID, "flush of the invalid page id");
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        self.write_frame(&frame, page_id)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flush every resident page, in no particular order.
    fn flush_all_pages(&mut self) -> Result<()> {
        for (&page_id, &frame_id) in self.page_table.iter() {
            let frame = &self.frames[frame_id];
            self.write_frame(frame, page_id)?;
            frame.set_dirty(false);
        }
        Ok(())
    }

    /// Delete a resident page, freeing its frame. True if the page was
    /// absent already, false if it is pinned.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(true),
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        if frame.pin_count() > 0 {
            return Ok(false);
        }
        debug!("deleting page {} from frame {}", page_id, frame_id);
        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id)?;
        frame.reset();
        self.free_list.push(frame_id);
        self.deallocate_page(page_id);
        Ok(true)
    }

    /// Find a frame for a new resident page: from the free list first,
    /// otherwise by evicting a victim, writing it back first if dirty.
    /// None if all frames are pinned.
    fn allocate_frame(&mut self) -> Result<Option<FrameId>> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(Some(frame_id));
        }
        let frame_id = match self.replacer.evict() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        debug!("evicting frame {} holding page {}", frame_id, frame.page_id());
        if frame.is_dirty() {
            self.write_frame(&frame, frame.page_id())?;
        }
        self.page_table.remove(&frame.page_id());
        frame.set_page_id(INVALID_PAGE_ID);
        frame.set_dirty(false);
        Ok(Some(frame_id))
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }

    /// Release hook for a deleted page id. Ids are not reused, so
    /// there is nothing to do yet.
    fn deallocate_page(&mut self, _page_id: PageId) {}

    fn read_frame(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let (callback, promise) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            is_write: false,
            data: Arc::clone(frame.buf()),
            page_id,
            callback,
        })?;
        promise.blocking_recv()?
    }

    fn write_frame(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let (callback, promise) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            is_write: true,
            data: Arc::clone(frame.buf()),
            page_id,
            callback,
        })?;
        promise.blocking_recv()?
    }

    pub(crate) fn unpin(&mut self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        self.unpin_page(page_id, is_dirty, AccessType::Unknown)
    }
}

/// BufferPoolManager wraps the buffer pool with a mutex for concurrent
/// access; the heavy lifting happens in BufferPool. Public operations
/// hold the mutex for their whole body, including across blocking disk
/// I/O, which is what keeps concurrent fetches of the same missing
/// page down to a single physical read.
pub struct BufferPoolManager {
    inner: Arc<Mutex<BufferPool>>,
    pool_size: usize,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        scheduler: DiskScheduler,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let inner = BufferPool::new(pool_size, scheduler, replacer_k, log_manager);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)), pool_size }
    }

    /// Build a manager from a config, constructing the disk manager
    /// through the storage factory.
    pub fn with_config(cfg: &Config) -> Result<BufferPoolManager> {
        let disk = new_disk_manager(cfg.disk_type, &cfg.path)?;
        let scheduler = DiskScheduler::new(disk);
        Ok(BufferPoolManager::new(cfg.pool_size, scheduler, cfg.replacer_k, None))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Create a new page and return a pinned guard for it, or None if
    /// all frames are currently in use and not evictable (in other
    /// words, pinned).
    pub fn new_page(&self) -> Result<Option<PageGuard>> {
        let mut inner = self.inner.lock()?;
        let frame = inner.new_page()?;
        drop(inner);
        Ok(frame.map(|frame| PageGuard::new(Arc::clone(&self.inner), frame)))
    }

    /// Fetch the page with the given page id and return a pinned guard
    /// for it, or None if the page has to come from disk and all
    /// frames are pinned.
    pub fn fetch_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Option<PageGuard>> {
        let mut inner = self.inner.lock()?;
        let frame = inner.fetch_page(page_id, access_type)?;
        drop(inner);
        Ok(frame.map(|frame| PageGuard::new(Arc::clone(&self.inner), frame)))
    }

    /// Fetch a page and take its read latch for the guard's lifetime.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        Ok(self.fetch_page(page_id, AccessType::Lookup)?.map(PageGuard::into_read))
    }

    /// Fetch a page and take its write latch for the guard's lifetime.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        Ok(self.fetch_page(page_id, AccessType::Lookup)?.map(PageGuard::into_write))
    }

    /// Unpin the target page. Returns false if the page is not in the
    /// buffer pool or its pin count is already zero.
    ///
    /// When the pin count reaches zero the frame becomes evictable.
    /// The dirty flag records whether the page was modified and stays
    /// set until the page is flushed.
    pub fn unpin_page(
        &self,
        page_id: PageId,
        is_dirty: bool,
        access_type: AccessType,
    ) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.unpin_page(page_id, is_dirty, access_type)
    }

    /// Flush the target page to storage regardless of the dirty flag
    /// and unset the dirty flag afterwards. Returns false if the page
    /// is not resident.
    ///
    /// The copy to disk takes the page's read latch, so this must not
    /// be called by a thread holding the write latch of the same page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all resident pages to storage.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool. If the page is not resident
    /// this does nothing and returns true; if the page is pinned it
    /// cannot be deleted and this returns false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }

    /// Current pin count of a resident page, None if not resident.
    pub fn pin_count(&self, page_id: PageId) -> Result<Option<u32>> {
        let inner = self.inner.lock()?;
        Ok(inner.page_table.get(&page_id).map(|&frame_id| inner.frames[frame_id].pin_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;

    fn new_pool(pool_size: usize, replacer_k: usize) -> BufferPoolManager {
        let scheduler = DiskScheduler::new(Box::new(Memory::new()));
        BufferPoolManager::new(pool_size, scheduler, replacer_k, None)
    }

    #[test]
    fn test_buffer_pool_basic() -> Result<()> {
        let pool_size = 10;
        let bpm = new_pool(pool_size, 5);

        // Scenario: the buffer pool is empty, we should be able to
        // create a new page.
        let mut page0 = bpm.new_page()?.expect("a free frame");
        let id0 = page0.page_id();
        assert_eq!(0, id0);

        // Scenario: once we have a page, we should be able to read and
        // write its content.
        page0.write()[..5].copy_from_slice(b"hello");
        assert_eq!(b"hello", &page0.read()[..5]);

        // Scenario: we should be able to create pages until we fill up
        // the buffer pool, holding on to every guard.
        let mut guards = Vec::new();
        for _ in 1..pool_size {
            guards.push(bpm.new_page()?.expect("a free frame"));
        }

        // Scenario: once the buffer pool is full, creating more pages
        // should fail.
        for _ in 0..pool_size {
            assert!(bpm.new_page()?.is_none());
        }

        // Scenario: after unpinning pages {0,1,2,3,4} we should be able
        // to create 4 new pages and still have a frame left over.
        page0.release();
        for guard in guards.drain(..4) {
            guard.release();
        }
        for _ in 0..4 {
            guards.push(bpm.new_page()?.expect("a reclaimed frame"));
        }

        // Scenario: we should be able to fetch the data we wrote a
        // while ago; page 0 was written back when its frame was
        // reclaimed.
        let page0 = bpm.fetch_page(id0, AccessType::Lookup)?.expect("page 0 back");
        assert_eq!(b"hello", &page0.read()[..5]);

        // Scenario: if we unpin page 0 and create a new page, all the
        // buffer pages are pinned again and page 0 cannot come back.
        page0.release();
        let _last = bpm.new_page()?.expect("the frame page 0 gave up");
        assert!(bpm.fetch_page(id0, AccessType::Lookup)?.is_none());

        Ok(())
    }

    #[test]
    fn test_unpin_dirty_sticky() -> Result<()> {
        let bpm = new_pool(1, 2);

        let mut page = bpm.new_page()?.expect("a free frame");
        let id = page.page_id();
        page.write()[..2].copy_from_slice(b"ok");
        page.release();

        // a later clean unpin must not clear the dirty flag
        let page = bpm.fetch_page(id, AccessType::Lookup)?.expect("resident page");
        page.release();

        // eviction must write the page back before the frame is reused
        bpm.new_page()?.expect("the reclaimed frame").release();
        let page = bpm.fetch_page(id, AccessType::Lookup)?.expect("page read back");
        assert_eq!(b"ok", &page.read()[..2]);

        Ok(())
    }

    #[test]
    fn test_unpin_semantics() -> Result<()> {
        let bpm = new_pool(2, 2);

        // unpin of a page that is not resident
        assert_eq!(false, bpm.unpin_page(42, false, AccessType::Unknown)?);

        // unpin of a page whose pin count is already zero
        let page = bpm.new_page()?.expect("a free frame");
        let id = page.page_id();
        page.release();
        assert_eq!(false, bpm.unpin_page(id, false, AccessType::Unknown)?);

        // two pins need two unpins
        let first = bpm.fetch_page(id, AccessType::Lookup)?.expect("resident page");
        let second = bpm.fetch_page(id, AccessType::Lookup)?.expect("resident page");
        assert_eq!(Some(2), bpm.pin_count(id)?);
        first.release();
        assert_eq!(Some(1), bpm.pin_count(id)?);
        second.release();
        assert_eq!(Some(0), bpm.pin_count(id)?);

        Ok(())
    }

    #[test]
    fn test_delete_page() -> Result<()> {
        let bpm = new_pool(3, 2);

        let page = bpm.new_page()?.expect("a free frame");
        let id = page.page_id();

        // a pinned page cannot be deleted
        assert_eq!(false, bpm.delete_page(id)?);

        page.release();
        assert_eq!(true, bpm.delete_page(id)?);
        assert_eq!(None, bpm.pin_count(id)?);

        // deleting an absent page is vacuously true
        assert_eq!(true, bpm.delete_page(id)?);

        // the id can still be fetched afterwards, going to disk
        let page = bpm.fetch_page(id, AccessType::Lookup)?.expect("a free frame");
        assert_eq!(0u8, page.read()[0]);

        Ok(())
    }

    #[test]
    fn test_flush_page() -> Result<()> {
        let bpm = new_pool(1, 2);

        // flush of a page that is not resident
        assert_eq!(false, bpm.flush_page(7)?);

        let page = bpm.new_page()?.expect("a free frame");
        let id = page.page_id();
        let mut page = page.into_write();
        page.data_mut()[..3].copy_from_slice(b"abc");
        page.release();

        // flushing is allowed regardless of pin count and clears the
        // dirty flag; the following eviction reuses the frame without
        // another write and the flushed bytes survive.
        assert_eq!(true, bpm.flush_page(id)?);
        bpm.new_page()?.expect("the reclaimed frame").release();
        let page = bpm.fetch_page(id, AccessType::Lookup)?.expect("page read back");
        assert_eq!(b"abc", &page.read()[..3]);

        bpm.flush_all_pages()?;
        Ok(())
    }

    #[test]
    #[should_panic(expected = "flush of the invalid page id")]
    fn test_flush_invalid_page_panics() {
        let bpm = new_pool(1, 2);
        let _ = bpm.flush_page(INVALID_PAGE_ID);
    }

    #[test]
    fn test_with_config() -> Result<()> {
        let cfg = Config::new("")?;
        let bpm = BufferPoolManager::with_config(&cfg)?;
        assert_eq!(cfg.pool_size, bpm.pool_size());
        let page = bpm.new_page()?.expect("a free frame");
        assert_eq!(0, page.page_id());
        Ok(())
    }
}
