use std::sync::{Arc, Mutex};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::bufferpool::BufferPool;
use crate::storage::page::{Frame, PageId};

type ReadLatch = ArcRwLockReadGuard<RawRwLock, Box<[u8]>>;
type WriteLatch = ArcRwLockWriteGuard<RawRwLock, Box<[u8]>>;

/// A pinned reference to a buffer pool page. Holding the guard keeps
/// the frame from being evicted; dropping it unpins the page, carrying
/// the dirty hint accumulated from write accesses. Guards are
/// move-only: a copy would unpin the page twice.
pub struct PageGuard {
    pool: Arc<Mutex<BufferPool>>,
    frame: Arc<Frame>,
    page_id: PageId,
    dirty: bool,
    released: bool,
}

impl PageGuard {
    pub(crate) fn new(pool: Arc<Mutex<BufferPool>>, frame: Arc<Frame>) -> PageGuard {
        let page_id = frame.page_id();
        PageGuard { pool, frame, page_id, dirty: false, released: false }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Borrow the page bytes under the frame's read latch.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.frame.buf().read()
    }

    /// Borrow the page bytes mutably under the frame's write latch.
    /// The page will be unpinned dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.dirty = true;
        self.frame.buf().write()
    }

    /// Flag the page as modified without touching the latch.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Take the frame's read latch for the lifetime of the returned
    /// guard.
    pub fn into_read(self) -> ReadPageGuard {
        let latch = self.frame.buf().read_arc();
        ReadPageGuard { latch: Some(latch), guard: self }
    }

    /// Take the frame's write latch for the lifetime of the returned
    /// guard. Write access is assumed to dirty the page.
    pub fn into_write(mut self) -> WritePageGuard {
        self.dirty = true;
        let latch = self.frame.buf().write_arc();
        WritePageGuard { latch: Some(latch), guard: self }
    }

    /// Unpin now instead of at scope exit. Dropping the guard after an
    /// explicit release is a no-op.
    pub fn release(mut self) {
        self.unpin();
    }

    fn unpin(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Ok(mut pool) = self.pool.lock() {
            let _ = pool.unpin(self.page_id, self.dirty);
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.unpin();
    }
}

/// A pinned page held under its read latch for the guard's lifetime.
pub struct ReadPageGuard {
    // taken in drop before the pin goes, so the latch is never held
    // while waiting on the pool mutex.
    latch: Option<ReadLatch>,
    guard: PageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        match &self.latch {
            Some(latch) => latch,
            None => &[],
        }
    }

    /// Release the latch and the pin now.
    pub fn release(mut self) {
        self.latch.take();
        self.guard.unpin();
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.latch.take();
    }
}

/// A pinned page held under its write latch for the guard's lifetime.
/// Unpinning reports the page dirty unless released with
/// release_clean.
pub struct WritePageGuard {
    latch: Option<WriteLatch>,
    guard: PageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        match &self.latch {
            Some(latch) => latch,
            None => &[],
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.latch {
            Some(latch) => latch,
            None => &mut [],
        }
    }

    /// Release the latch and the pin now, reporting the page dirty.
    pub fn release(mut self) {
        self.latch.take();
        self.guard.unpin();
    }

    /// Release without the dirty hint, for write access that ended up
    /// not modifying the page.
    pub fn release_clean(mut self) {
        self.guard.dirty = false;
        self.latch.take();
        self.guard.unpin();
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.latch.take();
    }
}
