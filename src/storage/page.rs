use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Logical page identifier on stable storage.
pub type PageId = i64;

/// Index of a slot in the buffer pool, in [0, pool_size).
pub type FrameId = usize;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = -1;

/// A page-sized byte buffer behind its reader-writer latch, shared so
/// page guards and in-flight disk requests can hold it independently
/// of the frame bookkeeping.
pub type PageBuf = Arc<RwLock<Box<[u8]>>>;

/// An in-memory slot able to hold one page. The byte buffer is guarded
/// by the per-frame latch alone; page_id, pin_count and is_dirty are
/// only mutated while the pool mutex is held, so pinning a page never
/// waits for latch holders.
pub struct Frame {
    id: FrameId,
    page_id: AtomicI64,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    buf: PageBuf,
}

impl Frame {
    pub(crate) fn new(id: FrameId) -> Frame {
        Frame {
            id,
            page_id: AtomicI64::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            buf: Arc::new(RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice())),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Relaxed)
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// The shared buffer cell, for latching and for disk requests.
    pub fn buf(&self) -> &PageBuf {
        &self.buf
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::Relaxed);
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Relaxed);
    }

    /// Increment the pin count, returning the new value.
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count, returning the new value.
    pub(crate) fn unpin(&self) -> u32 {
        self.pin_count.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Zero the buffer and clear the metadata, returning the frame to
    /// its freshly constructed state.
    pub(crate) fn reset(&self) {
        self.buf.write().fill(0);
        self.page_id.store(INVALID_PAGE_ID, Ordering::Relaxed);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}
