use std::sync::atomic::{AtomicU64, Ordering};

/// Log sequence number.
pub type Lsn = u64;

/// Write-ahead log manager. The buffer pool takes an optional handle
/// so the wiring for recovery exists, but no log records are emitted
/// yet; for now the manager only hands out sequence numbers.
pub struct LogManager {
    next_lsn: AtomicU64,
}

impl LogManager {
    pub fn new() -> LogManager {
        LogManager { next_lsn: AtomicU64::new(0) }
    }

    /// Reserve the next log sequence number.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LogManager {
    fn default() -> LogManager {
        LogManager::new()
    }
}
