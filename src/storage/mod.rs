use std::fmt::Debug;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::storage::page::PageId;

pub mod disk;
pub mod memory;
pub mod page;
pub mod scheduler;
pub mod wal;

/// Page-granular stable storage. Both operations address whole pages
/// by page id and buffers are always PAGE_SIZE bytes. An implementation
/// is moved into the disk scheduler worker thread, which serializes all
/// access to it, so only Send is required.
pub trait DiskManager: Debug + Send {
    /// Read the page into buf. A page that has never been written
    /// reads back as all zeroes.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Write a full page of data at the given page id.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: DiskType, path: &str) -> Result<Box<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Box::new(memory::Memory::new())),
        DiskType::File => Ok(Box::new(disk::FileDisk::new(Path::new(path))?)),
    }
}
