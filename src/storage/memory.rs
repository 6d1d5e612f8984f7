use std::collections::BTreeMap;

use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::DiskManager;

/// In-memory disk manager, mainly for tests. Pages that were never
/// written read back as zeroes.
#[derive(Debug)]
pub struct Memory {
    pages: BTreeMap<PageId, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: BTreeMap::new() }
    }
}

impl DiskManager for Memory {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.pages.insert(page_id, data.to_vec());
        Ok(())
    }
}
