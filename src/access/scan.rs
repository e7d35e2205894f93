use crate::access::Tuple;
use crate::concurrency::Permissions;
use crate::storage::buffer::BufferPool;
use crate::storage::disk::HeapFile;
use crate::storage::error::StorageResult;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::VecDeque;
use std::sync::Arc;

/// Cursor over every occupied slot of a heap file, in page order.
///
/// Pages are fetched through the buffer pool one at a time and their tuples
/// copied out, so a page may be evicted while its tuples are still being
/// returned. The page count is re-read before each page, so pages appended
/// mid-scan are visited.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: BufferPool,
    tid: TransactionId,
    next_page: u32,
    buffered: VecDeque<Tuple>,
    open: bool,
}

impl HeapFileIterator {
    pub fn new(file: Arc<HeapFile>, pool: BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            open: false,
        }
    }

    pub fn open(&mut self) -> StorageResult<()> {
        self.next_page = 0;
        self.buffered.clear();
        self.open = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The next tuple, or `None` once the file is exhausted or the iterator is
    /// closed.
    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.open {
            return Ok(None);
        }
        while self.buffered.is_empty() {
            if self.next_page >= self.file.num_pages()? {
                return Ok(None);
            }
            let page_id = PageId::new(self.file.id(), self.next_page);
            let page = self.pool.fetch_page(self.tid, page_id, Permissions::ReadOnly)?;
            let tuples = page.read().iter().collect::<StorageResult<Vec<_>>>()?;
            self.buffered.extend(tuples);
            self.next_page += 1;
        }
        Ok(self.buffered.pop_front())
    }

    pub fn rewind(&mut self) -> StorageResult<()> {
        self.open()
    }

    pub fn close(&mut self) {
        self.buffered.clear();
        self.open = false;
    }
}
