//! Tuple-level operations on a heap file.
//!
//! Every page access goes through the buffer pool; the file itself is only
//! touched directly to grow it by one empty page.

use crate::access::scan::HeapFileIterator;
use crate::access::Tuple;
use crate::concurrency::Permissions;
use crate::storage::buffer::{BufferPool, PageRef};
use crate::storage::disk::HeapFile;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::debug;
use std::sync::Arc;

impl HeapFile {
    /// Place `tuple` in the first page with a free slot and return the pages
    /// modified. The page named by the tuple's current record id, if it lies in
    /// this file, is tried first. When every page is full one empty page is
    /// appended to the file. On success the tuple carries its new record id.
    ///
    /// Marking the pages dirty is the caller's job.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        if **tuple.schema() != **self.schema() {
            return Err(StorageError::SchemaMismatch {
                expected: self.schema().to_string(),
                actual: tuple.schema().to_string(),
            });
        }
        // an unencodable tuple must fail before the file grows
        tuple.encode(&mut Vec::with_capacity(self.schema().byte_size()))?;

        let num_pages = self.num_pages()?;
        let hint = tuple
            .record_id()
            .map(|rid| rid.page_id)
            .filter(|page_id| page_id.table_id == self.id() && page_id.page_number < num_pages);
        let candidates = hint
            .into_iter()
            .chain((0..num_pages).map(|n| PageId::new(self.id(), n)));

        for page_id in candidates {
            let page = pool.fetch_page(tid, page_id, Permissions::ReadWrite)?;
            let inserted = {
                let mut guard = page.write();
                if guard.num_empty_slots() > 0 {
                    guard.insert_tuple(tuple)?;
                    true
                } else {
                    false
                }
            };
            if inserted {
                return Ok(vec![page]);
            }
        }

        let page_id = self.append_empty_page()?;
        debug!("{} full, grew to {}", self.path().display(), page_id);
        let page = pool.fetch_page(tid, page_id, Permissions::ReadWrite)?;
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Clear the slot named by the tuple's record id and return the page
    /// modified.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let page_id = record_id.page_id;
        if page_id.table_id != self.id() || page_id.page_number >= self.num_pages()? {
            return Err(StorageError::PageNotFound(page_id));
        }

        let page = pool.fetch_page(tid, page_id, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Scan of every tuple in the file, page by page through `pool`.
    pub fn iter(self: &Arc<Self>, pool: &BufferPool, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), pool.clone(), tid)
    }
}
