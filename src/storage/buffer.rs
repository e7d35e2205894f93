pub mod lru;
pub mod replacer;

use crate::access::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::concurrency::{LockManager, NoopLockManager, Permissions};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, PageId};
use crate::transaction::TransactionId;
use dashmap::DashMap;
use log::debug;
use lru::LruReplacer;
use parking_lot::{Mutex, RwLock};
use replacer::Replacer;
use std::sync::Arc;

/// Shared handle to a cached page.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Bounded page cache in front of the heap files.
///
/// Hits only touch the page table and the replacer, both of which are
/// lock-free for readers. Misses, eviction and every flush run under one
/// latch, so at most one of them proceeds at a time across the pool.
///
/// Dirty pages are written back when they are evicted or flushed (write-back,
/// steal): a page modified by an unfinished writer may reach disk before that
/// writer completes.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    page_table: DashMap<PageId, PageRef>,
    replacer: Box<dyn Replacer>,
    lock_manager: Arc<dyn LockManager>,
    catalog: Arc<Catalog>,
    latch: Mutex<()>,
    max_pages: usize,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, max_pages: usize) -> Self {
        Self::with_policies(
            catalog,
            max_pages,
            Box::new(LruReplacer::new(max_pages)),
            Arc::new(NoopLockManager),
        )
    }

    pub fn with_policies(
        catalog: Arc<Catalog>,
        max_pages: usize,
        replacer: Box<dyn Replacer>,
        lock_manager: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                page_table: DashMap::with_capacity(max_pages),
                replacer,
                lock_manager,
                catalog,
                latch: Mutex::new(()),
                max_pages,
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    pub fn capacity(&self) -> usize {
        self.inner.max_pages
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.inner.page_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.page_table.is_empty()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.page_table.contains_key(&page_id)
    }

    /// Ids of the cached pages, sorted.
    pub fn cached_page_ids(&self) -> Vec<PageId> {
        let mut ids: Vec<_> = self.inner.page_table.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    fn lookup(&self, page_id: PageId) -> Option<PageRef> {
        let page = self
            .inner
            .page_table
            .get(&page_id)
            .map(|entry| entry.value().clone())?;
        self.inner.replacer.record_access(page_id);
        Some(page)
    }

    /// Return the page, reading it from its heap file on a miss. A miss on a
    /// full pool first evicts the least recently fetched page.
    pub fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> StorageResult<PageRef> {
        self.inner.lock_manager.acquire_lock(tid, page_id, perm)?;

        if let Some(page) = self.lookup(page_id) {
            return Ok(page);
        }

        let _latch = self.inner.latch.lock();
        // another thread may have loaded it while we waited
        if let Some(page) = self.lookup(page_id) {
            return Ok(page);
        }

        debug!("buffer pool miss on {}", page_id);
        let file = self.inner.catalog.database_file(page_id.table_id)?;
        let page = file.read_page(page_id)?;

        while self.inner.page_table.len() >= self.inner.max_pages {
            self.evict_page_locked()?;
        }

        let page = Arc::new(RwLock::new(page));
        self.inner.page_table.insert(page_id, page.clone());
        self.inner.replacer.record_access(page_id);
        Ok(page)
    }

    /// Add `tuple` to table `table_id`. Pages the heap file modified are marked
    /// dirty by `tid` and returned.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let file = self.inner.catalog.database_file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        for page in &dirtied {
            page.write().mark_dirty(true, tid);
        }
        Ok(dirtied)
    }

    /// Remove `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> StorageResult<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self
            .inner
            .catalog
            .database_file(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        for page in &dirtied {
            page.write().mark_dirty(true, tid);
        }
        Ok(dirtied)
    }

    /// Write every dirty cached page back to its heap file.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        for page in self.snapshot() {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Write one page back if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        let page = self
            .inner
            .page_table
            .get(&page_id)
            .map(|entry| entry.value().clone());
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(()),
        }
    }

    /// Write back every page last dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        for page in self.snapshot() {
            if page.read().is_dirty() == Some(tid) {
                self.write_back(&page)?;
            }
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it back.
    pub fn discard_page(&self, page_id: PageId) {
        let _latch = self.inner.latch.lock();
        self.inner.page_table.remove(&page_id);
        self.inner.replacer.remove(page_id);
        debug!("discarded {}", page_id);
    }

    /// Write back and drop every cached page of `table_id`. Must run while the
    /// table is still registered, before anything replaces it in the catalog.
    pub fn discard_table(&self, table_id: TableId) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        let pages: Vec<(PageId, PageRef)> = self
            .inner
            .page_table
            .iter()
            .filter(|entry| entry.key().table_id == table_id)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (page_id, page) in &pages {
            self.write_back(page)?;
            self.inner.page_table.remove(page_id);
            self.inner.replacer.remove(*page_id);
        }
        debug!("dropped {} cached pages of {}", pages.len(), table_id);
        Ok(())
    }

    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.inner.lock_manager.release_lock(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.holds_lock(tid, page_id)
    }

    /// Finish `tid`: on commit its dirty pages are forced to disk, on abort
    /// they are discarded so the next fetch re-reads the file. Its locks are
    /// released either way.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> StorageResult<()> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let dirtied: Vec<PageId> = self
                .snapshot()
                .into_iter()
                .filter_map(|page| {
                    let page = page.read();
                    (page.is_dirty() == Some(tid)).then(|| page.page_id())
                })
                .collect();
            for page_id in dirtied {
                self.discard_page(page_id);
            }
        }
        self.inner.lock_manager.release_all(tid);
        Ok(())
    }

    fn snapshot(&self) -> Vec<PageRef> {
        self.inner
            .page_table
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Caller holds the latch.
    fn write_back(&self, page: &PageRef) -> StorageResult<()> {
        let mut page = page.write();
        if page.is_dirty().is_some() {
            let file = self.inner.catalog.database_file(page.page_id().table_id)?;
            file.write_page(&page)?;
            page.mark_clean();
            debug!("flushed {}", page.page_id());
        }
        Ok(())
    }

    /// Caller holds the latch.
    fn evict_page_locked(&self) -> StorageResult<()> {
        loop {
            let victim = self
                .inner
                .replacer
                .victim()
                .ok_or(StorageError::CacheExhausted)?;

            let page = self
                .inner
                .page_table
                .get(&victim)
                .map(|entry| entry.value().clone());
            let Some(page) = page else {
                // stamp left behind by a hit that raced an earlier eviction
                self.inner.replacer.remove(victim);
                continue;
            };

            // a failed write leaves the page cached and dirty
            self.write_back(&page)?;
            self.inner.page_table.remove(&victim);
            self.inner.replacer.remove(victim);
            debug!("evicted {}", victim);
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{DataType, Schema, Value};
    use crate::storage::disk::HeapFile;
    use anyhow::Result;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const TID: TransactionId = TransactionId(1);

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::from_pairs([
            ("a", DataType::Int32),
            ("b", DataType::Int32),
        ]))
    }

    fn tuple(a: i32, b: i32) -> Tuple {
        Tuple::from_values(schema(), vec![Value::Int32(a), Value::Int32(b)]).unwrap()
    }

    /// A table whose file already holds `pages` empty pages.
    fn setup(max_pages: usize, pages: u32) -> Result<(TempDir, BufferPool, TableId)> {
        let dir = tempdir()?;
        let catalog = Arc::new(Catalog::new());
        let table_id = add_table(&catalog, dir.path(), "t", pages)?;
        Ok((dir, BufferPool::new(catalog, max_pages), table_id))
    }

    fn add_table(catalog: &Catalog, dir: &Path, name: &str, pages: u32) -> Result<TableId> {
        let id = catalog.allocate_table_id();
        let file = HeapFile::create(&dir.join(format!("{}.dat", name)), id, schema(), 4096)?;
        for _ in 0..pages {
            file.append_empty_page()?;
        }
        Ok(catalog.add_table(file, name))
    }

    fn pid(table_id: TableId, n: u32) -> PageId {
        PageId::new(table_id, n)
    }

    fn on_disk(pool: &BufferPool, page_id: PageId) -> Result<Vec<u8>> {
        let file = pool.catalog().database_file(page_id.table_id)?;
        Ok(file.read_page(page_id)?.data().to_vec())
    }

    #[test]
    fn test_fetch_caches_page() -> Result<()> {
        let (_dir, pool, t) = setup(10, 2)?;

        let first = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        let again = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(pid(t, 0)));
        Ok(())
    }

    #[test]
    fn test_fetch_missing_page() -> Result<()> {
        let (_dir, pool, t) = setup(2, 1)?;
        pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;

        let result = pool.fetch_page(TID, pid(t, 5), Permissions::ReadOnly);
        assert!(matches!(result, Err(StorageError::PageNotFound(_))));
        // nothing was evicted for the failed read
        assert_eq!(pool.cached_page_ids(), vec![pid(t, 0)]);

        let result = pool.fetch_page(TID, pid(TableId(99), 0), Permissions::ReadOnly);
        assert!(matches!(result, Err(StorageError::TableNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_eviction_picks_least_recently_fetched() -> Result<()> {
        let (_dir, pool, t) = setup(3, 4)?;

        pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?;
        pool.fetch_page(TID, pid(t, 2), Permissions::ReadOnly)?;
        // refresh page 0 so page 1 becomes the oldest
        pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;

        pool.fetch_page(TID, pid(t, 3), Permissions::ReadOnly)?;
        assert_eq!(pool.len(), 3);
        assert_eq!(
            pool.cached_page_ids(),
            vec![pid(t, 0), pid(t, 2), pid(t, 3)]
        );
        Ok(())
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() -> Result<()> {
        let (_dir, pool, t) = setup(1, 2)?;

        let page = pool.fetch_page(TID, pid(t, 0), Permissions::ReadWrite)?;
        {
            let mut page = page.write();
            page.insert_tuple(&mut tuple(1, 1))?;
            page.mark_dirty(true, TID);
        }
        let in_memory = page.read().data().to_vec();
        drop(page);

        // capacity 1: fetching page 1 evicts page 0
        pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?;
        assert!(!pool.contains(pid(t, 0)));
        assert_eq!(on_disk(&pool, pid(t, 0))?, in_memory);

        // re-fetch reads what was flushed
        let page = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        assert_eq!(page.read().data(), in_memory.as_slice());
        assert_eq!(page.read().is_dirty(), None);
        Ok(())
    }

    #[test]
    fn test_clean_page_eviction_leaves_disk_alone() -> Result<()> {
        let (_dir, pool, t) = setup(1, 2)?;
        let before = on_disk(&pool, pid(t, 0))?;

        let page = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        // modified in memory but never marked dirty
        page.write().insert_tuple(&mut tuple(5, 5))?;
        drop(page);

        pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?;
        assert_eq!(on_disk(&pool, pid(t, 0))?, before);
        Ok(())
    }

    #[test]
    fn test_zero_capacity_pool() -> Result<()> {
        let (_dir, pool, t) = setup(0, 1)?;
        let result = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly);
        assert!(matches!(result, Err(StorageError::CacheExhausted)));
        Ok(())
    }

    #[test]
    fn test_flush_all_and_flush_page() -> Result<()> {
        let (_dir, pool, t) = setup(10, 2)?;

        for n in 0..2 {
            let page = pool.fetch_page(TID, pid(t, n), Permissions::ReadWrite)?;
            let mut page = page.write();
            page.insert_tuple(&mut tuple(n as i32, 0))?;
            page.mark_dirty(true, TID);
        }

        pool.flush_page(pid(t, 0))?;
        assert_eq!(
            pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?.read().is_dirty(),
            None
        );
        assert_eq!(
            pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?.read().is_dirty(),
            Some(TID)
        );

        pool.flush_all_pages()?;
        for n in 0..2 {
            let page = pool.fetch_page(TID, pid(t, n), Permissions::ReadOnly)?;
            let page = page.read();
            assert_eq!(page.is_dirty(), None);
            assert_eq!(on_disk(&pool, pid(t, n))?, page.data());
        }

        // flushing an uncached page is a no-op
        pool.flush_page(pid(t, 7))?;
        Ok(())
    }

    #[test]
    fn test_flush_pages_by_writer() -> Result<()> {
        let (_dir, pool, t) = setup(10, 2)?;
        let other = TransactionId(2);

        for (n, tid) in [(0, TID), (1, other)] {
            let page = pool.fetch_page(tid, pid(t, n), Permissions::ReadWrite)?;
            let mut page = page.write();
            page.insert_tuple(&mut tuple(1, 1))?;
            page.mark_dirty(true, tid);
        }

        pool.flush_pages(TID)?;
        let read_dirty = |n| -> Result<Option<TransactionId>> {
            Ok(pool
                .fetch_page(TID, pid(t, n), Permissions::ReadOnly)?
                .read()
                .is_dirty())
        };
        assert_eq!(read_dirty(0)?, None);
        assert_eq!(read_dirty(1)?, Some(other));
        Ok(())
    }

    #[test]
    fn test_discard_page() -> Result<()> {
        let (_dir, pool, t) = setup(10, 1)?;
        let before = on_disk(&pool, pid(t, 0))?;

        let page = pool.fetch_page(TID, pid(t, 0), Permissions::ReadWrite)?;
        {
            let mut page = page.write();
            page.insert_tuple(&mut tuple(1, 1))?;
            page.mark_dirty(true, TID);
        }

        pool.discard_page(pid(t, 0));
        assert!(pool.is_empty());
        assert_eq!(on_disk(&pool, pid(t, 0))?, before);

        let reread = pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        assert_eq!(reread.read().iter().count(), 0);
        Ok(())
    }

    #[test]
    fn test_discard_table_flushes_then_drops() -> Result<()> {
        let (dir, pool, t) = setup(2, 2)?;
        let other = add_table(pool.catalog(), dir.path(), "u", 1)?;

        let page = pool.fetch_page(TID, pid(t, 0), Permissions::ReadWrite)?;
        {
            let mut page = page.write();
            page.insert_tuple(&mut tuple(1, 1))?;
            page.mark_dirty(true, TID);
        }
        let in_memory = page.read().data().to_vec();
        drop(page);
        pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?;

        pool.discard_table(t)?;
        assert!(pool.is_empty());
        assert_eq!(on_disk(&pool, pid(t, 0))?, in_memory);

        // both freed frames are usable without touching the old table
        pool.fetch_page(TID, pid(other, 0), Permissions::ReadOnly)?;
        pool.flush_all_pages()?;
        assert_eq!(pool.cached_page_ids(), vec![pid(other, 0)]);
        Ok(())
    }

    #[test]
    fn test_transaction_complete() -> Result<()> {
        let (_dir, pool, t) = setup(10, 2)?;
        let loser = TransactionId(2);

        pool.insert_tuple(TID, t, &mut tuple(1, 1))?;
        let page = pool.fetch_page(loser, pid(t, 1), Permissions::ReadWrite)?;
        {
            let mut page = page.write();
            page.insert_tuple(&mut tuple(2, 2))?;
            page.mark_dirty(true, loser);
        }

        pool.transaction_complete(TID, true)?;
        assert_eq!(
            HeapPage::from_bytes(pid(t, 0), schema(), on_disk(&pool, pid(t, 0))?)?
                .iter()
                .count(),
            1
        );

        pool.transaction_complete(loser, false)?;
        assert!(!pool.contains(pid(t, 1)));
        let reread = pool.fetch_page(TID, pid(t, 1), Permissions::ReadOnly)?;
        assert_eq!(reread.read().iter().count(), 0);
        Ok(())
    }

    #[test]
    fn test_insert_marks_dirty() -> Result<()> {
        let (_dir, pool, t) = setup(10, 0)?;

        let dirtied = pool.insert_tuple(TID, t, &mut tuple(1, 2))?;
        assert_eq!(dirtied.len(), 1);
        assert_eq!(dirtied[0].read().is_dirty(), Some(TID));
        Ok(())
    }

    #[test]
    fn test_delete_without_record_id() -> Result<()> {
        let (_dir, pool, _t) = setup(10, 1)?;
        let result = pool.delete_tuple(TID, &tuple(1, 1));
        assert!(matches!(result, Err(StorageError::MissingRecordId)));
        Ok(())
    }

    #[derive(Debug)]
    struct DenyWrites;

    impl LockManager for DenyWrites {
        fn acquire_lock(
            &self,
            tid: TransactionId,
            _page_id: PageId,
            perm: Permissions,
        ) -> StorageResult<()> {
            match perm {
                Permissions::ReadOnly => Ok(()),
                Permissions::ReadWrite => Err(StorageError::TransactionAborted(tid)),
            }
        }

        fn release_lock(&self, _tid: TransactionId, _page_id: PageId) {}

        fn holds_lock(&self, _tid: TransactionId, _page_id: PageId) -> bool {
            true
        }

        fn release_all(&self, _tid: TransactionId) {}
    }

    #[test]
    fn test_lock_manager_consulted_on_fetch() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Arc::new(Catalog::new());
        let t = add_table(&catalog, dir.path(), "t", 1)?;
        let pool = BufferPool::with_policies(
            catalog,
            4,
            Box::new(LruReplacer::new(4)),
            Arc::new(DenyWrites),
        );

        pool.fetch_page(TID, pid(t, 0), Permissions::ReadOnly)?;
        let result = pool.fetch_page(TID, pid(t, 0), Permissions::ReadWrite);
        assert!(matches!(result, Err(StorageError::TransactionAborted(_))));
        assert!(pool.holds_lock(TID, pid(t, 0)));
        Ok(())
    }

    #[test]
    fn test_concurrent_fetches() -> Result<()> {
        let (_dir, pool, t) = setup(4, 8)?;

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || -> StorageResult<()> {
                    for round in 0..50u32 {
                        let n = (i + round) % 8;
                        pool.fetch_page(TID, pid(t, n), Permissions::ReadOnly)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap()?;
        }
        assert!(pool.len() <= 4);
        Ok(())
    }
}
