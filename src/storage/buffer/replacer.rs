use crate::storage::page::PageId;
use std::fmt::Debug;

/// Eviction policy for the buffer pool. Methods take `&self` so cache hits can
/// stamp recency without taking the pool's eviction latch.
pub trait Replacer: Send + Sync + Debug {
    /// Record that `page_id` was just fetched.
    fn record_access(&self, page_id: PageId);

    /// The page to evict next. Does not stop tracking it; the pool calls
    /// `remove` once the page has actually left the cache.
    fn victim(&self) -> Option<PageId>;

    /// Stop tracking `page_id`.
    fn remove(&self, page_id: PageId);

    /// Number of tracked pages.
    fn size(&self) -> usize;
}
