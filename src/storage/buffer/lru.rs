use super::replacer::Replacer;
use crate::storage::page::PageId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Least-recently-fetched eviction by timestamp scan.
///
/// Every access stamps the page with the next value of a logical clock; the
/// victim is the page with the smallest stamp. Choosing a victim is O(n) in
/// the number of cached pages, recording an access is O(1).
#[derive(Debug, Default)]
pub struct LruReplacer {
    stamps: DashMap<PageId, u64>,
    clock: AtomicU64,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: DashMap::with_capacity(capacity),
            clock: AtomicU64::new(0),
        }
    }
}

impl Replacer for LruReplacer {
    fn record_access(&self, page_id: PageId) {
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst);
        self.stamps.insert(page_id, stamp);
    }

    fn victim(&self) -> Option<PageId> {
        self.stamps
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| *entry.key())
    }

    fn remove(&self, page_id: PageId) {
        self.stamps.remove(&page_id);
    }

    fn size(&self) -> usize {
        self.stamps.len()
    }
}
