//! Page lock capability.
//!
//! The buffer pool asks a [`LockManager`] for permission before handing out a
//! page. The default [`NoopLockManager`] grants everything, so two operator
//! trees mutating the same page concurrently race on it; a real
//! implementation must enforce reader/writer exclusion here before concurrent
//! writers are safe.

use crate::storage::error::StorageResult;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::fmt::Debug;

/// Access a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

pub trait LockManager: Send + Sync + Debug {
    /// Acquire a lock on `page_id` for `tid`. May block; fails with
    /// `StorageError::TransactionAborted` if the lock cannot be granted.
    fn acquire_lock(&self, tid: TransactionId, page_id: PageId, perm: Permissions)
        -> StorageResult<()>;

    /// Release one page lock early.
    fn release_lock(&self, tid: TransactionId, page_id: PageId);

    fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool;

    /// Release every lock `tid` holds.
    fn release_all(&self, tid: TransactionId);
}

/// Grants every request and tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLockManager;

impl LockManager for NoopLockManager {
    fn acquire_lock(
        &self,
        _tid: TransactionId,
        _page_id: PageId,
        _perm: Permissions,
    ) -> StorageResult<()> {
        Ok(())
    }

    fn release_lock(&self, _tid: TransactionId, _page_id: PageId) {}

    fn holds_lock(&self, _tid: TransactionId, _page_id: PageId) -> bool {
        false
    }

    fn release_all(&self, _tid: TransactionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableId;

    #[test]
    fn test_noop_grants_everything() -> StorageResult<()> {
        let lm = NoopLockManager;
        let page_id = PageId::new(TableId(1), 0);

        lm.acquire_lock(TransactionId(1), page_id, Permissions::ReadWrite)?;
        lm.acquire_lock(TransactionId(2), page_id, Permissions::ReadWrite)?;
        assert!(!lm.holds_lock(TransactionId(1), page_id));

        lm.release_lock(TransactionId(1), page_id);
        lm.release_all(TransactionId(2));
        Ok(())
    }
}
