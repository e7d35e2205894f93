//! Table registry.
//!
//! The catalog maps table ids and names to the heap files that back them. It is
//! populated by whoever opens the database; loading table definitions from
//! disk is not its job.

pub mod table_info;

pub use table_info::{TableId, TableInfo};

use crate::access::Schema;
use crate::storage::disk::HeapFile;
use crate::storage::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableInfo>,
    names: HashMap<String, TableId>,
}

#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh table id for a heap file about to be created.
    pub fn allocate_table_id(&self) -> TableId {
        TableId(self.next_table_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Register `file` under `name`. A table already registered with the same
    /// name or id is replaced.
    pub fn add_table(&self, file: HeapFile, name: &str) -> TableId {
        let table_id = file.id();
        let mut inner = self.inner.write();

        if let Some(old_id) = inner.names.remove(name) {
            inner.tables.remove(&old_id);
        }
        if let Some(old) = inner.tables.remove(&table_id) {
            inner.names.remove(&old.table_name);
        }

        inner.names.insert(name.to_string(), table_id);
        inner.tables.insert(
            table_id,
            TableInfo {
                table_id,
                table_name: name.to_string(),
                file: Arc::new(file),
            },
        );
        // keep allocated ids ahead of ids chosen by callers
        self.next_table_id.fetch_max(table_id.0, Ordering::SeqCst);
        table_id
    }

    pub fn table(&self, table_id: TableId) -> StorageResult<TableInfo> {
        self.inner
            .read()
            .tables
            .get(&table_id)
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound(format!("id {}", table_id)))
    }

    pub fn database_file(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.table(table_id).map(|info| info.file)
    }

    pub fn schema(&self, table_id: TableId) -> StorageResult<Arc<Schema>> {
        self.table(table_id).map(|info| info.schema().clone())
    }

    pub fn table_name(&self, table_id: TableId) -> StorageResult<String> {
        self.table(table_id).map(|info| info.table_name)
    }

    pub fn table_id(&self, name: &str) -> StorageResult<TableId> {
        self.inner
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    /// All registered table ids in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.inner.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }
}
