use crate::access::Schema;
use crate::catalog::{Catalog, TableId};
use crate::config::DatabaseConfig;
use crate::executor::ExecutionContext;
use crate::storage::buffer::BufferPool;
use crate::storage::disk::HeapFile;
use crate::transaction::{TransactionId, TransactionIdGenerator};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// High-level database interface that integrates all layers
pub struct Database {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    transactions: TransactionIdGenerator,
}

impl Database {
    /// Open the database rooted at `config.data_dir`, creating the directory
    /// if needed. Tables are registered by the caller.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(catalog.clone(), config.buffer_pool_pages);
        info!(
            "opened database at {} (page size {}, {} buffer pages)",
            config.data_dir.display(),
            config.page_size,
            config.buffer_pool_pages
        );

        Ok(Self {
            config,
            catalog,
            buffer_pool,
            transactions: TransactionIdGenerator::new(),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(format!("{}.dat", name))
    }

    /// Cached pages of the table registered as `name` are written back and
    /// dropped, so a replacement never leaves pages the catalog cannot resolve.
    fn retire_table(&self, name: &str) -> Result<()> {
        if let Ok(old_id) = self.catalog.table_id(name) {
            self.buffer_pool
                .discard_table(old_id)
                .with_context(|| format!("failed to flush table {} before replacing it", name))?;
            info!("replacing table {} ({})", name, old_id);
        }
        Ok(())
    }

    /// Create an empty table, truncating any file of the same name.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<TableId> {
        self.retire_table(name)?;
        let table_id = self.catalog.allocate_table_id();
        let file = HeapFile::create(
            &self.table_path(name),
            table_id,
            Arc::new(schema),
            self.config.page_size,
        )?;
        let table_id = self.catalog.add_table(file, name);
        info!("created table {} ({})", name, table_id);
        Ok(table_id)
    }

    /// Register a table whose file already exists in the data directory.
    pub fn open_table(&self, name: &str, schema: Schema) -> Result<TableId> {
        let path = self.table_path(name);
        if !path.exists() {
            bail!("Table '{}' has no file at {}", name, path.display());
        }
        self.retire_table(name)?;
        let table_id = self.catalog.allocate_table_id();
        let file = HeapFile::open(&path, table_id, Arc::new(schema), self.config.page_size)?;
        let table_id = self.catalog.add_table(file, name);
        info!("opened table {} ({})", name, table_id);
        Ok(table_id)
    }

    pub fn begin_transaction(&self) -> TransactionId {
        self.transactions.next_id()
    }

    /// Everything an operator tree needs, on behalf of `tid`.
    pub fn context(&self, tid: TransactionId) -> ExecutionContext {
        ExecutionContext::new(self.catalog.clone(), self.buffer_pool.clone(), tid)
    }

    /// Write every dirty cached page back to disk.
    pub fn flush(&self) -> Result<()> {
        self.buffer_pool.flush_all_pages()?;
        Ok(())
    }

    pub fn shutdown(self) -> Result<()> {
        self.flush()?;
        info!("database at {} shut down", self.config.data_dir.display());
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.buffer_pool.flush_all_pages() {
            warn!("flush on drop failed: {}", e);
        }
    }
}
