use crate::storage::disk::DEFAULT_PAGE_SIZE;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings fixed for the lifetime of a [`crate::database::Database`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding one `<table>.dat` heap file per table
    pub data_dir: PathBuf,
    /// Bytes per page for every table created through this database
    pub page_size: usize,
    /// Maximum number of pages the buffer pool caches
    pub buffer_pool_pages: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./heapdb_data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: 50,
        }
    }
}

impl DatabaseConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page size must be positive");
        }
        if self.data_dir.as_os_str().is_empty() {
            bail!("data directory must not be empty");
        }
        Ok(())
    }
}
