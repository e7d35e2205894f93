use crate::access::Schema;
use crate::catalog::TableId;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::heap_page::{slots_per_page, MAX_SLOTS_PER_PAGE};
use crate::storage::page::{HeapPage, PageId};
use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bytes per page unless a table is configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// A table stored as a flat file of fixed-size pages. Page `n` lives at byte
/// offset `n * page_size`; the file only grows by whole pages at the tail.
pub struct HeapFile {
    path: PathBuf,
    file: Mutex<File>,
    table_id: TableId,
    schema: Arc<Schema>,
    page_size: usize,
}

impl HeapFile {
    /// Create (or truncate) the file at `path`.
    pub fn create(
        path: &Path,
        table_id: TableId,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> StorageResult<Self> {
        Self::check_page_size(&schema, page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| unreachable_at(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            table_id,
            schema,
            page_size,
        })
    }

    /// Open an existing file. Its length must be a whole number of pages.
    pub fn open(
        path: &Path,
        table_id: TableId,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> StorageResult<Self> {
        Self::check_page_size(&schema, page_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| unreachable_at(path, e))?;

        let heap_file = Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            table_id,
            schema,
            page_size,
        };
        heap_file.num_pages()?;
        Ok(heap_file)
    }

    fn check_page_size(schema: &Schema, page_size: usize) -> StorageResult<()> {
        let slots = slots_per_page(page_size, schema.byte_size());
        if slots == 0 || slots > MAX_SLOTS_PER_PAGE {
            return Err(StorageError::InvalidPageSize {
                page_size,
                tuple_size: schema.byte_size(),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file. A partial trailing page means corruption.
    pub fn num_pages(&self) -> StorageResult<u32> {
        let file = self.file.lock();
        self.num_pages_locked(&file)
    }

    fn num_pages_locked(&self, file: &File) -> StorageResult<u32> {
        let len = file
            .metadata()
            .map_err(|e| unreachable_at(&self.path, e))?
            .len();
        if len % self.page_size as u64 != 0 {
            warn!("heap file {:?} has a partial page ({} bytes)", self.path, len);
            return Err(StorageError::CorruptFile {
                path: self.path.clone(),
                len,
                page_size: self.page_size,
            });
        }
        Ok((len / self.page_size as u64) as u32)
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id.page_number as u64 * self.page_size as u64
    }

    pub fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::PageNotFound(page_id));
        }

        let mut file = self.file.lock();
        if page_id.page_number >= self.num_pages_locked(&file)? {
            return Err(StorageError::PageNotFound(page_id));
        }

        let mut buf = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.page_offset(page_id)))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| {
                warn!("failed to read {} from {:?}: {}", page_id, self.path, e);
                unreachable_at(&self.path, e)
            })?;
        drop(file);

        HeapPage::from_bytes(page_id, self.schema.clone(), buf)
    }

    /// Overwrite the page's bytes in place. Writing at the current end of the
    /// file appends it; writing further out would leave a gap and is refused.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let page_id = page.page_id();
        if page_id.table_id != self.table_id {
            return Err(StorageError::PageNotFound(page_id));
        }
        if page.data().len() != self.page_size {
            return Err(StorageError::CorruptPage {
                page_id,
                reason: format!(
                    "page holds {} bytes, file pages are {}",
                    page.data().len(),
                    self.page_size
                ),
            });
        }

        let mut file = self.file.lock();
        if page_id.page_number > self.num_pages_locked(&file)? {
            return Err(StorageError::PageNotFound(page_id));
        }

        file.seek(SeekFrom::Start(self.page_offset(page_id)))
            .and_then(|_| file.write_all(page.data()))
            .and_then(|_| file.sync_data())
            .map_err(|e| {
                warn!("failed to write {} to {:?}: {}", page_id, self.path, e);
                unreachable_at(&self.path, e)
            })?;
        Ok(())
    }

    /// Append a zeroed page at the tail and return its id.
    pub fn append_empty_page(&self) -> StorageResult<PageId> {
        let mut file = self.file.lock();
        let page_id = PageId::new(self.table_id, self.num_pages_locked(&file)?);

        let empty = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.page_offset(page_id)))
            .and_then(|_| file.write_all(&empty))
            .and_then(|_| file.sync_data())
            .map_err(|e| unreachable_at(&self.path, e))?;

        debug!("appended {} to {:?}", page_id, self.path);
        Ok(page_id)
    }
}

fn unreachable_at(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::StorageUnreachable {
        path: path.to_path_buf(),
        source,
    }
}
