//! Storage layer.
//!
//! Tables live in heap files: flat files of fixed-size pages. Everything above
//! this layer reaches pages through the [`BufferPool`], which caches a bounded
//! number of them and writes dirty ones back when they are evicted or flushed.
//!
//! - **HeapFile**: page-granular reads and writes of one table's file
//! - **HeapPage**: slotted page of fixed-width tuples with an occupancy bitmap
//! - **BufferPool**: page cache with LRU eviction and write-back

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, PageRef};
pub use disk::{HeapFile, DEFAULT_PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, PageId};
