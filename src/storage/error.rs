//! Storage layer error types.

use crate::access::DataType;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the storage and access layers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Type mismatch at field {index}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        index: usize,
        expected: DataType,
        actual: DataType,
    },

    #[error("Field index {index} out of range (num fields: {num_fields})")]
    FieldIndexOutOfRange { index: usize, num_fields: usize },

    #[error("No field named '{0}'")]
    FieldNameNotFound(String),

    #[error("Field {0} has not been set")]
    UnsetField(usize),

    #[error("Value too long: {len} bytes (max: {max})")]
    ValueTooLong { len: usize, max: usize },

    #[error("Schema mismatch: expected [{expected}], got [{actual}]")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Page is full: no empty slot on {0}")]
    PageFull(PageId),

    #[error("Invalid slot {slot} on {page_id}: {reason}")]
    InvalidSlot {
        page_id: PageId,
        slot: u16,
        reason: &'static str,
    },

    #[error("Slot {slot} on {page_id} is beyond the largest record id slot")]
    UnaddressableSlot { page_id: PageId, slot: usize },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Buffer pool is full: no page available for eviction")]
    CacheExhausted,

    #[error("Page size {page_size} is unusable for tuples of {tuple_size} bytes")]
    InvalidPageSize { page_size: usize, tuple_size: usize },

    #[error("Corrupt heap file {path:?}: length {len} is not a multiple of page size {page_size}")]
    CorruptFile {
        path: PathBuf,
        len: u64,
        page_size: usize,
    },

    #[error("Malformed tuple data: {0}")]
    Malformed(String),

    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Storage unreachable: {path:?}: {source}")]
    StorageUnreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
