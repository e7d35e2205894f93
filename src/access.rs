//! Access layer for tuple-oriented operations.
//!
//! - **Value / DataType**: field values and their fixed-width encodings
//! - **Schema**: ordered, named, typed columns
//! - **Tuple**: one row, optionally addressed by a [`RecordId`]
//! - **heap**: tuple insert/delete and scans over a whole heap file, routed
//!   through the buffer pool

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use scan::HeapFileIterator;
pub use schema::{ColumnInfo, Schema};
pub use tuple::{RecordId, Tuple};
pub use value::{CompareOp, DataType, Value, STRING_LEN};
