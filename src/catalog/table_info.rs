//! Table information and metadata structures.

use crate::access::Schema;
use crate::storage::disk::HeapFile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub file: Arc<HeapFile>,
}

impl TableInfo {
    pub fn schema(&self) -> &Arc<Schema> {
        self.file.schema()
    }
}

impl fmt::Debug for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableInfo")
            .field("table_id", &self.table_id)
            .field("table_name", &self.table_name)
            .field("path", &self.file.path())
            .finish()
    }
}
