pub mod heap_page;

use crate::catalog::TableId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a page: the owning table and the page's position in its file.
///
/// Orders by `(table_id, page_number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page({}, {})", self.table_id.0, self.page_number)
    }
}

pub use heap_page::HeapPage;
