//! Sequential scan executor implementation.

use crate::access::{HeapFileIterator, Schema, Tuple};
use crate::catalog::TableId;
use crate::executor::{ensure_open, ExecutionContext, Executor};
use anyhow::Result;
use std::sync::Arc;

/// Executor for sequential table scans.
///
/// Output columns are named `alias.column`; tuples keep the record id they
/// were read from so a delete can consume them.
pub struct SeqScanExecutor {
    table_id: TableId,
    alias: String,
    iter: HeapFileIterator,
    output_schema: Arc<Schema>,
    opened: bool,
}

impl SeqScanExecutor {
    pub fn new(context: &ExecutionContext, table_id: TableId, alias: &str) -> Result<Self> {
        let file = context.catalog.database_file(table_id)?;
        let output_schema = Arc::new(file.schema().with_prefix(alias));
        let iter = file.iter(&context.buffer_pool, context.transaction_id);
        Ok(Self {
            table_id,
            alias: alias.to_string(),
            iter,
            output_schema,
            opened: false,
        })
    }

    /// Scan aliased by the table's own name.
    pub fn for_table(context: &ExecutionContext, table_id: TableId) -> Result<Self> {
        let name = context.catalog.table_name(table_id)?;
        Self::new(context, table_id, &name)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Executor for SeqScanExecutor {
    fn open(&mut self) -> Result<()> {
        self.iter.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;
        match self.iter.next()? {
            Some(tuple) => Ok(Some(tuple.with_schema(self.output_schema.clone())?)),
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.iter.rewind()?;
        Ok(())
    }

    fn close(&mut self) {
        self.iter.close();
        self.opened = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
