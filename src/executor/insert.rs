//! Insert executor implementation.

use crate::catalog::TableId;
use crate::executor::{ensure_open, ExecutionContext, Executor, Mutation};
use crate::storage::StorageError;
use anyhow::Result;
use log::debug;

/// Executor for inserting the child's tuples into a table
pub struct InsertExecutor {
    context: ExecutionContext,
    table_id: TableId,
    child: Box<dyn Executor>,
    opened: bool,
}

impl InsertExecutor {
    /// The child's output must be type-equal to the table's schema.
    pub fn new(context: ExecutionContext, table_id: TableId, child: Box<dyn Executor>) -> Result<Self> {
        let table_schema = context.catalog.schema(table_id)?;
        if **child.output_schema() != *table_schema {
            return Err(StorageError::SchemaMismatch {
                expected: table_schema.to_string(),
                actual: child.output_schema().to_string(),
            }
            .into());
        }
        Ok(Self {
            context,
            table_id,
            child,
            opened: false,
        })
    }
}

impl Mutation for InsertExecutor {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn execute(&mut self) -> Result<usize> {
        ensure_open(self.opened)?;

        let schema = self.context.catalog.schema(self.table_id)?;
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            // stored under the table's own column names
            let mut tuple = tuple.with_schema(schema.clone())?;
            self.context
                .buffer_pool
                .insert_tuple(self.context.transaction_id, self.table_id, &mut tuple)?;
            count += 1;
        }
        debug!("inserted {} tuples into table {}", count, self.table_id);
        Ok(count)
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }
}
