//! Delete executor implementation.

use crate::executor::{ensure_open, ExecutionContext, Executor, Mutation};
use anyhow::Result;
use log::debug;

/// Executor that deletes every tuple its child produces. Child tuples must
/// carry the record id they were read from, as scans do.
pub struct DeleteExecutor {
    context: ExecutionContext,
    child: Box<dyn Executor>,
    opened: bool,
}

impl DeleteExecutor {
    pub fn new(context: ExecutionContext, child: Box<dyn Executor>) -> Self {
        Self {
            context,
            child,
            opened: false,
        }
    }
}

impl Mutation for DeleteExecutor {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn execute(&mut self) -> Result<usize> {
        ensure_open(self.opened)?;

        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.context
                .buffer_pool
                .delete_tuple(self.context.transaction_id, &tuple)?;
            count += 1;
        }
        debug!("deleted {} tuples", count);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{CompareOp, DataType, Schema, Value};
    use crate::catalog::TableId;
    use crate::executor::test_utils::*;
    use crate::executor::{FilterExecutor, Operator, Predicate, SeqScanExecutor, ValuesExecutor};
    use crate::storage::StorageError;
    use tempfile::{tempdir, TempDir};

    fn setup() -> Result<(TempDir, ExecutionContext, TableId)> {
        let dir = tempdir()?;
        let context = create_test_context();
        let table_id = create_table(
            &context,
            &dir,
            "items",
            Schema::from_pairs([("id", DataType::Int32), ("qty", DataType::Int32)]),
        )?;
        insert_rows(
            &context,
            table_id,
            (1..=5).map(|i| vec![Value::Int32(i), Value::Int32(i * 10)]).collect(),
        )?;
        Ok((dir, context, table_id))
    }

    fn remaining(context: &ExecutionContext, table_id: TableId) -> Result<Vec<i32>> {
        let mut scan = SeqScanExecutor::for_table(context, table_id)?;
        scan.open()?;
        let mut ids: Vec<i32> = drain(&mut scan)?.iter().map(|t| int(t, 0)).collect();
        ids.sort();
        Ok(ids)
    }

    #[test]
    fn test_delete_filtered() -> Result<()> {
        let (_dir, context, table_id) = setup()?;

        let scan = Box::new(SeqScanExecutor::for_table(&context, table_id)?);
        let filter = Box::new(FilterExecutor::new(
            scan,
            Predicate::new(1, CompareOp::GreaterThanOrEq, 30),
        ));
        let mut delete = Operator::effect(DeleteExecutor::new(context.clone(), filter));

        delete.open()?;
        assert_eq!(int(&delete.next()?.expect("count tuple"), 0), 3);
        assert!(delete.next()?.is_none());
        delete.close();

        assert_eq!(remaining(&context, table_id)?, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_delete_all() -> Result<()> {
        let (_dir, context, table_id) = setup()?;

        let scan = Box::new(SeqScanExecutor::for_table(&context, table_id)?);
        let mut delete = Operator::effect(DeleteExecutor::new(context.clone(), scan));
        delete.open()?;
        assert_eq!(int(&delete.next()?.expect("count tuple"), 0), 5);

        assert!(remaining(&context, table_id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_requires_record_id() -> Result<()> {
        let (_dir, context, _table_id) = setup()?;

        let schema = Schema::from_pairs([("id", DataType::Int32), ("qty", DataType::Int32)]);
        let child = Box::new(ValuesExecutor::new(
            schema,
            vec![vec![Value::Int32(1), Value::Int32(10)]],
        )?);
        let mut delete = DeleteExecutor::new(context, child);
        delete.open()?;

        let err = delete.execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::MissingRecordId)
        ));
        Ok(())
    }
}
