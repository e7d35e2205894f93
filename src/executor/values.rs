//! Literal rows as an executor, used as the child of inserts.

use crate::access::{Schema, Tuple, Value};
use crate::executor::{ensure_open, Executor};
use anyhow::Result;
use std::sync::Arc;

pub struct ValuesExecutor {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    position: usize,
    opened: bool,
}

impl ValuesExecutor {
    /// Every row is type-checked against `schema` up front.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self> {
        let schema = Arc::new(schema);
        let tuples = rows
            .into_iter()
            .map(|row| Tuple::from_values(schema.clone(), row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            tuples,
            position: 0,
            opened: false,
        })
    }
}

impl Executor for ValuesExecutor {
    fn open(&mut self) -> Result<()> {
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;
        let tuple = self.tuples.get(self.position).cloned();
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
