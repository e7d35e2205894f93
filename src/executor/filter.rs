//! Filter executor implementation.
//!
//! Passes through the child's tuples that satisfy a predicate, unchanged and
//! in the child's order.

use crate::access::{Schema, Tuple};
use crate::executor::{ensure_open, Executor, TuplePredicate};
use anyhow::Result;
use std::sync::Arc;

/// Executor that filters tuples based on a predicate
pub struct FilterExecutor {
    /// Child executor that produces tuples
    child: Box<dyn Executor>,
    /// Condition a tuple must satisfy to be returned
    predicate: Box<dyn TuplePredicate>,
    /// Output schema (same as child's schema)
    output_schema: Arc<Schema>,
    opened: bool,
}

impl FilterExecutor {
    pub fn new(child: Box<dyn Executor>, predicate: impl TuplePredicate + 'static) -> Self {
        let output_schema = child.output_schema().clone();
        Self {
            child,
            predicate: Box::new(predicate),
            output_schema,
            opened: false,
        }
    }
}

impl Executor for FilterExecutor {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;

        // Keep getting tuples from child until we find one that matches the predicate
        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
