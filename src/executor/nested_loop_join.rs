//! Nested loop join executor implementation.
//!
//! For every tuple of the left child the right child is scanned in full and
//! rewound. Output tuples are the left fields followed by the right fields.

use crate::access::{Schema, Tuple};
use crate::executor::{ensure_open, Executor, JoinCondition};
use anyhow::Result;
use std::sync::Arc;

pub struct NestedLoopJoinExecutor {
    /// Outer input
    left: Box<dyn Executor>,
    /// Inner input, rewound once per outer tuple
    right: Box<dyn Executor>,
    condition: Box<dyn JoinCondition>,
    output_schema: Arc<Schema>,
    /// Outer tuple currently being matched
    current_left: Option<Tuple>,
    opened: bool,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        condition: impl JoinCondition + 'static,
    ) -> Self {
        let output_schema = Arc::new(Schema::merge(left.output_schema(), right.output_schema()));
        Self {
            left,
            right,
            condition: Box::new(condition),
            output_schema,
            current_left: None,
            opened: false,
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn open(&mut self) -> Result<()> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;

        loop {
            if self.current_left.is_none() {
                match self.left.next()? {
                    Some(tuple) => self.current_left = Some(tuple),
                    None => return Ok(None),
                }
            }

            let Some(right) = self.right.next()? else {
                // inner side exhausted: restart it for the next outer tuple
                self.right.rewind()?;
                self.current_left = None;
                continue;
            };

            if let Some(left) = &self.current_left {
                if self.condition.matches(left, &right)? {
                    return Ok(Some(Tuple::concat(
                        left,
                        &right,
                        self.output_schema.clone(),
                    )));
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.opened = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
