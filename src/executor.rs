//! Executor layer for query execution.
//!
//! Operators follow the Volcano iterator model: a tree of executors where each
//! node pulls tuples from its children one at a time. Streaming operators
//! (scan, filter, projection, join, literal values) implement [`Executor`]
//! directly. Effectful operators (insert, delete) implement [`Mutation`]: they
//! run their child to completion once and report how many tuples they touched.
//! [`Operator`] puts both behind the same protocol so either can sit at the
//! root of a plan or under another operator, and [`QueryCursor`] adds the
//! `has_next` / `next` surface used by callers that iterate a plan by hand.

use crate::access::{DataType, Schema, Tuple, Value};
use crate::catalog::Catalog;
use crate::storage::buffer::BufferPool;
use crate::transaction::TransactionId;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use thiserror::Error;

pub mod delete;
pub mod filter;
pub mod insert;
pub mod nested_loop_join;
pub mod predicate;
pub mod projection;
pub mod seq_scan;
pub mod values;

// Re-export executors
pub use delete::DeleteExecutor;
pub use filter::FilterExecutor;
pub use insert::InsertExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use predicate::{JoinCondition, JoinPredicate, Predicate, TuplePredicate};
pub use projection::ProjectionExecutor;
pub use seq_scan::SeqScanExecutor;
pub use values::ValuesExecutor;

/// Protocol violations reported by executors. Storage failures surface as
/// [`crate::storage::StorageError`] inside the same `anyhow::Error`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor not open. Call open() first.")]
    NotOpen,

    #[error("No more tuples")]
    NoSuchElement,
}

/// Trait for streaming executors
pub trait Executor: Send {
    /// Prepare to produce tuples. Opening an already open executor restarts it.
    fn open(&mut self) -> Result<()>;

    /// Get the next tuple from the executor.
    /// Returns None when there are no more tuples.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Restart from the first tuple. Must produce the same sequence again.
    fn rewind(&mut self) -> Result<()>;

    /// Release the executor and its children. `next` fails until reopened.
    fn close(&mut self);

    /// Get the output schema of this executor
    fn output_schema(&self) -> &Arc<Schema>;
}

/// An operator that changes table contents and yields only a count.
pub trait Mutation: Send {
    fn open(&mut self) -> Result<()>;

    /// Drain the child, apply the change to each tuple and return how many
    /// were affected.
    fn execute(&mut self) -> Result<usize>;

    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Any node of a plan.
pub enum Operator {
    Stream(Box<dyn Executor>),
    Effect(MutationOperator),
}

impl Operator {
    pub fn stream(executor: impl Executor + 'static) -> Self {
        Operator::Stream(Box::new(executor))
    }

    pub fn effect(mutation: impl Mutation + 'static) -> Self {
        Operator::Effect(MutationOperator::new(Box::new(mutation)))
    }

    pub fn is_effect(&self) -> bool {
        matches!(self, Operator::Effect(_))
    }

    pub fn into_boxed(self) -> Box<dyn Executor> {
        match self {
            Operator::Stream(executor) => executor,
            Operator::Effect(mutation) => Box::new(mutation),
        }
    }
}

impl Executor for Operator {
    fn open(&mut self) -> Result<()> {
        match self {
            Operator::Stream(executor) => executor.open(),
            Operator::Effect(mutation) => mutation.open(),
        }
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        match self {
            Operator::Stream(executor) => executor.next(),
            Operator::Effect(mutation) => mutation.next(),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        match self {
            Operator::Stream(executor) => executor.rewind(),
            Operator::Effect(mutation) => mutation.rewind(),
        }
    }

    fn close(&mut self) {
        match self {
            Operator::Stream(executor) => executor.close(),
            Operator::Effect(mutation) => mutation.close(),
        }
    }

    fn output_schema(&self) -> &Arc<Schema> {
        match self {
            Operator::Stream(executor) => executor.output_schema(),
            Operator::Effect(mutation) => mutation.output_schema(),
        }
    }
}

/// Adapts a [`Mutation`] to the tuple protocol: the first `next` after open or
/// rewind runs it and returns a single `count` tuple, later calls return None.
pub struct MutationOperator {
    mutation: Box<dyn Mutation>,
    schema: Arc<Schema>,
    opened: bool,
    executed: bool,
}

impl MutationOperator {
    pub fn new(mutation: Box<dyn Mutation>) -> Self {
        Self {
            mutation,
            schema: Arc::new(Schema::from_pairs([("count", DataType::Int32)])),
            opened: false,
            executed: false,
        }
    }
}

impl Executor for MutationOperator {
    fn open(&mut self) -> Result<()> {
        self.mutation.open()?;
        self.opened = true;
        self.executed = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;
        if self.executed {
            return Ok(None);
        }

        let count = self.mutation.execute()?;
        self.executed = true;
        let count = i32::try_from(count).context("affected row count does not fit in INT")?;
        Ok(Some(Tuple::from_values(
            self.schema.clone(),
            vec![Value::Int32(count)],
        )?))
    }

    fn rewind(&mut self) -> Result<()> {
        ensure_open(self.opened)?;
        self.mutation.rewind()?;
        self.executed = false;
        Ok(())
    }

    fn close(&mut self) {
        self.mutation.close();
        self.opened = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Drives the root of a plan with a look-ahead `has_next`.
pub struct QueryCursor {
    root: Box<dyn Executor>,
    peeked: Option<Tuple>,
}

impl QueryCursor {
    pub fn new(root: Operator) -> Self {
        Self {
            root: root.into_boxed(),
            peeked: None,
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.peeked = None;
        self.root.open()
    }

    pub fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.root.next()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Fails with [`ExecutorError::NoSuchElement`] once the plan is exhausted.
    pub fn next(&mut self) -> Result<Tuple> {
        self.has_next()?;
        self.peeked
            .take()
            .ok_or_else(|| ExecutorError::NoSuchElement.into())
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.peeked = None;
        self.root.rewind()
    }

    pub fn close(&mut self) {
        self.peeked = None;
        self.root.close();
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        self.root.output_schema()
    }

    /// Open, drain and close.
    pub fn collect_all(&mut self) -> Result<Vec<Tuple>> {
        self.open()?;
        let mut tuples = Vec::new();
        while self.has_next()? {
            tuples.push(self.next()?);
        }
        self.close();
        Ok(tuples)
    }
}

/// Execution context containing shared resources
#[derive(Clone)]
pub struct ExecutionContext {
    pub catalog: Arc<Catalog>,
    pub buffer_pool: BufferPool,
    pub transaction_id: TransactionId,
}

impl ExecutionContext {
    pub fn new(catalog: Arc<Catalog>, buffer_pool: BufferPool, transaction_id: TransactionId) -> Self {
        Self {
            catalog,
            buffer_pool,
            transaction_id,
        }
    }
}

/// Shorthand for checking the open flag at the top of `next` and `rewind`.
pub(crate) fn ensure_open(opened: bool) -> Result<()> {
    if !opened {
        bail!(ExecutorError::NotOpen);
    }
    Ok(())
}
