//! Projection executor implementation.
//!
//! This executor projects specific columns from a child executor, allowing for
//! column selection and reordering.

use crate::access::{ColumnInfo, DataType, Schema, Tuple};
use crate::executor::{ensure_open, Executor};
use anyhow::{bail, Result};
use std::sync::Arc;

/// Executor that projects specific columns from child tuples
pub struct ProjectionExecutor {
    /// Child executor that produces tuples
    child: Box<dyn Executor>,
    /// Indices of columns to project from the child's output
    column_indices: Vec<usize>,
    /// Output schema (projected columns)
    output_schema: Arc<Schema>,
    opened: bool,
}

impl ProjectionExecutor {
    /// Create a new projection executor
    ///
    /// `types[i]` is the declared type of output column `i`, which reads field
    /// `column_indices[i]` of the child. Column names are taken from the child.
    ///
    /// # Example
    /// ```ignore
    /// // If child produces columns [id, name, age, email]
    /// // column_indices [2, 0] would produce [age, id]
    /// ```
    pub fn new(
        child: Box<dyn Executor>,
        column_indices: Vec<usize>,
        types: Vec<DataType>,
    ) -> Result<Self> {
        if column_indices.len() != types.len() {
            bail!(
                "Projection has {} columns but {} types",
                column_indices.len(),
                types.len()
            );
        }

        let child_schema = child.output_schema();
        let columns = column_indices
            .iter()
            .zip(types)
            .map(|(&idx, data_type)| -> Result<ColumnInfo> {
                let name = child_schema.field_name(idx)?;
                Ok(ColumnInfo::new(name, data_type))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            child,
            column_indices,
            output_schema: Arc::new(Schema::new(columns)),
            opened: false,
        })
    }

    /// Project by column index, keeping the child's types.
    pub fn with_indices(child: Box<dyn Executor>, column_indices: Vec<usize>) -> Result<Self> {
        let types = column_indices
            .iter()
            .map(|&idx| child.output_schema().field_type(idx))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(child, column_indices, types)
    }
}

impl Executor for ProjectionExecutor {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        ensure_open(self.opened)?;

        let Some(input) = self.child.next()? else {
            return Ok(None);
        };

        let mut output = Tuple::new(self.output_schema.clone());
        for (i, &idx) in self.column_indices.iter().enumerate() {
            if let Some(value) = input.field(idx)? {
                output.set_field(i, value.clone())?;
            }
        }
        Ok(Some(output))
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
