//! Tuple schemas.
//!
//! A [`Schema`] is an ordered list of typed, optionally named columns. Every
//! column type has a fixed width, so the encoded size of a tuple is known from
//! its schema alone.
//!
//! Schema equality compares the type sequence only. Two schemas that differ
//! only in column names are equal; operators rely on this when checking that a
//! child produces tuples a table can store.

use crate::access::value::DataType;
use crate::storage::error::{StorageError, StorageResult};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Information about a column in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.data_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Build a schema from `(name, type)` pairs.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, DataType)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, data_type)| ColumnInfo::new(name, data_type))
                .collect(),
        )
    }

    /// Build a schema of anonymous columns.
    pub fn from_types(types: &[DataType]) -> Self {
        Self::new(types.iter().map(|t| ColumnInfo::new("", *t)).collect())
    }

    /// Concatenate two schemas, `left` columns first.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        Schema::new(
            left.columns
                .iter()
                .chain(right.columns.iter())
                .cloned()
                .collect(),
        )
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> StorageResult<&ColumnInfo> {
        self.columns
            .get(index)
            .ok_or(StorageError::FieldIndexOutOfRange {
                index,
                num_fields: self.columns.len(),
            })
    }

    pub fn field_name(&self, index: usize) -> StorageResult<&str> {
        self.column(index).map(|col| col.name.as_str())
    }

    pub fn field_type(&self, index: usize) -> StorageResult<DataType> {
        self.column(index).map(|col| col.data_type)
    }

    /// Index of the first column called `name`.
    pub fn index_of(&self, name: &str) -> StorageResult<usize> {
        self.columns
            .iter()
            .position(|col| col.name == name)
            .ok_or_else(|| StorageError::FieldNameNotFound(name.to_string()))
    }

    /// Encoded size in bytes of a tuple with this schema.
    pub fn byte_size(&self) -> usize {
        self.columns.iter().map(|col| col.data_type.width()).sum()
    }

    pub fn types(&self) -> impl Iterator<Item = DataType> + '_ {
        self.columns.iter().map(|col| col.data_type)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnInfo> {
        self.columns.iter()
    }

    /// Same types, every column renamed to `prefix.name`.
    pub fn with_prefix(&self, prefix: &str) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|col| ColumnInfo::new(format!("{}.{}", prefix, col.name), col.data_type))
                .collect(),
        )
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.types().eq(other.types())
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for data_type in self.types() {
            data_type.hash(state);
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a ColumnInfo;
    type IntoIter = std::slice::Iter<'a, ColumnInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
