use crate::access::schema::Schema;
use crate::access::value::Value;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Storage location of a tuple: a page and a slot on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot_id)
    }
}

/// Represents a row in the database
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Option<Value>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple with every field unset.
    pub fn new(schema: Arc<Schema>) -> Self {
        let fields = vec![None; schema.num_fields()];
        Self {
            schema,
            fields,
            record_id: None,
        }
    }

    /// Create a tuple and assign every field in order.
    pub fn from_values(schema: Arc<Schema>, values: Vec<Value>) -> StorageResult<Self> {
        if values.len() != schema.num_fields() {
            return Err(StorageError::FieldIndexOutOfRange {
                index: values.len(),
                num_fields: schema.num_fields(),
            });
        }
        let mut tuple = Tuple::new(schema);
        for (i, value) in values.into_iter().enumerate() {
            tuple.set_field(i, value)?;
        }
        Ok(tuple)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Assign field `index`. The value must have the column's type.
    pub fn set_field(&mut self, index: usize, value: Value) -> StorageResult<()> {
        let expected = self.schema.field_type(index)?;
        if !value.is_compatible_with(expected) {
            return Err(StorageError::TypeMismatch {
                index,
                expected,
                actual: value.data_type(),
            });
        }
        if let Value::String(s) = &value {
            if s.len() > crate::access::value::STRING_LEN {
                return Err(StorageError::ValueTooLong {
                    len: s.len(),
                    max: crate::access::value::STRING_LEN,
                });
            }
        }
        self.fields[index] = Some(value);
        Ok(())
    }

    /// Field `index`, or `None` if it was never assigned.
    pub fn field(&self, index: usize) -> StorageResult<Option<&Value>> {
        self.fields
            .get(index)
            .map(Option::as_ref)
            .ok_or(StorageError::FieldIndexOutOfRange {
                index,
                num_fields: self.fields.len(),
            })
    }

    pub fn fields(&self) -> impl Iterator<Item = Option<&Value>> {
        self.fields.iter().map(Option::as_ref)
    }

    /// Re-tag this tuple with a type-equal schema (e.g. one with aliased names).
    pub fn with_schema(mut self, schema: Arc<Schema>) -> StorageResult<Self> {
        if *schema != *self.schema {
            return Err(StorageError::SchemaMismatch {
                expected: schema.to_string(),
                actual: self.schema.to_string(),
            });
        }
        self.schema = schema;
        Ok(self)
    }

    /// Concatenate the fields of two tuples under the merged schema.
    pub fn concat(left: &Tuple, right: &Tuple, schema: Arc<Schema>) -> Tuple {
        let fields = left
            .fields
            .iter()
            .chain(right.fields.iter())
            .cloned()
            .collect();
        Tuple {
            schema,
            fields,
            record_id: None,
        }
    }

    /// Write the fixed-width encoding of every field. All fields must be set.
    pub fn encode<W: Write>(&self, out: &mut W) -> StorageResult<()> {
        for (i, field) in self.fields.iter().enumerate() {
            let value = field.as_ref().ok_or(StorageError::UnsetField(i))?;
            value
                .encode(out)
                .map_err(|e| StorageError::Malformed(e.to_string()))?;
        }
        Ok(())
    }

    pub fn decode<R: Read>(schema: Arc<Schema>, input: &mut R) -> StorageResult<Tuple> {
        let fields = schema
            .types()
            .map(|data_type| Value::decode(data_type, input).map(Some))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Tuple {
            schema,
            fields,
            record_id: None,
        })
    }
}

/// Tuples compare by field contents; the storage location is not part of equality.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            if let Some(value) = field {
                write!(f, "{}", value)?;
            }
        }
        Ok(())
    }
}
