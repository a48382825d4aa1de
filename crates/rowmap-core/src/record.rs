//! Records: typed rows with a closed set of fields
//!
//! A [`RecordType`] is built once per table from the declared columns. It
//! fixes which field names exist and which scalar type each one coerces to.
//! A [`Record`] is one row of that type:
//!
//! - [`Record::set`] rejects undeclared names with
//!   [`MapperError::InvalidField`] and coerces everything else
//! - [`Record::get`] rejects undeclared names with
//!   [`MapperError::UnknownAttribute`]
//! - the identity is only written by the owning store, on insert or when
//!   a row is materialized
//!
//! A record is either [`RecordState::Transient`] (never saved) or
//! [`RecordState::Persisted`] (has an identity). [`Record::save`] inserts
//! the former and updates the latter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{MapperError, MapperResult};
use crate::schema::{ScalarType, TableSchema};
use crate::store::RecordStore;
use crate::value::Value;

/// A field a record type accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub scalar_type: ScalarType,
}

/// The shape of every record of one table
#[derive(Debug)]
pub struct RecordType {
    name: String,
    identity: String,
    fields: Vec<FieldDescriptor>,
    positions: HashMap<String, usize>,
}

impl RecordType {
    pub fn new(
        name: impl Into<String>,
        identity: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        let positions = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name.clone(), i))
            .collect();

        Self {
            name: name.into(),
            identity: identity.into(),
            fields,
            positions,
        }
    }

    /// Build the record type for a validated schema, named `<table>_Mapper`
    pub fn for_schema(schema: &TableSchema) -> Self {
        let fields = schema
            .columns()
            .iter()
            .map(|column| FieldDescriptor {
                name: column.name.clone(),
                scalar_type: column.scalar_type,
            })
            .collect();

        Self::new(
            format!("{}_Mapper", schema.table_name()),
            schema.identity(),
            fields,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Declared fields, identity excluded
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        name == self.identity || self.positions.contains_key(name)
    }

    /// Resolve a field name to its slot and coerce `value` for it
    fn coerce(&self, field: &str, value: Value) -> MapperResult<(usize, Value)> {
        if field == self.identity {
            return Err(MapperError::ReadOnlyIdentity {
                field: field.to_string(),
                record_type: self.name.clone(),
            });
        }

        let Some(&position) = self.positions.get(field) else {
            return Err(MapperError::InvalidField {
                field: field.to_string(),
                record_type: self.name.clone(),
            });
        };

        let descriptor = &self.fields[position];
        let value = value
            .coerce(descriptor.scalar_type)
            .map_err(|e| MapperError::Coercion {
                field: field.to_string(),
                record_type: self.name.clone(),
                expected: e.expected,
                found: e.found,
            })?;

        Ok((position, value))
    }
}

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet written; `save` inserts
    Transient,
    /// Written with this identity; `save` updates
    Persisted(i64),
}

/// One row of a table
#[derive(Clone)]
pub struct Record {
    kind: Arc<RecordType>,
    owner: RecordStore,
    /// `None` means the field was never set on this record
    values: Vec<Option<Value>>,
    id: Option<i64>,
}

impl Record {
    /// An empty transient record of `kind` owned by `owner`
    pub(crate) fn empty(kind: Arc<RecordType>, owner: RecordStore) -> Self {
        let values = vec![None; kind.fields.len()];
        Self {
            kind,
            owner,
            values,
            id: None,
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.kind
    }

    pub(crate) fn kind(&self) -> &Arc<RecordType> {
        &self.kind
    }

    /// The identity, once persisted
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn state(&self) -> RecordState {
        match self.id {
            Some(id) => RecordState::Persisted(id),
            None => RecordState::Transient,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Assign `value` to `field`, coercing it to the field's type
    ///
    /// On error the record is left unchanged.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> MapperResult<()> {
        let (position, value) = self.kind.coerce(field, value.into())?;
        self.values[position] = Some(value);
        Ok(())
    }

    /// Read a field
    ///
    /// Declared fields that were never set read as `Value::Null`; the
    /// identity reads as an integer or `Null`.
    pub fn get(&self, field: &str) -> MapperResult<Value> {
        if field == self.kind.identity {
            return Ok(self.id.map_or(Value::Null, Value::Integer));
        }

        match self.kind.positions.get(field) {
            Some(&position) => Ok(self.values[position].clone().unwrap_or(Value::Null)),
            None => Err(MapperError::UnknownAttribute {
                field: field.to_string(),
                record_type: self.kind.name.clone(),
            }),
        }
    }

    /// Whether `field` currently carries a value (possibly `Null`)
    pub fn is_set(&self, field: &str) -> bool {
        if field == self.kind.identity {
            return self.id.is_some();
        }
        self.kind
            .positions
            .get(field)
            .is_some_and(|&position| self.values[position].is_some())
    }

    /// Iterate over the fields this record carries, in declaration order
    pub fn present_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kind
            .fields
            .iter()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.as_ref().map(|v| (field.name.as_str(), v)))
    }

    /// Persist this record through its owning store
    ///
    /// Transient records are inserted and receive an identity; persisted
    /// records are updated in place.
    pub fn save(&mut self) -> MapperResult<()> {
        let owner = self.owner.clone();
        owner.save(self)
    }

    /// JSON object of the identity and every present field
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            self.kind.identity.clone(),
            self.id.map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        for (name, value) in self.present_fields() {
            let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            map.insert(name.to_string(), json);
        }
        serde_json::Value::Object(map)
    }

    pub(crate) fn assign_identity(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.kind.name);
        s.field(&self.kind.identity, &self.id);
        for (name, value) in self.present_fields() {
            s.field(name, value);
        }
        s.finish()
    }
}
