use std::collections::BTreeMap;

use crate::core::{OdmError, Result, Value, is_reserved};

/// Per-record-type constants plus the declared default of every field.
///
/// A default fixes the field's shape: `load` decodes typed objects with the
/// codec of the declared type and resets missing fields to a neutral value
/// of that shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    type_name: String,
    index: String,
    primary_key: String,
    defaults: BTreeMap<String, Value>,
}

impl RecordSchema {
    pub fn new(
        type_name: impl Into<String>,
        index: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            index: index.into(),
            primary_key: primary_key.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Declares a field with its default value.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), default.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn default_of(&self, field: &str) -> Option<&Value> {
        self.defaults.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.defaults.contains_key(field)
    }

    /// Checks the schema can back records: non-empty index, a declared
    /// primary key, no reserved field names.
    pub fn validate(&self) -> Result<()> {
        if self.index.is_empty() {
            return Err(OdmError::InvalidState(format!(
                "schema '{}' has an empty index name",
                self.type_name
            )));
        }
        if !self.has_field(&self.primary_key) {
            return Err(OdmError::InvalidState(format!(
                "primary key '{}' is not a declared field of '{}'",
                self.primary_key, self.type_name
            )));
        }
        if let Some(name) = self.defaults.keys().find(|name| is_reserved(name)) {
            return Err(OdmError::InvalidState(format!(
                "field name '{}' of '{}' is reserved",
                name, self.type_name
            )));
        }
        Ok(())
    }
}
