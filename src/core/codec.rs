//! Pluggable wire codecs for nested typed objects.
//!
//! Containers and scalars have a fixed JSON form. Typed [`Object`]s are
//! encoded by the codec registered under their type name; unregistered types
//! fall back to a plain field map.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::core::{Object, OdmError, Result, Value};

/// Encodes and decodes one object type.
pub trait ObjectCodec: Send + Sync {
    fn type_name(&self) -> &str;

    fn to_wire(&self, object: &Object, codecs: &CodecRegistry) -> Result<Json>;

    fn from_wire(&self, wire: &Json, codecs: &CodecRegistry) -> Result<Object>;

    /// Zero value used when a loaded document lacks the field.
    fn empty(&self) -> Object;
}

/// Field-for-field codec driven by a template object.
///
/// Fields whose template value is itself an object are decoded with that
/// object's codec; everything else is decoded untyped.
#[derive(Debug, Clone)]
pub struct FieldMapCodec {
    template: Object,
}

impl FieldMapCodec {
    pub fn new(template: Object) -> Self {
        Self { template }
    }
}

impl ObjectCodec for FieldMapCodec {
    fn type_name(&self) -> &str {
        self.template.type_name()
    }

    fn to_wire(&self, object: &Object, codecs: &CodecRegistry) -> Result<Json> {
        encode_fields(object, codecs)
    }

    fn from_wire(&self, wire: &Json, codecs: &CodecRegistry) -> Result<Object> {
        let map = wire.as_object().ok_or_else(|| {
            OdmError::Codec(format!(
                "{} expects a JSON object, got {}",
                self.type_name(),
                json_kind(wire)
            ))
        })?;

        let mut object = Object::new(self.type_name());
        for (name, field_wire) in map {
            let value = match self.template.get(name) {
                Some(template) => codecs.decode_like(template, field_wire)?,
                None => Value::from_wire(field_wire),
            };
            object.insert(name.clone(), value);
        }
        Ok(object)
    }

    fn empty(&self) -> Object {
        self.template.clone()
    }
}

#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ObjectCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: impl ObjectCodec + 'static) -> &mut Self {
        self.codecs
            .insert(codec.type_name().to_string(), Arc::new(codec));
        self
    }

    pub fn with(mut self, codec: impl ObjectCodec + 'static) -> Self {
        self.register(codec);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn ObjectCodec>> {
        self.codecs.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    pub fn to_wire(&self, value: &Value) -> Result<Json> {
        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.to_wire(item))
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            Value::Map(map) => {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.to_wire(item)?);
                }
                Ok(Json::Object(out))
            }
            Value::Object(object) => match self.get(object.type_name()) {
                Some(codec) => codec.to_wire(object, self),
                None => encode_fields(object, self),
            },
            scalar => scalar.scalar_to_wire(),
        }
    }

    /// Decodes `wire` using the shape of `template` to pick object codecs.
    pub fn decode_like(&self, template: &Value, wire: &Json) -> Result<Value> {
        match (template, wire) {
            (_, Json::Null) => Ok(Value::Null),
            (Value::Object(object), Json::Object(_)) => {
                let decoded = match self.get(object.type_name()) {
                    Some(codec) => codec.from_wire(wire, self)?,
                    None => FieldMapCodec::new(object.clone()).from_wire(wire, self)?,
                };
                Ok(Value::Object(decoded))
            }
            _ => Ok(Value::from_wire(wire)),
        }
    }

    /// Empty value with the same shape as `prior`.
    pub fn neutral_like(&self, prior: &Value) -> Value {
        match prior {
            Value::Sequence(_) => Value::Sequence(Vec::new()),
            Value::Map(_) => Value::Map(Default::default()),
            Value::Object(object) => match self.get(object.type_name()) {
                Some(codec) => Value::Object(codec.empty()),
                None => {
                    let mut empty = Object::new(object.type_name());
                    for (name, field) in object.fields() {
                        empty.insert(name.clone(), self.neutral_like(field));
                    }
                    Value::Object(empty)
                }
            },
            _ => Value::Null,
        }
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("types", &names).finish()
    }
}

fn encode_fields(object: &Object, codecs: &CodecRegistry) -> Result<Json> {
    let mut out = Map::new();
    for (name, value) in object.fields() {
        out.insert(name.clone(), codecs.to_wire(value)?);
    }
    Ok(Json::Object(out))
}

pub(crate) fn json_kind(wire: &Json) -> &'static str {
    match wire {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
