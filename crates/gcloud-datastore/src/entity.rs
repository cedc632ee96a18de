//! Entities and query results.

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::key::Key;
use crate::repr::{self, Repr};
use crate::value::Value;

/// A Datastore entity: an optional key plus named property values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    /// Absent for entities embedded as property values.
    pub key: Option<Key>,
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(key: Option<Key>) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl Repr for Entity {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "entity")?;
        let key = match obj.get("key") {
            None | Some(JsonValue::Null) => None,
            Some(k) => Some(Key::from_repr(k)?),
        };

        let mut properties = BTreeMap::new();
        match obj.get("properties") {
            None | Some(JsonValue::Null) => {}
            Some(props) => {
                for (name, value) in repr::object(props, "properties")? {
                    properties.insert(name.clone(), Value::from_repr(value)?);
                }
            }
        }

        Ok(Self { key, properties })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        if let Some(ref key) = self.key {
            data.insert("key".into(), key.to_repr());
        }
        let properties: Map<String, JsonValue> = self
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value.to_repr()))
            .collect();
        data.insert("properties".into(), JsonValue::Object(properties));
        JsonValue::Object(data)
    }
}

/// One entity of a query result batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityResult {
    pub entity: Entity,
    /// Entity version (int64 as a decimal string). Empty for projection and
    /// keys-only results.
    pub version: String,
    /// Cursor pointing just after this result.
    pub cursor: String,
}

impl EntityResult {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            version: String::new(),
            cursor: String::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = cursor.into();
        self
    }
}

impl Repr for EntityResult {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "entityResults")?;
        let entity = Entity::from_repr(repr::required(obj, "entity")?)?;
        let version = match obj.get("version") {
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => repr::optional_str(obj, "version")?,
        };

        Ok(Self {
            entity,
            version,
            cursor: repr::optional_str(obj, "cursor")?,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        data.insert("entity".into(), self.entity.to_repr());
        if !self.version.is_empty() {
            data.insert("version".into(), self.version.clone().into());
        }
        if !self.cursor.is_empty() {
            data.insert("cursor".into(), self.cursor.clone().into());
        }
        JsonValue::Object(data)
    }
}
