//! Property values.
//!
//! A wire value is an object carrying exactly one `<type>Value` key plus an
//! optional `excludeFromIndexes` flag:
//!
//! ```json
//! {"excludeFromIndexes": false, "stringValue": "hello"}
//! ```

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};

use crate::entity::Entity;
use crate::error::{Error, ErrorKind, Result};
use crate::key::Key;
use crate::lat_lng::LatLng;
use crate::repr::{self, Repr};

/// The typed payload of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    Key(Key),
    String(String),
    Blob(Vec<u8>),
    GeoPoint(LatLng),
    Array(Vec<Value>),
    Entity(Entity),
}

impl TypedValue {
    /// The wire key carrying this payload, e.g. `"stringValue"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Null => "nullValue",
            TypedValue::Boolean(_) => "booleanValue",
            TypedValue::Integer(_) => "integerValue",
            TypedValue::Double(_) => "doubleValue",
            TypedValue::Timestamp(_) => "timestampValue",
            TypedValue::Key(_) => "keyValue",
            TypedValue::String(_) => "stringValue",
            TypedValue::Blob(_) => "blobValue",
            TypedValue::GeoPoint(_) => "geoPointValue",
            TypedValue::Array(_) => "arrayValue",
            TypedValue::Entity(_) => "entityValue",
        }
    }

    fn payload(&self) -> JsonValue {
        match self {
            TypedValue::Null => JsonValue::String("NULL_VALUE".into()),
            TypedValue::Boolean(b) => JsonValue::Bool(*b),
            TypedValue::Integer(i) => JsonValue::String(i.to_string()),
            TypedValue::Double(d) => double_to_json(*d),
            TypedValue::Timestamp(ts) => {
                JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            TypedValue::Key(key) => key.to_repr(),
            TypedValue::String(s) => JsonValue::String(s.clone()),
            TypedValue::Blob(bytes) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            TypedValue::GeoPoint(point) => point.to_repr(),
            TypedValue::Array(values) => {
                let values: Vec<JsonValue> = values.iter().map(Repr::to_repr).collect();
                json!({ "values": values })
            }
            TypedValue::Entity(entity) => entity.to_repr(),
        }
    }

    fn from_fields(obj: &repr::Object) -> Result<Self> {
        if obj.contains_key("nullValue") {
            return Ok(TypedValue::Null);
        }
        if let Some(value) = obj.get("booleanValue") {
            return value
                .as_bool()
                .map(TypedValue::Boolean)
                .ok_or_else(|| Error::invalid_type("booleanValue", "boolean"));
        }
        if let Some(value) = obj.get("integerValue") {
            return Ok(TypedValue::Integer(repr::int64(value, "integerValue")?));
        }
        if let Some(value) = obj.get("doubleValue") {
            return Ok(TypedValue::Double(double_from_json(value)?));
        }
        if let Some(value) = obj.get("timestampValue") {
            let text = value
                .as_str()
                .ok_or_else(|| Error::invalid_type("timestampValue", "string"))?;
            let ts = DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc);
            return Ok(TypedValue::Timestamp(ts));
        }
        if let Some(value) = obj.get("keyValue") {
            return Ok(TypedValue::Key(Key::from_repr(value)?));
        }
        if let Some(value) = obj.get("stringValue") {
            return value
                .as_str()
                .map(|s| TypedValue::String(s.to_string()))
                .ok_or_else(|| Error::invalid_type("stringValue", "string"));
        }
        if let Some(value) = obj.get("blobValue") {
            let text = value
                .as_str()
                .ok_or_else(|| Error::invalid_type("blobValue", "string"))?;
            let bytes = base64::engine::general_purpose::STANDARD.decode(text)?;
            return Ok(TypedValue::Blob(bytes));
        }
        if let Some(value) = obj.get("geoPointValue") {
            return Ok(TypedValue::GeoPoint(LatLng::from_repr(value)?));
        }
        if let Some(value) = obj.get("arrayValue") {
            let array = repr::object(value, "arrayValue")?;
            let values = repr::optional_array(array, "values")?
                .iter()
                .map(Value::from_repr)
                .collect::<Result<Vec<_>>>()?;
            return Ok(TypedValue::Array(values));
        }
        if let Some(value) = obj.get("entityValue") {
            return Ok(TypedValue::Entity(Entity::from_repr(value)?));
        }

        Err(Error::new(ErrorKind::InvalidValue(format!(
            "value has no recognized type key (keys: {:?})",
            obj.keys().collect::<Vec<_>>()
        ))))
    }
}

/// Non-finite doubles travel as the strings `"NaN"`, `"Infinity"` and
/// `"-Infinity"`.
fn double_to_json(d: f64) -> JsonValue {
    if d.is_nan() {
        JsonValue::String("NaN".into())
    } else if d.is_infinite() {
        let text = if d.is_sign_positive() { "Infinity" } else { "-Infinity" };
        JsonValue::String(text.into())
    } else {
        json!(d)
    }
}

fn double_from_json(value: &JsonValue) -> Result<f64> {
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::invalid_type("doubleValue", "number")),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse::<f64>().map_err(|e| {
                Error::with_source(ErrorKind::InvalidValue(format!("double: {}", e)), e)
            }),
        },
        _ => Err(Error::invalid_type("doubleValue", "number")),
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(value: DateTime<Utc>) -> Self {
        TypedValue::Timestamp(value)
    }
}

impl From<Key> for TypedValue {
    fn from(value: Key) -> Self {
        TypedValue::Key(value)
    }
}

impl From<LatLng> for TypedValue {
    fn from(value: LatLng) -> Self {
        TypedValue::GeoPoint(value)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(value: Vec<u8>) -> Self {
        TypedValue::Blob(value)
    }
}

impl From<Vec<Value>> for TypedValue {
    fn from(value: Vec<Value>) -> Self {
        TypedValue::Array(value)
    }
}

impl From<Entity> for TypedValue {
    fn from(value: Entity) -> Self {
        TypedValue::Entity(value)
    }
}

/// A property value together with its indexing flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub value: TypedValue,
    pub exclude_from_indexes: bool,
}

impl Value {
    /// Wrap a payload; the value is indexed.
    pub fn new(value: impl Into<TypedValue>) -> Self {
        Self {
            value: value.into(),
            exclude_from_indexes: false,
        }
    }

    pub fn excluded_from_indexes(mut self, exclude: bool) -> Self {
        self.exclude_from_indexes = exclude;
        self
    }
}

impl Repr for Value {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "value")?;
        let exclude_from_indexes = match obj.get("excludeFromIndexes") {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Bool(b)) => *b,
            Some(_) => return Err(Error::invalid_type("excludeFromIndexes", "boolean")),
        };

        Ok(Self {
            value: TypedValue::from_fields(obj)?,
            exclude_from_indexes,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        data.insert(
            "excludeFromIndexes".into(),
            JsonValue::Bool(self.exclude_from_indexes),
        );
        data.insert(self.value.type_name().into(), self.value.payload());
        JsonValue::Object(data)
    }
}
