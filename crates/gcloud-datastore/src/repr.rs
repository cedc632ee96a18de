//! The `Repr` trait and helpers for reading Datastore JSON wire forms.

use serde_json::{Map, Value as JsonValue};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// Conversion between a typed Datastore object and its JSON wire form.
///
/// `from_repr(&x.to_repr())` reproduces `x` for every implementor. Fields that
/// hold their default value are omitted by `to_repr` and restored to that
/// default by `from_repr`.
pub trait Repr: Sized {
    /// Decode from a wire form.
    fn from_repr(data: &JsonValue) -> Result<Self>;

    /// Encode into a wire form.
    fn to_repr(&self) -> JsonValue;
}

pub(crate) type Object = Map<String, JsonValue>;

pub(crate) fn object<'a>(data: &'a JsonValue, field: &str) -> Result<&'a Object> {
    data.as_object()
        .ok_or_else(|| Error::invalid_type(field, "object"))
}

pub(crate) fn required<'a>(obj: &'a Object, key: &str) -> Result<&'a JsonValue> {
    obj.get(key).ok_or_else(|| Error::missing_key(key))
}

pub(crate) fn required_str(obj: &Object, key: &str) -> Result<String> {
    required(obj, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_type(key, "string"))
}

pub(crate) fn required_bool(obj: &Object, key: &str) -> Result<bool> {
    required(obj, key)?
        .as_bool()
        .ok_or_else(|| Error::invalid_type(key, "boolean"))
}

/// Absent and `null` both read as the empty string.
pub(crate) fn optional_str(obj: &Object, key: &str) -> Result<String> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(String::new()),
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::invalid_type(key, "string")),
    }
}

pub(crate) fn optional_array<'a>(obj: &'a Object, key: &str) -> Result<&'a [JsonValue]> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(&[]),
        Some(JsonValue::Array(items)) => Ok(items),
        Some(_) => Err(Error::invalid_type(key, "array")),
    }
}

/// Reads an int64 that the wire may carry either as a number or as a decimal
/// string.
pub(crate) fn int64(value: &JsonValue, field: &str) -> Result<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::invalid_type(field, "integer")),
        JsonValue::String(s) => Ok(s.parse::<i64>()?),
        _ => Err(Error::invalid_type(field, "integer")),
    }
}

/// Reads a non-negative count. Absent, `null`, `false`, `0` and `""` all read
/// as zero.
pub(crate) fn optional_count(obj: &Object, key: &str) -> Result<u32> {
    let value = match obj.get(key) {
        None | Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => return Ok(0),
        Some(JsonValue::String(s)) if s.is_empty() => return Ok(0),
        Some(value) => int64(value, key)?,
    };

    u32::try_from(value).map_err(|_| {
        Error::new(ErrorKind::InvalidValue(format!(
            "{} must be a non-negative 32-bit integer, got {}",
            key, value
        )))
    })
}

pub(crate) fn required_enum<T>(obj: &Object, key: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    required(obj, key)?
        .as_str()
        .ok_or_else(|| Error::invalid_type(key, "string"))?
        .parse()
}

pub(crate) fn optional_enum<T>(obj: &Object, key: &str) -> Result<T>
where
    T: FromStr<Err = Error> + Default,
{
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(T::default()),
        Some(JsonValue::String(s)) => s.parse(),
        Some(_) => Err(Error::invalid_type(key, "string")),
    }
}

/// `{"name": name}`, the shape Datastore uses for property and kind references.
pub(crate) fn name_reference(name: &str) -> JsonValue {
    serde_json::json!({ "name": name })
}

pub(crate) fn read_name_reference(data: &JsonValue, field: &str) -> Result<String> {
    required_str(object(data, field)?, "name")
}
