//! Geographic points.

use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::repr::{self, Repr};

/// A latitude/longitude pair in degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    /// Latitude in degrees, in the range [-90.0, +90.0].
    pub latitude: f64,
    /// Longitude in degrees, in the range [-180.0, +180.0].
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

fn coordinate(obj: &repr::Object, key: &str) -> Result<f64> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(0.0),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| Error::invalid_type(key, "number")),
    }
}

impl Repr for LatLng {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "geoPointValue")?;
        Ok(Self {
            latitude: coordinate(obj, "latitude")?,
            longitude: coordinate(obj, "longitude")?,
        })
    }

    fn to_repr(&self) -> JsonValue {
        json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }
}
