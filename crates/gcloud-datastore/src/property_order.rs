//! Sort orders.

use serde_json::{json, Value as JsonValue};

use crate::constants::Direction;
use crate::error::Result;
use crate::repr::{self, Repr};

/// Sorts query results by one property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyOrder {
    pub property: String,
    pub direction: Direction,
}

impl PropertyOrder {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    pub fn ascending(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Ascending)
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Descending)
    }
}

impl Repr for PropertyOrder {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "order")?;
        let property = repr::read_name_reference(repr::required(obj, "property")?, "property")?;
        let direction = repr::optional_enum(obj, "direction")?;
        Ok(Self {
            property,
            direction,
        })
    }

    fn to_repr(&self) -> JsonValue {
        json!({
            "property": repr::name_reference(&self.property),
            "direction": self.direction.as_str(),
        })
    }
}
