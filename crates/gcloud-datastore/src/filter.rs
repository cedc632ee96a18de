//! Query filters.
//!
//! A filter is either a single property comparison or a composite of child
//! filters joined by `AND` / `OR`:
//!
//! ```json
//! {"compositeFilter": {"op": "AND", "filters": [
//!     {"propertyFilter": {"property": {"name": "done"}, "op": "EQUAL",
//!                         "value": {"booleanValue": false}}}
//! ]}}
//! ```

use serde_json::{json, Value as JsonValue};

use crate::constants::{CompositeFilterOperator, PropertyFilterOperator};
use crate::error::{Error, ErrorKind, Result};
use crate::repr::{self, Repr};
use crate::value::Value;

/// Compares one property against a value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub op: PropertyFilterOperator,
    pub value: Value,
}

impl PropertyFilter {
    pub fn new(property: impl Into<String>, op: PropertyFilterOperator, value: Value) -> Self {
        Self {
            property: property.into(),
            op,
            value,
        }
    }
}

impl Repr for PropertyFilter {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "propertyFilter")?;
        Ok(Self {
            property: repr::read_name_reference(repr::required(obj, "property")?, "property")?,
            op: repr::required_enum(obj, "op")?,
            value: Value::from_repr(repr::required(obj, "value")?)?,
        })
    }

    fn to_repr(&self) -> JsonValue {
        json!({
            "property": repr::name_reference(&self.property),
            "op": self.op.as_str(),
            "value": self.value.to_repr(),
        })
    }
}

/// Joins child filters with a boolean operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFilter {
    pub op: CompositeFilterOperator,
    pub filters: Vec<Filter>,
}

impl CompositeFilter {
    pub fn new(op: CompositeFilterOperator, filters: Vec<Filter>) -> Self {
        Self { op, filters }
    }
}

impl Repr for CompositeFilter {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "compositeFilter")?;
        let filters = repr::optional_array(obj, "filters")?
            .iter()
            .map(Filter::from_repr)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            op: repr::required_enum(obj, "op")?,
            filters,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let filters: Vec<JsonValue> = self.filters.iter().map(Repr::to_repr).collect();
        json!({
            "op": self.op.as_str(),
            "filters": filters,
        })
    }
}

/// A query filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Composite(CompositeFilter),
    Property(PropertyFilter),
}

impl Filter {
    /// `property op value`.
    pub fn property(
        property: impl Into<String>,
        op: PropertyFilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Property(PropertyFilter::new(property, op, value.into()))
    }

    /// All of `filters` must match.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter::new(CompositeFilterOperator::And, filters))
    }

    /// Any of `filters` must match.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter::new(CompositeFilterOperator::Or, filters))
    }
}

impl Repr for Filter {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "filter")?;
        if let Some(inner) = obj.get("compositeFilter") {
            return Ok(Filter::Composite(CompositeFilter::from_repr(inner)?));
        }
        if let Some(inner) = obj.get("propertyFilter") {
            return Ok(Filter::Property(PropertyFilter::from_repr(inner)?));
        }

        Err(Error::new(ErrorKind::InvalidValue(
            "filter must contain compositeFilter or propertyFilter".to_string(),
        )))
    }

    fn to_repr(&self) -> JsonValue {
        match self {
            Filter::Composite(f) => json!({ "compositeFilter": f.to_repr() }),
            Filter::Property(f) => json!({ "propertyFilter": f.to_repr() }),
        }
    }
}
