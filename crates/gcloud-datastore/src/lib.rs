//! # gcloud-datastore
//!
//! Typed Google Cloud Datastore query structures and their REST v1 JSON wire
//! forms.
//!
//! Every type implements [`Repr`], a symmetric `from_repr` / `to_repr` pair
//! over [`serde_json::Value`]. Fields holding their default value are omitted
//! on encode and restored on decode, so the wire form keeps the distinction
//! between "absent" and "set".
//!
//! ## Example
//!
//! ```rust
//! use gcloud_rest_datastore::{
//!     Filter, PropertyFilterOperator, PropertyOrder, Query, Repr, Value,
//! };
//!
//! let query = Query::new("Task")
//!     .with_filter(Filter::property(
//!         "done",
//!         PropertyFilterOperator::Equal,
//!         Value::new(false),
//!     ))
//!     .with_order(PropertyOrder::descending("priority"))
//!     .with_limit(10);
//!
//! let body = query.to_repr();
//! assert_eq!(body["kind"][0]["name"], "Task");
//! assert_eq!(Query::from_repr(&body).unwrap(), query);
//! ```

mod constants;
mod entity;
mod error;
mod filter;
mod key;
mod lat_lng;
mod property_order;
mod query;
mod repr;
mod value;

pub use constants::{
    CompositeFilterOperator, Direction, MoreResultsType, PropertyFilterOperator, ResultType,
};
pub use entity::{Entity, EntityResult};
pub use error::{Error, ErrorKind, Result};
pub use filter::{CompositeFilter, Filter, PropertyFilter};
pub use key::{Key, PartitionId, PathElement};
pub use lat_lng::LatLng;
pub use property_order::PropertyOrder;
pub use query::{AnyQuery, GqlQuery, Query, QueryResultBatch};
pub use repr::Repr;
pub use value::{TypedValue, Value};

/// Base URL of the Datastore REST v1 API.
pub const API_ROOT: &str = "https://datastore.googleapis.com/v1";

/// OAuth scope granting access to Datastore.
pub const SCOPE_DATASTORE: &str = "https://www.googleapis.com/auth/datastore";
