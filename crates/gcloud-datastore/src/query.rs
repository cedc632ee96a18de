//! Structured queries, GQL queries and result batches.
//!
//! See <https://cloud.google.com/datastore/docs/reference/data/rest/v1/projects/runQuery>.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value as JsonValue};

use crate::constants::{MoreResultsType, ResultType};
use crate::entity::EntityResult;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::property_order::PropertyOrder;
use crate::repr::{self, Repr};
use crate::value::{TypedValue, Value};

/// A structured query.
///
/// Two queries compare equal when their `kind` and `query_filter` match.
/// Cursors, orders, offset and limit are pagination state and are ignored by
/// `==`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Kind to query. Empty means "all kinds".
    pub kind: String,
    pub query_filter: Option<Filter>,
    pub orders: Vec<PropertyOrder>,
    pub start_cursor: String,
    pub end_cursor: String,
    /// Results to skip. Zero means unset.
    pub offset: u32,
    /// Maximum results. Zero means unlimited.
    pub limit: u32,
}

impl Query {
    /// Key of a structured query inside a `runQuery` request body.
    pub const JSON_KEY: &'static str = "query";

    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.query_filter = Some(filter);
        self
    }

    pub fn with_order(mut self, order: PropertyOrder) -> Self {
        self.orders.push(order);
        self
    }

    pub fn with_start_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = cursor.into();
        self
    }

    pub fn with_end_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.end_cursor = cursor.into();
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.query_filter == other.query_filter
    }
}

/// The wire `kind` is a list of `{"name": ..}` objects; a bare string or
/// `null` is also accepted.
fn read_kind(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::Null => Ok(String::new()),
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Array(kinds) => match kinds.first() {
            None => Ok(String::new()),
            Some(first) => repr::read_name_reference(first, "kind"),
        },
        _ => Err(Error::invalid_type("kind", "array or string")),
    }
}

impl Repr for Query {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, Self::JSON_KEY)?;
        let kind = read_kind(repr::required(obj, "kind")?)?;
        let orders = repr::optional_array(obj, "order")?
            .iter()
            .map(PropertyOrder::from_repr)
            .collect::<Result<Vec<_>>>()?;
        let query_filter = match obj.get("filter") {
            None | Some(JsonValue::Null) => None,
            Some(f) => Some(Filter::from_repr(f)?),
        };

        Ok(Self {
            kind,
            query_filter,
            orders,
            start_cursor: repr::optional_str(obj, "startCursor")?,
            end_cursor: repr::optional_str(obj, "endCursor")?,
            offset: repr::optional_count(obj, "offset")?,
            limit: repr::optional_count(obj, "limit")?,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        let kind = if self.kind.is_empty() {
            json!([])
        } else {
            json!([repr::name_reference(&self.kind)])
        };
        data.insert("kind".into(), kind);

        if let Some(ref filter) = self.query_filter {
            data.insert("filter".into(), filter.to_repr());
        }
        if !self.orders.is_empty() {
            let orders: Vec<JsonValue> = self.orders.iter().map(Repr::to_repr).collect();
            data.insert("order".into(), JsonValue::Array(orders));
        }
        if !self.start_cursor.is_empty() {
            data.insert("startCursor".into(), self.start_cursor.clone().into());
        }
        if !self.end_cursor.is_empty() {
            data.insert("endCursor".into(), self.end_cursor.clone().into());
        }
        if self.offset != 0 {
            data.insert("offset".into(), self.offset.into());
        }
        if self.limit != 0 {
            data.insert("limit".into(), self.limit.into());
        }

        JsonValue::Object(data)
    }
}

/// A GQL query with optional named (`@name`) and positional (`@1`) bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct GqlQuery {
    pub query_string: String,
    /// When false, the query string must not contain literal values.
    pub allow_literals: bool,
    pub named_bindings: BTreeMap<String, TypedValue>,
    pub positional_bindings: Vec<TypedValue>,
}

impl GqlQuery {
    /// Key of a GQL query inside a `runQuery` request body.
    pub const JSON_KEY: &'static str = "gqlQuery";

    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: query_string.into(),
            allow_literals: true,
            named_bindings: BTreeMap::new(),
            positional_bindings: Vec::new(),
        }
    }

    pub fn with_allow_literals(mut self, allow: bool) -> Self {
        self.allow_literals = allow;
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.named_bindings.insert(name.into(), value.into());
        self
    }

    pub fn bind_positional(mut self, value: impl Into<TypedValue>) -> Self {
        self.positional_bindings.push(value.into());
        self
    }
}

/// Bindings travel as `{"value": <Value>}` parameter envelopes.
fn read_binding(data: &JsonValue) -> Result<TypedValue> {
    let envelope = repr::object(data, "binding")?;
    Ok(Value::from_repr(repr::required(envelope, "value")?)?.value)
}

fn write_binding(value: &TypedValue) -> JsonValue {
    json!({ "value": Value::new(value.clone()).to_repr() })
}

impl Repr for GqlQuery {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, Self::JSON_KEY)?;
        let allow_literals = repr::required_bool(obj, "allowLiterals")?;
        let query_string = repr::required_str(obj, "queryString")?;

        let mut named_bindings = BTreeMap::new();
        match obj.get("namedBindings") {
            None | Some(JsonValue::Null) => {}
            Some(bindings) => {
                for (name, binding) in repr::object(bindings, "namedBindings")? {
                    named_bindings.insert(name.clone(), read_binding(binding)?);
                }
            }
        }

        let positional_bindings = repr::optional_array(obj, "positionalBindings")?
            .iter()
            .map(read_binding)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            query_string,
            allow_literals,
            named_bindings,
            positional_bindings,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let named: Map<String, JsonValue> = self
            .named_bindings
            .iter()
            .map(|(name, value)| (name.clone(), write_binding(value)))
            .collect();
        let positional: Vec<JsonValue> = self.positional_bindings.iter().map(write_binding).collect();

        json!({
            "allowLiterals": self.allow_literals,
            "queryString": self.query_string,
            "namedBindings": named,
            "positionalBindings": positional,
        })
    }
}

/// Either kind of query accepted by `runQuery`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyQuery {
    Structured(Query),
    Gql(GqlQuery),
}

impl AnyQuery {
    /// The request-body key this query is placed under.
    pub fn json_key(&self) -> &'static str {
        match self {
            AnyQuery::Structured(_) => Query::JSON_KEY,
            AnyQuery::Gql(_) => GqlQuery::JSON_KEY,
        }
    }

    /// Decode from a request body holding either `query` or `gqlQuery`.
    pub fn from_request(body: &JsonValue) -> Result<Self> {
        let obj = repr::object(body, "request")?;
        if let Some(query) = obj.get(Query::JSON_KEY) {
            return Ok(AnyQuery::Structured(Query::from_repr(query)?));
        }
        match obj.get(GqlQuery::JSON_KEY) {
            Some(gql) => Ok(AnyQuery::Gql(GqlQuery::from_repr(gql)?)),
            None => Err(Error::missing_key(Query::JSON_KEY)),
        }
    }

    /// `{"query": ...}` or `{"gqlQuery": ...}`.
    pub fn to_request(&self) -> JsonValue {
        let repr = match self {
            AnyQuery::Structured(q) => q.to_repr(),
            AnyQuery::Gql(q) => q.to_repr(),
        };
        let mut body = Map::new();
        body.insert(self.json_key().into(), repr);
        JsonValue::Object(body)
    }
}

impl From<Query> for AnyQuery {
    fn from(query: Query) -> Self {
        AnyQuery::Structured(query)
    }
}

impl From<GqlQuery> for AnyQuery {
    fn from(query: GqlQuery) -> Self {
        AnyQuery::Gql(query)
    }
}

/// One batch of results from `runQuery`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResultBatch {
    /// Cursor after the last result in this batch.
    pub end_cursor: String,
    pub entity_result_type: ResultType,
    pub entity_results: Vec<EntityResult>,
    pub more_results: MoreResultsType,
    /// Cursor after the last skipped result. Empty when nothing was skipped.
    pub skipped_cursor: String,
    pub skipped_results: u32,
    /// Read timestamp the batch was served at (int64 as a decimal string).
    pub snapshot_version: String,
}

impl QueryResultBatch {
    pub fn new(end_cursor: impl Into<String>) -> Self {
        Self {
            end_cursor: end_cursor.into(),
            entity_result_type: ResultType::default(),
            entity_results: Vec::new(),
            more_results: MoreResultsType::default(),
            skipped_cursor: String::new(),
            skipped_results: 0,
            snapshot_version: String::new(),
        }
    }

    pub fn with_entity_results(
        mut self,
        result_type: ResultType,
        results: Vec<EntityResult>,
    ) -> Self {
        self.entity_result_type = result_type;
        self.entity_results = results;
        self
    }

    pub fn with_more_results(mut self, more_results: MoreResultsType) -> Self {
        self.more_results = more_results;
        self
    }

    pub fn with_skipped(mut self, skipped_results: u32, skipped_cursor: impl Into<String>) -> Self {
        self.skipped_results = skipped_results;
        self.skipped_cursor = skipped_cursor.into();
        self
    }

    pub fn with_snapshot_version(mut self, version: impl Into<String>) -> Self {
        self.snapshot_version = version.into();
        self
    }

    /// True when the query has been exhausted.
    pub fn is_finished(&self) -> bool {
        !matches!(self.more_results, MoreResultsType::NotFinished)
    }
}

impl Repr for QueryResultBatch {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "batch")?;
        let end_cursor = repr::required_str(obj, "endCursor")?;
        let entity_result_type = repr::required_enum(obj, "entityResultType")?;
        let entity_results = repr::optional_array(obj, "entityResults")?
            .iter()
            .map(EntityResult::from_repr)
            .collect::<Result<Vec<_>>>()?;
        let more_results = repr::required_enum(obj, "moreResults")?;
        let snapshot_version = match obj.get("snapshotVersion") {
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => repr::optional_str(obj, "snapshotVersion")?,
        };

        Ok(Self {
            end_cursor,
            entity_result_type,
            entity_results,
            more_results,
            skipped_cursor: repr::optional_str(obj, "skippedCursor")?,
            skipped_results: repr::optional_count(obj, "skippedResults")?,
            snapshot_version,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let results: Vec<JsonValue> = self.entity_results.iter().map(Repr::to_repr).collect();
        let mut data = Map::new();
        data.insert("endCursor".into(), self.end_cursor.clone().into());
        data.insert("entityResults".into(), JsonValue::Array(results));
        data.insert("entityResultType".into(), self.entity_result_type.into());
        data.insert("moreResults".into(), self.more_results.into());
        data.insert("skippedResults".into(), self.skipped_results.into());
        if !self.skipped_cursor.is_empty() {
            data.insert("skippedCursor".into(), self.skipped_cursor.clone().into());
        }
        if !self.snapshot_version.is_empty() {
            data.insert("snapshotVersion".into(), self.snapshot_version.clone().into());
        }
        JsonValue::Object(data)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_repr())
    }
}

impl fmt::Display for GqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_repr())
    }
}

impl fmt::Display for QueryResultBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_repr())
    }
}
