//! Entity keys.

use serde_json::{json, Map, Value as JsonValue};

use crate::error::{Error, ErrorKind, Result};
use crate::repr::{self, Repr};

/// The partition (project and namespace) an entity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartitionId {
    pub project_id: String,
    pub namespace_id: String,
}

impl PartitionId {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            namespace_id: String::new(),
        }
    }

    pub fn with_namespace(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = namespace_id.into();
        self
    }

    fn is_empty(&self) -> bool {
        self.project_id.is_empty() && self.namespace_id.is_empty()
    }
}

impl Repr for PartitionId {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "partitionId")?;
        Ok(Self {
            project_id: repr::optional_str(obj, "projectId")?,
            namespace_id: repr::optional_str(obj, "namespaceId")?,
        })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        if !self.project_id.is_empty() {
            data.insert("projectId".into(), self.project_id.clone().into());
        }
        if !self.namespace_id.is_empty() {
            data.insert("namespaceId".into(), self.namespace_id.clone().into());
        }
        JsonValue::Object(data)
    }
}

/// One step of a key path: a kind plus either a numeric id or a name.
///
/// An element with neither is incomplete; Datastore allocates the id on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathElement {
    pub kind: String,
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl PathElement {
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id),
            name: None,
        }
    }

    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }
}

impl Repr for PathElement {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "path")?;
        let kind = repr::required_str(obj, "kind")?;
        let id = match obj.get("id") {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(repr::int64(value, "id")?),
        };
        let name = match obj.get("name") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(_) => return Err(Error::invalid_type("name", "string")),
        };

        if id.is_some() && name.is_some() {
            return Err(Error::new(ErrorKind::InvalidValue(format!(
                "path element of kind {:?} has both id and name",
                kind
            ))));
        }

        Ok(Self { kind, id, name })
    }

    fn to_repr(&self) -> JsonValue {
        let mut data = Map::new();
        data.insert("kind".into(), self.kind.clone().into());
        if let Some(id) = self.id {
            // int64 travels as a decimal string
            data.insert("id".into(), id.to_string().into());
        }
        if let Some(ref name) = self.name {
            data.insert("name".into(), name.clone().into());
        }
        JsonValue::Object(data)
    }
}

/// A unique identifier for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Key {
    pub partition_id: PartitionId,
    /// Ancestor path, root first. The last element identifies the entity itself.
    pub path: Vec<PathElement>,
}

impl Key {
    pub fn new(partition_id: PartitionId, path: Vec<PathElement>) -> Self {
        Self { partition_id, path }
    }

    /// The kind of the entity this key refers to.
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|p| p.kind.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.path.last().is_some_and(PathElement::is_complete)
    }
}

impl Repr for Key {
    fn from_repr(data: &JsonValue) -> Result<Self> {
        let obj = repr::object(data, "keyValue")?;
        let partition_id = match obj.get("partitionId") {
            None | Some(JsonValue::Null) => PartitionId::default(),
            Some(p) => PartitionId::from_repr(p)?,
        };
        let path = repr::optional_array(obj, "path")?
            .iter()
            .map(PathElement::from_repr)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { partition_id, path })
    }

    fn to_repr(&self) -> JsonValue {
        let path: Vec<JsonValue> = self.path.iter().map(Repr::to_repr).collect();
        if self.partition_id.is_empty() {
            json!({ "path": path })
        } else {
            json!({
                "partitionId": self.partition_id.to_repr(),
                "path": path,
            })
        }
    }
}
