//! Error types for gcloud-datastore.

/// Result type alias for gcloud-datastore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for decoding and encoding Datastore wire forms.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// A required key was absent from the wire form.
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingKey(key.into()))
    }

    /// A field held a JSON value of the wrong shape.
    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::new(ErrorKind::InvalidType {
            field: field.into(),
            expected,
        })
    }

    /// Returns true if this is a schema error (missing key, bad enum, bad shape).
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MissingKey(_) | ErrorKind::InvalidEnum { .. } | ErrorKind::InvalidType { .. }
        )
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// A required key was not present.
    #[error("Missing required key: {0}")]
    MissingKey(String),

    /// An enumeration held a value outside its defined members.
    #[error("Invalid {type_name} value: {value:?}")]
    InvalidEnum {
        type_name: &'static str,
        value: String,
    },

    /// A field held the wrong JSON type.
    #[error("Invalid type for {field}: expected {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    /// A field held an unparseable value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::with_source(ErrorKind::InvalidValue(format!("blob: {}", err)), err)
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidValue(format!("timestamp: {}", err)), err)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::with_source(ErrorKind::InvalidValue(format!("integer: {}", err)), err)
    }
}
