//! Error types for gcloud-auth.
//!
//! Error messages are designed to avoid exposing sensitive credential data.

/// Result type alias for gcloud-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gcloud-auth operations.
///
/// Error messages are sanitized to prevent accidental credential exposure.
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

    /// Returns true if a refresh that failed with this error may succeed when
    /// attempted again.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns the HTTP status if the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Http { status, .. } | ErrorKind::OAuth { status, .. } => Some(*status),
            ErrorKind::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// The kind of error that occurred.
///
/// Error messages avoid including credential values.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// OAuth error response from the token endpoint.
    #[error("OAuth error ({status}): {error} - {description}")]
    OAuth {
        status: u16,
        error: String,
        description: String,
    },

    /// Non-2xx HTTP response without an OAuth error body.
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// JWT signing error.
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Credential file is missing a field its type requires.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Credential file declares a type this library cannot refresh.
    #[error("Unsupported token type: {0}")]
    UnsupportedType(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every refresh attempt failed.
    #[error("All {attempts} token refresh attempts failed; last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    ///
    /// Configuration problems never fix themselves; everything that involved
    /// the network or a response body might.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorKind::Config(_)
                | ErrorKind::InvalidCredentials(_)
                | ErrorKind::UnsupportedType(_)
                | ErrorKind::Jwt(_)
                | ErrorKind::Serialization(_)
                | ErrorKind::Io(_)
                | ErrorKind::RetriesExhausted { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Sanitize the error message to avoid exposing URLs with tokens
        let message = err.to_string();
        let sanitized = if message.contains("access_token") || message.contains("assertion=") {
            "HTTP request failed (details redacted for security)".to_string()
        } else {
            message
        };
        Error::with_source(ErrorKind::Transport(sanitized), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::with_source(ErrorKind::Jwt(err.to_string()), err)
    }
}
