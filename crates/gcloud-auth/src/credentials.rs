//! Credential files and application default credential discovery.
//!
//! Credential files redact secrets in Debug output.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// Environment variable naming an explicit credential file.
pub const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Environment variable overriding the gcloud SDK configuration directory.
pub const ENV_CLOUDSDK_CONFIG: &str = "CLOUDSDK_CONFIG";

/// File name of the application default credentials inside the SDK directory.
pub const ADC_FILE_NAME: &str = "application_default_credentials.json";

/// The kind of credential a token is refreshed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// A user's refresh token, as written by `gcloud auth application-default login`.
    AuthorizedUser,
    /// The metadata server of a GCE instance (or any host exposing it).
    GceMetadata,
    /// A service account private key.
    ServiceAccount,
}

impl TokenType {
    /// The value used in the `type` field of credential files.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AuthorizedUser => "authorized_user",
            TokenType::GceMetadata => "gce_metadata",
            TokenType::ServiceAccount => "service_account",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authorized_user" => Ok(TokenType::AuthorizedUser),
            "gce_metadata" => Ok(TokenType::GceMetadata),
            "service_account" => Ok(TokenType::ServiceAccount),
            other => Err(Error::new(ErrorKind::UnsupportedType(other.to_string()))),
        }
    }
}

/// A parsed credential file.
///
/// Only the fields used for refreshing are kept. Which of them are required
/// depends on `type`; missing ones surface as
/// [`ErrorKind::InvalidCredentials`] when a refresh needs them.
#[derive(Clone, Default, Deserialize)]
pub struct CredentialsFile {
    /// Declared credential type, e.g. `service_account`.
    #[serde(rename = "type", default)]
    pub credential_type: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Overrides the default OAuth token endpoint.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for CredentialsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsFile")
            .field("type", &self.credential_type)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("client_email", &self.client_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl CredentialsFile {
    /// Parse credentials from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a credential file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(
                ErrorKind::Io(format!("failed to read {}: {}", path.display(), e)),
                e,
            )
        })?;
        Self::from_json(&content)
    }

    /// Credentials for an authorized user.
    pub fn authorized_user(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            credential_type: TokenType::AuthorizedUser.as_str().to_string(),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            refresh_token: Some(refresh_token.into()),
            ..Default::default()
        }
    }

    /// Credentials for a service account.
    pub fn service_account(
        client_email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            credential_type: TokenType::ServiceAccount.as_str().to_string(),
            client_email: Some(client_email.into()),
            private_key: Some(private_key.into()),
            ..Default::default()
        }
    }

    /// Set the project id.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// The declared type, if it is one this library can refresh.
    pub fn token_type(&self) -> Result<TokenType> {
        self.credential_type.parse()
    }

    pub(crate) fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub(crate) fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    /// Return a field the current flow needs, or fail naming it.
    pub(crate) fn require<'a>(&self, field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
        match value {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(Error::new(ErrorKind::InvalidCredentials(format!(
                "{} credentials are missing field `{}`",
                self.credential_type, field
            )))),
        }
    }

    /// Locate and load application default credentials.
    ///
    /// Lookup order:
    /// 1. `explicit`, then `GOOGLE_APPLICATION_CREDENTIALS`
    /// 2. `$CLOUDSDK_CONFIG/application_default_credentials.json`
    /// 3. `~/.config/gcloud/application_default_credentials.json`
    ///
    /// Failures to read or parse an explicitly configured file (cases 1 and
    /// 2) are returned. The home directory location is only a guess, so any
    /// failure there yields `Ok(None)`.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        discover_from(
            explicit,
            std::env::var_os(ENV_APPLICATION_CREDENTIALS),
            std::env::var_os(ENV_CLOUDSDK_CONFIG),
            dirs::home_dir(),
        )
    }
}

/// Where discovery looked, and whether a failure there is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    explicit: bool,
}

fn candidate(
    explicit: Option<&Path>,
    application_credentials: Option<OsString>,
    cloudsdk_config: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<Candidate> {
    if let Some(path) = explicit {
        return Some(Candidate {
            path: path.to_path_buf(),
            explicit: true,
        });
    }

    if let Some(path) = application_credentials.filter(|p| !p.is_empty()) {
        return Some(Candidate {
            path: PathBuf::from(path),
            explicit: true,
        });
    }

    if let Some(dir) = cloudsdk_config.filter(|p| !p.is_empty()) {
        return Some(Candidate {
            path: PathBuf::from(dir).join(ADC_FILE_NAME),
            explicit: true,
        });
    }

    home.map(|home| Candidate {
        path: home.join(".config").join("gcloud").join(ADC_FILE_NAME),
        explicit: false,
    })
}

fn discover_from(
    explicit: Option<&Path>,
    application_credentials: Option<OsString>,
    cloudsdk_config: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<Option<CredentialsFile>> {
    let Some(candidate) = candidate(explicit, application_credentials, cloudsdk_config, home)
    else {
        debug!("No home directory; skipping credential file lookup");
        return Ok(None);
    };

    match CredentialsFile::from_file(&candidate.path) {
        Ok(file) => {
            debug!(
                path = %candidate.path.display(),
                credential_type = %file.credential_type,
                "Loaded credential file"
            );
            Ok(Some(file))
        }
        Err(e) if candidate.explicit => Err(e),
        Err(e) => {
            debug!(
                path = %candidate.path.display(),
                error = %e,
                "No usable default credential file"
            );
            Ok(None)
        }
    }
}
