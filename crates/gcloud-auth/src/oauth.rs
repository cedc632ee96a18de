//! Token refresh requests for each credential type.
//!
//! - **authorized_user** - refresh token grant against the OAuth endpoint
//! - **gce_metadata** - GET against the instance metadata server
//! - **service_account** - signed JWT assertion grant (see jwt.rs)

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::credentials::{CredentialsFile, TokenType};
use crate::error::{Error, ErrorKind, Result};
use crate::jwt::{ServiceAccountClaims, GRANT_TYPE_JWT_BEARER};
use crate::transport::{HttpRequest, HttpResponse};

/// Default OAuth 2.0 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Base URL of the GCE metadata server.
pub const GCE_METADATA_BASE: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Header the metadata server requires on every request.
pub const METADATA_FLAVOR_HEADER: (&str, &str) = ("metadata-flavor", "Google");

/// Token endpoint below a metadata base URL.
pub fn gce_token_endpoint(metadata_base: &str) -> String {
    format!(
        "{}/instance/service-accounts/default/token?recursive=true",
        metadata_base.trim_end_matches('/')
    )
}

/// Project id endpoint below a metadata base URL.
pub fn gce_project_endpoint(metadata_base: &str) -> String {
    format!("{}/project/project-id", metadata_base.trim_end_matches('/'))
}

/// How a token is refreshed. Chosen once when the token is built.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    AuthorizedUser(CredentialsFile),
    /// Metadata server flow, with the token endpoint override if one was given.
    GceMetadata(Option<String>),
    ServiceAccount(CredentialsFile),
    /// A credential file whose `type` cannot be refreshed.
    Unsupported(String),
}

impl Flow {
    /// Select the flow for a loaded credential file.
    pub(crate) fn for_credentials(file: CredentialsFile) -> Self {
        match file.token_type() {
            Ok(TokenType::AuthorizedUser) => Flow::AuthorizedUser(file),
            Ok(TokenType::ServiceAccount) => Flow::ServiceAccount(file),
            Ok(TokenType::GceMetadata) => Flow::GceMetadata(file.token_uri),
            Err(_) => Flow::Unsupported(file.credential_type),
        }
    }

    pub(crate) fn token_type(&self) -> Option<TokenType> {
        match self {
            Flow::AuthorizedUser(_) => Some(TokenType::AuthorizedUser),
            Flow::GceMetadata(_) => Some(TokenType::GceMetadata),
            Flow::ServiceAccount(_) => Some(TokenType::ServiceAccount),
            Flow::Unsupported(_) => None,
        }
    }

    /// The endpoint refresh requests go to.
    pub(crate) fn token_uri(&self, metadata_base: &str) -> String {
        match self {
            Flow::GceMetadata(token_uri) => token_uri
                .clone()
                .unwrap_or_else(|| gce_token_endpoint(metadata_base)),
            Flow::AuthorizedUser(file) | Flow::ServiceAccount(file) => file
                .token_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            Flow::Unsupported(_) => DEFAULT_TOKEN_URI.to_string(),
        }
    }

    /// Build the request for one refresh attempt.
    pub(crate) fn refresh_request(
        &self,
        token_uri: &str,
        scopes: &str,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<HttpRequest> {
        match self {
            Flow::AuthorizedUser(file) => {
                let client_id = file.require("client_id", file.client_id.as_deref())?;
                let client_secret = file.require("client_secret", file.client_secret())?;
                let refresh_token = file.require("refresh_token", file.refresh_token())?;

                let body = serde_urlencoded::to_string([
                    ("grant_type", "refresh_token"),
                    ("client_id", client_id),
                    ("client_secret", client_secret),
                    ("refresh_token", refresh_token),
                ])?;
                Ok(HttpRequest::post_form(token_uri, body, timeout))
            }
            Flow::GceMetadata(_) => Ok(HttpRequest::get(token_uri, timeout)
                .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1)),
            Flow::ServiceAccount(file) => {
                let client_email = file.require("client_email", file.client_email.as_deref())?;
                let private_key = file.require("private_key", file.private_key())?;

                let assertion =
                    ServiceAccountClaims::new(client_email, token_uri, scopes, now).sign(private_key)?;

                let body = serde_urlencoded::to_string([
                    ("assertion", assertion.as_str()),
                    ("grant_type", GRANT_TYPE_JWT_BEARER),
                ])?;
                Ok(HttpRequest::post_form(token_uri, body, timeout))
            }
            Flow::Unsupported(kind) => Err(Error::new(ErrorKind::UnsupportedType(kind.clone()))),
        }
    }
}

/// Successful token endpoint response.
///
/// The access token is redacted in Debug output.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Lifetime in seconds. Some servers send it as a decimal string.
    #[serde(deserialize_with = "seconds")]
    pub expires_in: u64,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn seconds<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(secs) => Ok(secs),
        Seconds::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl TokenResponse {
    /// Check the status and parse the body of a refresh response.
    pub fn from_response(response: HttpResponse) -> Result<Self> {
        response.error_for_status()?.json()
    }
}
