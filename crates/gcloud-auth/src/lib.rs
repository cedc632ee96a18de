//! # gcloud-auth
//!
//! OAuth 2.0 access tokens for Google Cloud APIs.
//!
//! ## Supported Credential Types
//!
//! - **authorized_user** - refresh token written by `gcloud auth application-default login`
//! - **service_account** - private key, exchanged through a signed JWT assertion
//! - **gce_metadata** - the instance metadata server, used when no credential file exists
//!
//! Tokens are refreshed once half of their lifetime has elapsed. Refreshes
//! are retried with exponential backoff and serialized by an [`ApiLock`],
//! which can be shared between tokens.
//!
//! ## Security
//!
//! - Secrets are redacted in Debug output
//! - Tracing skips credential values
//! - Error messages never include tokens, keys or client secrets
//!
//! ## Example
//!
//! ```rust,no_run
//! use gcloud_rest_auth::Token;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gcloud_rest_auth::Error> {
//!     let token = Token::builder()
//!         .with_scopes(["https://www.googleapis.com/auth/datastore"])
//!         .build()?;
//!
//!     let access_token = token.get().await?;
//!     let project = token.get_project().await?;
//!     println!("{:?} {}", project, access_token.len());
//!
//!     Ok(())
//! }
//! ```

mod config;
mod credentials;
mod deprecated;
mod error;
mod jwt;
mod oauth;
mod retry;
mod token;
mod transport;

pub use config::{new_api_lock, ApiLock, Clock, SystemClock, TokenBuilder, TokenConfig};
pub use credentials::{
    CredentialsFile, TokenType, ADC_FILE_NAME, ENV_APPLICATION_CREDENTIALS, ENV_CLOUDSDK_CONFIG,
};
pub use error::{Error, ErrorKind, Result};
pub use jwt::{ServiceAccountClaims, ASSERTION_LIFETIME_SECS, GRANT_TYPE_JWT_BEARER};
pub use oauth::{
    gce_project_endpoint, gce_token_endpoint, TokenResponse, DEFAULT_TOKEN_URI, GCE_METADATA_BASE,
    METADATA_FLAVOR_HEADER,
};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use token::{Token, PROJECT_ENV_VARS};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, RequestMethod, Transport};

/// User-Agent sent by the default transport.
pub const USER_AGENT: &str = concat!("gcloud-rest-auth/", env!("CARGO_PKG_VERSION"));
