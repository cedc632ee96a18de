//! # gcloud-rest
//!
//! Google Cloud REST building blocks for Rust.
//!
//! ## Security
//!
//! - Sensitive data (tokens, private keys, client secrets) is redacted in Debug output
//! - Tracing skips credential values
//! - Error messages sanitize any credential data
//!
//! ## Crates
//!
//! - **gcloud-rest-auth** - OAuth 2.0 access tokens: authorized user, service account, GCE metadata
//! - **gcloud-rest-datastore** - Datastore `runQuery` types: Query, GQL query, result batches
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gcloud_rest::auth::Token;
//! use gcloud_rest::datastore::{AnyQuery, Query, SCOPE_DATASTORE};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let token = Token::builder().with_scopes([SCOPE_DATASTORE]).build()?;
//!     let bearer = token.get().await?;
//!
//!     let body = AnyQuery::from(Query::new("Task").with_limit(10)).to_request();
//!     println!("Authorization: Bearer {} ({} bytes of query)", bearer.len(), body.to_string().len());
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "auth")]
pub use gcloud_rest_auth as auth;
#[cfg(feature = "datastore")]
pub use gcloud_rest_datastore as datastore;

// Re-export commonly used types at the top level
#[cfg(feature = "auth")]
pub use gcloud_rest_auth::{Token, TokenType};
#[cfg(feature = "datastore")]
pub use gcloud_rest_datastore::{GqlQuery, Query, QueryResultBatch};
