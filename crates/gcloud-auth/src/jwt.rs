//! Signed JWT assertions for the service account flow.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lifetime of a signed assertion, in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Grant type sent alongside a signed assertion.
pub const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of a service account assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountClaims {
    /// Audience (the token endpoint).
    pub aud: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
    /// Issuer (the service account email).
    pub iss: String,
    /// Space-separated scopes.
    pub scope: String,
}

impl ServiceAccountClaims {
    /// Claims issued at `now`, valid for [`ASSERTION_LIFETIME_SECS`].
    pub fn new(
        client_email: impl Into<String>,
        token_uri: impl Into<String>,
        scope: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let iat = now.timestamp();
        Self {
            aud: token_uri.into(),
            exp: iat + ASSERTION_LIFETIME_SECS,
            iat,
            iss: client_email.into(),
            scope: scope.into(),
        }
    }

    /// Sign the claims with an RSA private key in PEM form (PKCS#1 or PKCS#8).
    pub fn sign(&self, private_key_pem: &str) -> Result<String> {
        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
        Ok(encode(&header, self, &key)?)
    }
}
