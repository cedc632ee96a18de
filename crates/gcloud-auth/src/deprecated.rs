//! Older entry points kept for compatibility.

use tracing::warn;

use crate::error::Result;
use crate::token::Token;

impl Token {
    /// Refresh the token unconditionally.
    #[deprecated(note = "use `Token::acquire_access_token` instead")]
    pub async fn acquire(&self) -> Result<()> {
        warn!("Token::acquire() is deprecated, please use Token::acquire_access_token()");
        self.acquire_access_token().await
    }

    /// Refresh the token if it is stale.
    #[deprecated(note = "use `Token::ensure_token` instead")]
    pub async fn ensure(&self) -> Result<()> {
        warn!("Token::ensure() is deprecated, please use Token::ensure_token()");
        self.ensure_token().await
    }
}
