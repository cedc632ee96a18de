//! Token configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::credentials::CredentialsFile;
use crate::error::Result;
use crate::oauth::GCE_METADATA_BASE;
use crate::retry::RetryConfig;
use crate::token::Token;
use crate::transport::Transport;

/// Lock serializing calls to the auth endpoints.
///
/// Tokens built with the same lock never refresh at the same time. It is held
/// for each refresh attempt and released during retry backoff. The lock is
/// not re-entrant.
pub type ApiLock = Arc<tokio::sync::Mutex<()>>;

/// Create a fresh [`ApiLock`].
pub fn new_api_lock() -> ApiLock {
    Arc::new(tokio::sync::Mutex::new(()))
}

/// Source of the current time for staleness checks and assertion claims.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Configuration for a [`Token`].
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Credential file to use instead of discovery.
    pub service_file: Option<PathBuf>,
    /// OAuth scopes. Required for service accounts.
    pub scopes: Vec<String>,
    /// Lock shared with other tokens. A private lock is created when unset.
    pub lock: Option<ApiLock>,
    /// HTTP transport. A reqwest transport is created on first use when unset.
    pub transport: Option<Arc<dyn Transport>>,
    /// Timeout of each refresh attempt.
    pub timeout: Duration,
    /// Retry configuration for refreshes.
    pub retry: RetryConfig,
    /// Base URL of the metadata server.
    pub metadata_base: String,
    /// Project reported by `get_project`, taking precedence over discovery.
    pub project: Option<String>,
    /// Clock used for staleness checks.
    pub clock: Arc<dyn Clock>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            service_file: None,
            scopes: Vec::new(),
            lock: None,
            transport: None,
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            metadata_base: GCE_METADATA_BASE.to_string(),
            project: None,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Builder for [`Token`].
#[derive(Debug, Default)]
pub struct TokenBuilder {
    config: TokenConfig,
}

impl TokenBuilder {
    /// Use this credential file instead of discovery.
    pub fn with_service_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.service_file = Some(path.into());
        self
    }

    /// Set the OAuth scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Share a lock with other tokens.
    pub fn with_lock(mut self, lock: ApiLock) -> Self {
        self.config.lock = Some(lock);
        self
    }

    /// Set the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Point metadata requests somewhere other than the GCE metadata server.
    pub fn with_metadata_base(mut self, base: impl Into<String>) -> Self {
        self.config.metadata_base = base.into();
        self
    }

    /// Set the project returned by `get_project`.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.config.project = Some(project.into());
        self
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Discover credentials and build the token.
    pub fn build(self) -> Result<Token> {
        Token::with_config(self.config)
    }

    /// Build a token from already loaded credentials.
    pub fn build_with_credentials(self, credentials: CredentialsFile) -> Result<Token> {
        Token::from_credentials(credentials, self.config)
    }
}
