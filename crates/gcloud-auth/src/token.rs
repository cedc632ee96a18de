//! Cached OAuth access tokens with refresh-on-stale.
//!
//! A [`Token`] refreshes itself once half of the lifetime reported by the
//! token endpoint has passed. Each refresh attempt holds the token's
//! [`ApiLock`] and re-checks staleness after acquiring it, so concurrent
//! callers on a stale token cause a single round-trip. The lock is released
//! while backing off between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, instrument, warn};

use crate::config::{new_api_lock, ApiLock, Clock, TokenBuilder, TokenConfig};
use crate::credentials::{CredentialsFile, TokenType};
use crate::error::{Error, ErrorKind, Result};
use crate::oauth::{gce_project_endpoint, Flow, TokenResponse, METADATA_FLAVOR_HEADER};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

/// Environment variables consulted for the project id, in order.
pub const PROJECT_ENV_VARS: [&str; 3] =
    ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT", "APPLICATION_ID"];

#[derive(Clone)]
struct TokenState {
    access_token: Option<String>,
    duration_secs: u64,
    acquired_at: DateTime<Utc>,
}

impl Default for TokenState {
    fn default() -> Self {
        Self {
            access_token: None,
            duration_secs: 0,
            // Unix epoch
            acquired_at: DateTime::<Utc>::default(),
        }
    }
}

impl TokenState {
    /// Stale once more than half the lifetime has elapsed.
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        let elapsed_ms = i128::from((now - self.acquired_at).num_milliseconds());
        elapsed_ms * 2 > i128::from(self.duration_secs) * 1000
    }
}

/// An OAuth access token for one set of credentials.
///
/// Share it between tasks with an `Arc`.
pub struct Token {
    flow: Flow,
    token_uri: String,
    scopes: Vec<String>,
    scope: String,
    metadata_base: String,
    project: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
    lock: ApiLock,
    transport: OnceCell<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
    state: RwLock<TokenState>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type())
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Discover credentials with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(TokenConfig::default())
    }

    /// Create a token builder.
    pub fn builder() -> TokenBuilder {
        TokenBuilder::default()
    }

    /// Discover credentials and build a token.
    ///
    /// Falls back to the GCE metadata server when no credential file exists.
    pub fn with_config(config: TokenConfig) -> Result<Self> {
        match CredentialsFile::discover(config.service_file.as_deref())? {
            Some(file) => Self::from_credentials(file, config),
            None => {
                debug!("No credential file found, using GCE metadata");
                Self::for_gce_metadata(config)
            }
        }
    }

    /// Build a token from already loaded credentials.
    pub fn from_credentials(credentials: CredentialsFile, config: TokenConfig) -> Result<Self> {
        Self::from_flow(Flow::for_credentials(credentials), config)
    }

    /// Build a token backed by the GCE metadata server.
    pub fn for_gce_metadata(config: TokenConfig) -> Result<Self> {
        Self::from_flow(Flow::GceMetadata(None), config)
    }

    fn from_flow(flow: Flow, config: TokenConfig) -> Result<Self> {
        let scope = config.scopes.join(" ");
        if matches!(flow, Flow::ServiceAccount(_)) && scope.is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "scopes must be provided when token type is service account".to_string(),
            )));
        }

        let token_uri = flow.token_uri(&config.metadata_base);

        Ok(Self {
            flow,
            token_uri,
            scopes: config.scopes,
            scope,
            metadata_base: config.metadata_base,
            project: config.project,
            timeout: config.timeout,
            retry: config.retry,
            lock: config.lock.unwrap_or_else(new_api_lock),
            transport: OnceCell::new_with(config.transport),
            clock: config.clock,
            state: RwLock::new(TokenState::default()),
        })
    }

    /// The credential type, or `None` when the credential file declared a
    /// type that cannot be refreshed.
    pub fn token_type(&self) -> Option<TokenType> {
        self.flow.token_type()
    }

    /// Endpoint refresh requests are sent to.
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Requested OAuth scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The lock this token refreshes under.
    pub fn lock(&self) -> ApiLock {
        self.lock.clone()
    }

    /// The cached access token, without refreshing.
    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    /// Lifetime in seconds reported by the last successful refresh.
    pub async fn access_token_duration(&self) -> u64 {
        self.state.read().await.duration_secs
    }

    /// When the cached token was acquired (the Unix epoch before the first
    /// refresh).
    pub async fn access_token_acquired_at(&self) -> DateTime<Utc> {
        self.state.read().await.acquired_at
    }

    /// True when the next `ensure_token` would refresh.
    pub async fn is_stale(&self) -> bool {
        self.state.read().await.is_stale(self.clock.now())
    }

    /// Refresh the token if it has never been acquired or is stale.
    #[instrument(skip(self))]
    pub async fn ensure_token(&self) -> Result<()> {
        if !self.is_stale().await {
            return Ok(());
        }

        self.refresh(false).await
    }

    /// Return a valid access token, refreshing first if needed.
    pub async fn get(&self) -> Result<String> {
        self.ensure_token().await?;
        self.access_token().await.ok_or_else(|| {
            Error::new(ErrorKind::Other(
                "no access token after refresh".to_string(),
            ))
        })
    }

    /// Refresh the token unconditionally.
    #[instrument(skip(self))]
    pub async fn acquire_access_token(&self) -> Result<()> {
        self.refresh(true).await
    }

    /// Resolve the project id for these credentials.
    ///
    /// Order: configured project, then `GOOGLE_CLOUD_PROJECT`,
    /// `GCLOUD_PROJECT`, `APPLICATION_ID`, then the metadata server (GCE) or
    /// the credential file's `project_id` (service accounts).
    #[instrument(skip(self))]
    pub async fn get_project(&self) -> Result<Option<String>> {
        if let Some(project) = self.project.clone().or_else(project_from_env) {
            return Ok(Some(project));
        }

        match &self.flow {
            Flow::GceMetadata(_) => {
                self.ensure_token().await?;
                let transport = self.transport().await?;

                let url = gce_project_endpoint(&self.metadata_base);
                let request = HttpRequest::get(url, self.timeout)
                    .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1);
                let response = {
                    let _guard = self.lock.lock().await;
                    transport.execute(request).await?
                };
                let project = response.error_for_status()?.body.trim().to_string();

                debug!(%project, "Resolved project from metadata server");
                Ok(Some(project).filter(|p| !p.is_empty()))
            }
            Flow::ServiceAccount(file) => Ok(file.project_id.clone()),
            Flow::AuthorizedUser(_) | Flow::Unsupported(_) => Ok(None),
        }
    }

    async fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport
            .get_or_try_init(|| async {
                let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
                Ok::<_, Error>(transport)
            })
            .await
            .cloned()
    }

    /// Refresh with retries. Each attempt runs under `self.lock`; backoff
    /// sleeps do not. Unless `force` is set, an attempt is skipped once the
    /// token is no longer stale.
    async fn refresh(&self, force: bool) -> Result<()> {
        let transport = self.transport().await?;
        let mut policy = RetryPolicy::new(self.retry.clone());

        debug!(token_type = ?self.token_type(), token_uri = %self.token_uri, "Refreshing access token");

        loop {
            let err = {
                let _guard = self.lock.lock().await;
                if !force && !self.is_stale().await {
                    debug!("Token was refreshed while waiting for the lock");
                    return Ok(());
                }
                match self.refresh_once(transport.as_ref()).await {
                    Ok(state) => {
                        debug!(expires_in = state.duration_secs, "Access token refreshed");
                        *self.state.write().await = state;
                        return Ok(());
                    }
                    Err(e) => e,
                }
            };

            if !err.is_retryable() {
                return Err(err);
            }

            match policy.next_delay() {
                Some(delay) => {
                    warn!(
                        attempt = policy.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Token refresh failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(Error::new(ErrorKind::RetriesExhausted {
                        attempts: policy.attempt(),
                        last: Box::new(err),
                    }));
                }
            }
        }
    }

    async fn refresh_once(&self, transport: &dyn Transport) -> Result<TokenState> {
        let request =
            self.flow
                .refresh_request(&self.token_uri, &self.scope, self.clock.now(), self.timeout)?;
        let response = transport.execute(request).await?;
        let token = TokenResponse::from_response(response)?;

        Ok(TokenState {
            access_token: Some(token.access_token),
            duration_secs: token.expires_in,
            acquired_at: self.clock.now(),
        })
    }
}

fn project_from_env() -> Option<String> {
    PROJECT_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::BackoffStrategy;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_key.pem");

    #[derive(Debug)]
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn at(timestamp: i64) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(DateTime::from_timestamp(timestamp, 0).unwrap()),
            })
        }

        fn advance(&self, by: chrono::Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    /// Answers from a script, then with successes once the script runs out.
    #[derive(Debug, Default)]
    struct StubTransport {
        calls: AtomicUsize,
        script: Mutex<VecDeque<HttpResponse>>,
        delay: Duration,
        expires_in: u64,
    }

    impl StubTransport {
        fn ok(expires_in: u64) -> Arc<Self> {
            Arc::new(Self {
                expires_in,
                ..Default::default()
            })
        }

        fn scripted(responses: Vec<HttpResponse>, expires_in: u64) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(responses.into()),
                expires_in,
                ..Default::default()
            })
        }

        fn slow(delay: Duration, expires_in: u64) -> Arc<Self> {
            Arc::new(Self {
                delay,
                expires_in,
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(response) = self.script.lock().unwrap().pop_front() {
                return Ok(response);
            }
            Ok(HttpResponse::new(
                200,
                format!(
                    r#"{{"access_token": "token-{}", "expires_in": {}}}"#,
                    call, self.expires_in
                ),
            ))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    fn unavailable() -> HttpResponse {
        HttpResponse::new(503, "Service Unavailable")
    }

    fn gce_token(transport: Arc<StubTransport>) -> Token {
        let config = Token::builder()
            .with_transport(transport)
            .with_retry(fast_retry())
            .with_project("test-project")
            .config()
            .clone();
        Token::for_gce_metadata(config).unwrap()
    }

    #[test]
    fn test_state_staleness_boundary() {
        let acquired_at = DateTime::from_timestamp(1_000, 0).unwrap();
        let state = TokenState {
            access_token: Some("t".to_string()),
            duration_secs: 3600,
            acquired_at,
        };

        assert!(!state.is_stale(acquired_at));
        assert!(!state.is_stale(acquired_at + chrono::Duration::seconds(1800)));
        assert!(state.is_stale(acquired_at + chrono::Duration::milliseconds(1_800_001)));
        assert!(TokenState::default().is_stale(acquired_at));
    }

    #[tokio::test]
    async fn test_first_ensure_refreshes_once() {
        let transport = StubTransport::ok(3600);
        let token = gce_token(transport.clone());

        assert!(token.is_stale().await);
        assert_eq!(
            token.access_token_acquired_at().await,
            DateTime::from_timestamp(0, 0).unwrap()
        );

        token.ensure_token().await.unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(token.access_token().await.as_deref(), Some("token-1"));
        assert_eq!(token.access_token_duration().await, 3600);

        token.ensure_token().await.unwrap();
        assert_eq!(token.get().await.unwrap(), "token-1");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_at_half_lifetime() {
        let clock = ManualClock::at(1_700_000_000);
        let transport = StubTransport::ok(3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .with_clock(clock.clone())
            .with_retry(fast_retry())
            .config()
            .clone();
        let token = Token::for_gce_metadata(config).unwrap();

        token.ensure_token().await.unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            token.access_token_acquired_at().await,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap()
        );

        clock.advance(chrono::Duration::seconds(1799));
        token.ensure_token().await.unwrap();
        assert_eq!(transport.calls(), 1);

        clock.advance(chrono::Duration::seconds(2));
        assert!(token.is_stale().await);
        token.ensure_token().await.unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(token.access_token().await.as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_acquire_always_refreshes() {
        let transport = StubTransport::ok(3600);
        let token = gce_token(transport.clone());

        token.acquire_access_token().await.unwrap();
        token.acquire_access_token().await.unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(token.access_token().await.as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_concurrent_get_refreshes_once() {
        let transport = StubTransport::slow(Duration::from_millis(50), 3600);
        let token = Arc::new(gce_token(transport.clone()));

        let tasks = (0..10).map(|_| {
            let token = token.clone();
            tokio::spawn(async move { token.get().await })
        });
        let results = futures::future::join_all(tasks).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap(), "token-1");
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_shared_lock_serializes_tokens() {
        let lock = new_api_lock();
        let transport = StubTransport::ok(3600);
        let build = || {
            let config = Token::builder()
                .with_transport(transport.clone())
                .with_lock(lock.clone())
                .config()
                .clone();
            Token::for_gce_metadata(config).unwrap()
        };
        let (a, b) = (build(), build());
        assert!(Arc::ptr_eq(&a.lock(), &b.lock()));

        let guard = lock.lock().await;
        let pending = tokio::spawn(async move { a.get().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.calls(), 0);
        drop(guard);

        assert_eq!(pending.await.unwrap().unwrap(), "token-1");
        b.get().await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let transport = StubTransport::scripted(vec![unavailable(), unavailable()], 3600);
        let token = gce_token(transport.clone());

        assert_eq!(token.get().await.unwrap(), "token-3");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_five_failures_are_terminal() {
        let transport = StubTransport::scripted(vec![unavailable(); 5], 3600);
        let token = gce_token(transport.clone());

        let err = token.ensure_token().await.unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::RetriesExhausted { attempts: 5, .. }
        ));
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.calls(), 5);
        assert!(token.access_token().await.is_none());
        assert!(token.is_stale().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_token() {
        let clock = ManualClock::at(1_700_000_000);
        let transport = StubTransport::scripted(
            vec![
                HttpResponse::new(200, r#"{"access_token": "first", "expires_in": 100}"#),
                unavailable(),
                unavailable(),
                unavailable(),
                unavailable(),
                unavailable(),
            ],
            100,
        );
        let config = Token::builder()
            .with_transport(transport.clone())
            .with_clock(clock.clone())
            .with_retry(fast_retry())
            .config()
            .clone();
        let token = Token::for_gce_metadata(config).unwrap();

        assert_eq!(token.get().await.unwrap(), "first");
        let acquired_at = token.access_token_acquired_at().await;

        clock.advance(chrono::Duration::seconds(51));
        assert!(token.get().await.is_err());
        assert_eq!(transport.calls(), 6);
        assert_eq!(token.access_token().await.as_deref(), Some("first"));
        assert_eq!(token.access_token_acquired_at().await, acquired_at);
        assert_eq!(token.access_token_duration().await, 100);
    }

    #[tokio::test]
    async fn test_service_account_requires_scopes() {
        let transport = StubTransport::ok(3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .config()
            .clone();
        let err = Token::from_credentials(
            CredentialsFile::service_account("svc@proj.iam.gserviceaccount.com", PRIVATE_KEY),
            config,
        )
        .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Config(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_without_retry() {
        let transport = StubTransport::ok(3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .with_retry(fast_retry())
            .config()
            .clone();
        let file = CredentialsFile::from_json(r#"{"type": "external_account"}"#).unwrap();
        let token = Token::from_credentials(file, config).unwrap();

        assert_eq!(token.token_type(), None);
        let err = token.get().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedType(ref t) if t == "external_account"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_field_fails_without_retry() {
        let transport = StubTransport::ok(3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .with_retry(fast_retry())
            .config()
            .clone();
        let file = CredentialsFile::from_json(
            r#"{"type": "authorized_user", "client_id": "id", "refresh_token": "rt"}"#,
        )
        .unwrap();
        let token = Token::from_credentials(file, config).unwrap();

        let err = token.get().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidCredentials(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_accessors() {
        let config = Token::builder()
            .with_scopes(["scope-a", "scope-b"])
            .with_transport(StubTransport::ok(3600))
            .config()
            .clone();
        let token = Token::from_credentials(
            CredentialsFile::service_account("svc@proj.iam.gserviceaccount.com", PRIVATE_KEY)
                .with_token_uri("https://oauth2.example.com/token"),
            config,
        )
        .unwrap();

        assert_eq!(token.token_type(), Some(TokenType::ServiceAccount));
        assert_eq!(token.token_uri(), "https://oauth2.example.com/token");
        assert_eq!(token.scopes(), ["scope-a", "scope-b"]);
        assert_eq!(token.access_token_duration().await, 0);

        let debug_output = format!("{:?}", token);
        assert!(debug_output.contains("ServiceAccount"));
        assert!(!debug_output.contains("PRIVATE KEY"));
    }

    #[tokio::test]
    async fn test_lock_released_during_backoff() {
        let lock = new_api_lock();
        let transport = StubTransport::scripted(vec![unavailable()], 3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .with_lock(lock.clone())
            .with_retry(
                RetryConfig::default()
                    .with_backoff(BackoffStrategy::Constant)
                    .with_initial_delay(Duration::from_millis(300)),
            )
            .config()
            .clone();
        let token = Arc::new(Token::for_gce_metadata(config).unwrap());

        let pending = {
            let token = token.clone();
            tokio::spawn(async move { token.get().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.calls(), 1);

        // Another token sharing the lock can proceed while this one backs off.
        let guard = tokio::time::timeout(Duration::from_millis(100), lock.lock()).await;
        assert!(guard.is_ok());
        drop(guard);

        assert_eq!(pending.await.unwrap().unwrap(), "token-2");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_project_env_read_on_each_call() {
        if PROJECT_ENV_VARS
            .iter()
            .any(|name| std::env::var_os(name).is_some())
        {
            return;
        }

        let config = Token::builder()
            .with_scopes(["scope"])
            .with_transport(StubTransport::ok(3600))
            .config()
            .clone();
        let token = Token::from_credentials(
            CredentialsFile::service_account("svc@proj.iam.gserviceaccount.com", PRIVATE_KEY)
                .with_project_id("file-project"),
            config,
        )
        .unwrap();
        assert_eq!(
            token.get_project().await.unwrap().as_deref(),
            Some("file-project")
        );

        std::env::set_var("APPLICATION_ID", "env-project");
        let project = token.get_project().await;
        std::env::remove_var("APPLICATION_ID");
        assert_eq!(project.unwrap().as_deref(), Some("env-project"));
    }

    #[tokio::test]
    async fn test_gce_metadata_file_uses_token_uri_override() {
        let transport = StubTransport::ok(3600);
        let config = Token::builder()
            .with_transport(transport.clone())
            .config()
            .clone();
        let file = CredentialsFile::from_json(
            r#"{"type": "gce_metadata", "token_uri": "http://override.example/token"}"#,
        )
        .unwrap();
        let token = Token::from_credentials(file, config).unwrap();

        assert_eq!(token.token_type(), Some(TokenType::GceMetadata));
        assert_eq!(token.token_uri(), "http://override.example/token");
    }

    #[tokio::test]
    async fn test_configured_project_wins() {
        let transport = StubTransport::ok(3600);
        let token = gce_token(transport.clone());

        assert_eq!(
            token.get_project().await.unwrap().as_deref(),
            Some("test-project")
        );
        assert_eq!(transport.calls(), 0);
    }
}
