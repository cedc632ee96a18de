use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use gcloud_rest::auth::RetryConfig;
use wiremock::ResponseTemplate;

/// Private key the mock token endpoints accept assertions from.
pub const TEST_PRIVATE_KEY: &str =
    include_str!("../../crates/gcloud-auth/tests/fixtures/test_key.pem");

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Retries with millisecond delays so failing flows finish quickly.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(10))
}

/// A successful token endpoint response.
pub fn token_response(access_token: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer"
    }))
}

/// Write a credential file into `dir` and return its path.
pub fn write_credentials(dir: &Path, credentials: serde_json::Value) -> PathBuf {
    let path = dir.join("credentials.json");
    std::fs::write(&path, credentials.to_string()).expect("write credential file");
    path
}
