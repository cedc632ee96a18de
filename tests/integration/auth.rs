//! Token refresh flows against mock OAuth and metadata servers.

use std::sync::Arc;

use gcloud_rest::auth::{ErrorKind, Token, TokenType};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{
    fast_retry, init_tracing, token_response, write_credentials, TEST_PRIVATE_KEY,
};

// ============================================================================
// authorized_user
// ============================================================================

#[tokio::test]
async fn test_authorized_user_refresh() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("client_id=client123"))
        .and(body_string_contains("client_secret=secret456"))
        .and(body_string_contains("refresh_token=refresh789"))
        .respond_with(token_response("ya29.user-token", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service_file = write_credentials(
        dir.path(),
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "client123",
            "client_secret": "secret456",
            "refresh_token": "refresh789",
            "token_uri": format!("{}/token", server.uri()),
        }),
    );

    let token = Token::builder()
        .with_service_file(&service_file)
        .with_retry(fast_retry())
        .build()
        .unwrap();

    assert_eq!(token.token_type(), Some(TokenType::AuthorizedUser));
    assert_eq!(token.token_uri(), format!("{}/token", server.uri()));

    // Second call is served from the cache.
    assert_eq!(token.get().await.unwrap(), "ya29.user-token");
    assert_eq!(token.get().await.unwrap(), "ya29.user-token");
    assert_eq!(token.access_token_duration().await, 3600);
    assert!(!token.is_stale().await);
}

#[tokio::test]
async fn test_authorized_user_invalid_grant_exhausts_retries() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service_file = write_credentials(
        dir.path(),
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "client123",
            "client_secret": "secret456",
            "refresh_token": "revoked",
            "token_uri": format!("{}/token", server.uri()),
        }),
    );

    let token = Token::builder()
        .with_service_file(&service_file)
        .with_retry(fast_retry())
        .build()
        .unwrap();

    let err = token.ensure_token().await.unwrap_err();
    match &err.kind {
        ErrorKind::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 5);
            assert!(matches!(
                &last.kind,
                ErrorKind::OAuth { status: 400, error, .. } if error == "invalid_grant"
            ));
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
    assert!(token.access_token().await.is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("ya29.after-retries", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service_file = write_credentials(
        dir.path(),
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "client123",
            "client_secret": "secret456",
            "refresh_token": "refresh789",
            "token_uri": format!("{}/token", server.uri()),
        }),
    );

    let token = Token::builder()
        .with_service_file(&service_file)
        .with_retry(fast_retry())
        .build()
        .unwrap();

    assert_eq!(token.get().await.unwrap(), "ya29.after-retries");
}

// ============================================================================
// service_account
// ============================================================================

#[tokio::test]
async fn test_service_account_refresh() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion=ey"))
        .respond_with(token_response("ya29.service-token", 3599))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service_file = write_credentials(
        dir.path(),
        serde_json::json!({
            "type": "service_account",
            "project_id": "sa-project",
            "client_email": "svc@sa-project.iam.gserviceaccount.com",
            "private_key": TEST_PRIVATE_KEY,
            "token_uri": format!("{}/token", server.uri()),
        }),
    );

    let token = Token::builder()
        .with_service_file(&service_file)
        .with_scopes(["https://www.googleapis.com/auth/datastore"])
        .with_retry(fast_retry())
        .build()
        .unwrap();

    assert_eq!(token.token_type(), Some(TokenType::ServiceAccount));
    assert_eq!(token.get().await.unwrap(), "ya29.service-token");
    assert_eq!(token.access_token_duration().await, 3599);
}

#[tokio::test]
async fn test_service_account_without_scopes_fails_before_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(token_response("unused", 3600))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service_file = write_credentials(
        dir.path(),
        serde_json::json!({
            "type": "service_account",
            "client_email": "svc@sa-project.iam.gserviceaccount.com",
            "private_key": TEST_PRIVATE_KEY,
            "token_uri": format!("{}/token", server.uri()),
        }),
    );

    let err = Token::builder()
        .with_service_file(&service_file)
        .build()
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Config(_)));
}

#[tokio::test]
async fn test_explicit_missing_service_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = Token::builder()
        .with_service_file(dir.path().join("does-not-exist.json"))
        .build()
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Io(_)));
}

// ============================================================================
// gce_metadata
// ============================================================================

async fn metadata_token(server: &MockServer) -> Token {
    let config = Token::builder()
        .with_metadata_base(format!("{}/computeMetadata/v1", server.uri()))
        .with_retry(fast_retry())
        .config()
        .clone();
    Token::for_gce_metadata(config).unwrap()
}

#[tokio::test]
async fn test_gce_metadata_refresh_and_project() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .and(query_param("recursive", "true"))
        .and(header("metadata-flavor", "Google"))
        .respond_with(token_response("ya29.metadata-token", 3600))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/project/project-id"))
        .and(header("metadata-flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_string("gce-project"))
        .mount(&server)
        .await;

    let token = metadata_token(&server).await;
    assert_eq!(token.token_type(), Some(TokenType::GceMetadata));
    assert!(token.token_uri().ends_with("/token?recursive=true"));

    if gcloud_rest::auth::PROJECT_ENV_VARS
        .iter()
        .all(|name| std::env::var(name).is_err())
    {
        assert_eq!(
            token.get_project().await.unwrap().as_deref(),
            Some("gce-project")
        );
    }

    assert_eq!(token.get().await.unwrap(), "ya29.metadata-token");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .respond_with(
            token_response("ya29.shared", 3600).set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token = Arc::new(metadata_token(&server).await);
    let callers = (0..8).map(|_| {
        let token = token.clone();
        async move { token.get().await }
    });

    for result in futures::future::join_all(callers).await {
        assert_eq!(result.unwrap(), "ya29.shared");
    }
}

#[tokio::test]
#[allow(deprecated)]
async fn test_deprecated_shims_still_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .respond_with(token_response("ya29.legacy", 3600))
        .expect(2)
        .mount(&server)
        .await;

    let token = metadata_token(&server).await;
    token.ensure().await.unwrap();
    token.ensure().await.unwrap();
    token.acquire().await.unwrap();
    assert_eq!(token.access_token().await.as_deref(), Some("ya29.legacy"));
}
