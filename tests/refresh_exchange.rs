//! Integration tests using WireMock
//!
//! Exercise the reqwest transport against a mock token endpoint and a mock
//! GitHub API, including the full refresh run.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use ci_token_refresh::{
    refresh_config, CiTokenRefresher, ClientCredentials, ClientAuthMethod, EpochUnit, FixedClock,
    GitHubSecretVault, HttpRefreshClient, InMemoryExecutionContext, LifecycleState, RefreshClient,
    RefreshError, ReqwestHttpTransport, SystemClock, TransportError, VaultScope,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Arc<ReqwestHttpTransport> {
    Arc::new(ReqwestHttpTransport::new().expect("Failed to build transport"))
}

fn refresh_client(server: &MockServer) -> HttpRefreshClient<ReqwestHttpTransport> {
    HttpRefreshClient::new(
        format!("{}/oauth/token", server.uri()),
        Duration::from_secs(5),
        transport(),
        Arc::new(SystemClock),
    )
}

fn client_credentials() -> ClientCredentials {
    ClientCredentials::new("ci-client", "ci-secret")
}

#[tokio::test]
async fn test_exchange_success_with_rotated_refresh_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .and(body_string_contains("client_id=ci-client"))
        .and(body_string_contains("client_secret=ci-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "R2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let credentials = refresh_client(&server)
        .exchange("R1", &client_credentials())
        .await
        .unwrap();

    assert_eq!(credentials.access_token(), "A2");
    assert_eq!(credentials.refresh_token(), "R2");
    assert!(credentials.expires_at() >= before + ChronoDuration::seconds(3600));
    assert!(credentials.expires_at() <= Utc::now() + ChronoDuration::seconds(3600));
}

#[tokio::test]
async fn test_exchange_keeps_refresh_token_when_omitted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let credentials = refresh_client(&server)
        .exchange("R1", &client_credentials())
        .await
        .unwrap();

    assert_eq!(credentials.refresh_token(), "R1");
}

#[tokio::test]
async fn test_exchange_with_basic_auth() {
    let server = MockServer::start().await;
    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("ci-client:ci-secret")
    );

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("authorization", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "expires_in": 60
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = client_credentials().with_auth_method(ClientAuthMethod::ClientSecretBasic);
    refresh_client(&server)
        .exchange("R1", &credentials)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exchange_invalid_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token has been revoked"
        })))
        .mount(&server)
        .await;

    let error = refresh_client(&server)
        .exchange("R1", &client_credentials())
        .await
        .unwrap_err();

    match error {
        RefreshError::Rejected {
            status,
            message,
            error_code,
        } => {
            assert_eq!(status, 400);
            assert!(message.contains("revoked"));
            assert_eq!(error_code.as_deref(), Some("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_exchange_server_error_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let error = refresh_client(&server)
        .exchange("R1", &client_credentials())
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(503));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_exchange_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "A2", "expires_in": 60}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = HttpRefreshClient::new(
        format!("{}/oauth/token", server.uri()),
        Duration::from_millis(200),
        transport(),
        Arc::new(SystemClock),
    );

    let error = client
        .exchange("R1", &client_credentials())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        RefreshError::Transport(TransportError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_full_run_refreshes_and_reports_vault_advisory() {
    let server = MockServer::start().await;
    let now = Utc::now();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo-org/pipeline/actions/secrets/public-key"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key_id": "568250167242549743",
            "key": base64::engine::general_purpose::STANDARD.encode([3u8; 32])
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = refresh_config()
        .token_endpoint(format!("{}/oauth/token", server.uri()))
        .client_id("ci-client")
        .client_secret("ci-secret")
        .expiry_unit(EpochUnit::Milliseconds)
        .vault_api_url(server.uri())
        .vault_scope(VaultScope::new("octo-org", "pipeline"))
        .vault_token("ghs_vault-token")
        .build()
        .unwrap();

    let context = Arc::new(
        InMemoryExecutionContext::new()
            .with_input("use_oauth", "true")
            .with_input("access_token", "A1")
            .with_input("refresh_token", "R1-long-refresh-token")
            .with_input(
                "expires_at",
                (now - ChronoDuration::seconds(10)).timestamp_millis().to_string(),
            ),
    );
    let transport = transport();
    let vault = Arc::new(GitHubSecretVault::new(
        config.vault.api_url.clone(),
        config.vault.token.clone(),
        transport.clone(),
    ));

    let refresher = CiTokenRefresher::with_components(
        config,
        context.clone(),
        transport,
        vault,
        Arc::new(FixedClock::new(now)),
    );

    let outcome = refresher.run().await.unwrap();
    assert!(outcome.is_refreshed());
    assert_eq!(refresher.state(), LifecycleState::Refreshed);

    assert_eq!(context.output("access_token").as_deref(), Some("A2"));
    assert_eq!(
        context.output("refresh_token").as_deref(),
        Some("R1-long-refresh-token")
    );
    assert_eq!(
        context.output("expires_at"),
        Some((now + ChronoDuration::seconds(3600)).timestamp_millis().to_string())
    );
    assert_eq!(context.get_masked(), vec!["A2", "R1-long-refresh-token"]);

    let warnings = context.get_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("OAUTH_REFRESH_TOKEN=R1-l..."));
    assert!(!warnings[0].contains("R1-long-refresh-token"));
}
