//! Refresh Client
//!
//! Exchanges a refresh token for a new credential set (RFC 6749 Section 6).
//! The wire contract lives entirely behind [`RefreshClient`], so the endpoint
//! and payload shape can change without touching the lifecycle manager.

use async_trait::async_trait;
use base64::Engine;
use chrono::Duration as ChronoDuration;
use secrecy::ExposeSecret;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::{Clock, HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, RefreshError};
use crate::telemetry::redact;
use crate::types::{ClientAuthMethod, ClientCredentials, CredentialSet, GrantType, TokenResponse};

/// Refresh token exchange interface.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Exchange `refresh_token` for a new credential set.
    ///
    /// Performs exactly one request and never retries.
    async fn exchange(
        &self,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> Result<CredentialSet, RefreshError>;
}

/// Refresh client speaking the standard form-encoded refresh grant.
pub struct HttpRefreshClient<T: HttpTransport> {
    token_endpoint: Option<String>,
    timeout: Duration,
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<T: HttpTransport> HttpRefreshClient<T> {
    /// Create new refresh client.
    pub fn new(
        token_endpoint: impl Into<String>,
        timeout: Duration,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_optional_endpoint(Some(token_endpoint.into()), timeout, transport, clock)
    }

    /// Create refresh client whose endpoint may be unset. Exchanges then fail
    /// with [`RefreshError::MissingTokenEndpoint`] before any request is sent.
    pub fn with_optional_endpoint(
        token_endpoint: Option<String>,
        timeout: Duration,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_endpoint,
            timeout,
            transport,
            clock,
        }
    }

    fn build_request_body(
        &self,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> Result<String, RefreshError> {
        let mut params = vec![
            ("grant_type", GrantType::RefreshToken.as_str()),
            ("refresh_token", refresh_token),
        ];

        if credentials.auth_method == ClientAuthMethod::ClientSecretPost {
            params.push(("client_id", credentials.client_id.as_str()));
            params.push(("client_secret", credentials.client_secret.expose_secret().as_str()));
        }

        serde_urlencoded::to_string(&params).map_err(|e| RefreshError::RequestEncoding {
            message: e.to_string(),
        })
    }

    fn build_request_headers(&self, credentials: &ClientCredentials) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        if credentials.auth_method == ClientAuthMethod::ClientSecretBasic {
            // RFC 6749 Section 2.3.1: form-encode both parts before joining.
            let id = form_encode(&credentials.client_id);
            let secret = form_encode(credentials.client_secret.expose_secret());
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", id, secret));
            headers.insert("authorization".to_string(), format!("Basic {}", encoded));
        }

        headers
    }

    fn parse_response(
        &self,
        status: u16,
        body: &str,
        previous_refresh_token: &str,
    ) -> Result<CredentialSet, RefreshError> {
        let response: TokenResponse =
            serde_json::from_str(body).map_err(|e| RefreshError::Malformed {
                status,
                message: e.to_string(),
            })?;

        if response.access_token.trim().is_empty() {
            return Err(RefreshError::Malformed {
                status,
                message: "access_token is empty".to_string(),
            });
        }

        let expires_in = response.expires_in.ok_or_else(|| RefreshError::Malformed {
            status,
            message: "expires_in is missing".to_string(),
        })?;

        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| RefreshError::Malformed {
                status,
                message: format!("expires_in {} is out of range", expires_in),
            })?;

        let refresh_token = match response.refresh_token {
            Some(rotated) if !rotated.trim().is_empty() => rotated,
            _ => previous_refresh_token.to_string(),
        };

        Ok(CredentialSet::new(
            response.access_token,
            refresh_token,
            expires_at,
        ))
    }
}

fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl<T: HttpTransport> RefreshClient for HttpRefreshClient<T> {
    async fn exchange(
        &self,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> Result<CredentialSet, RefreshError> {
        let endpoint = self
            .token_endpoint
            .as_deref()
            .ok_or(RefreshError::MissingTokenEndpoint)?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: endpoint.to_string(),
            headers: self.build_request_headers(credentials),
            body: Some(self.build_request_body(refresh_token, credentials)?),
            timeout: Some(self.timeout),
        };

        tracing::debug!(
            endpoint = %endpoint,
            client_id = %credentials.client_id,
            refresh_token = %redact(refresh_token),
            "Sending refresh token exchange"
        );

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let credentials = self.parse_response(response.status, &response.body, refresh_token)?;

        tracing::debug!(
            status = response.status,
            expires_at = %credentials.expires_at(),
            "Refresh token exchange succeeded"
        );

        Ok(credentials)
    }
}

/// Mock refresh client for testing.
#[derive(Default)]
pub struct MockRefreshClient {
    results: Mutex<VecDeque<Result<CredentialSet, RefreshError>>>,
    exchange_history: Mutex<Vec<String>>,
}

impl MockRefreshClient {
    /// Create new mock refresh client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful exchange.
    pub fn queue_credentials(&self, credentials: CredentialSet) -> &Self {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(credentials));
        self
    }

    /// Queue a failed exchange.
    pub fn queue_error(&self, error: RefreshError) -> &Self {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
        self
    }

    /// Refresh tokens passed to `exchange`, in call order.
    pub fn get_exchange_history(&self) -> Vec<String> {
        self.exchange_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `exchange` calls.
    pub fn exchange_count(&self) -> usize {
        self.exchange_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl RefreshClient for MockRefreshClient {
    async fn exchange(
        &self,
        refresh_token: &str,
        _credentials: &ClientCredentials,
    ) -> Result<CredentialSet, RefreshError> {
        self.exchange_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(refresh_token.to_string());

        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(RefreshError::Rejected {
                    status: 500,
                    message: "No mock exchange result available".to_string(),
                    error_code: None,
                })
            })
    }
}
