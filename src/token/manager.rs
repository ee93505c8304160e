//! Token Lifecycle Manager
//!
//! Sole entry point of the refresh step. Decides whether the loaded access
//! token is still usable, refreshes it when it is not, and propagates the
//! rotated credential set to the current run and to the secret vault.

use std::sync::{Arc, Mutex};

use crate::core::{Clock, ExpiryPolicy};
use crate::error::{ConfigurationError, RefreshError, TokenRefreshError};
use crate::telemetry::redact;
use crate::token::refresh::RefreshClient;
use crate::token::store::TokenStore;
use crate::types::{ClientCredentials, ClientSettings, CredentialSet};

/// Last state reached by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Disabled,
    Loaded,
    Valid,
    NeedsRefresh,
    Refreshing,
    Refreshed,
    RefreshFailed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Disabled => "disabled",
            Self::Loaded => "loaded",
            Self::Valid => "valid",
            Self::NeedsRefresh => "needs_refresh",
            Self::Refreshing => "refreshing",
            Self::Refreshed => "refreshed",
            Self::RefreshFailed => "refresh_failed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a lifecycle evaluation.
#[derive(Debug, Clone)]
pub enum LifecycleOutcome {
    /// OAuth mode is off; there are no credentials.
    Disabled,
    /// The loaded set was still usable and is returned unchanged.
    Valid(CredentialSet),
    /// A new set was obtained and persisted locally.
    Refreshed(CredentialSet),
}

impl LifecycleOutcome {
    /// Credential set to use, if OAuth mode is on.
    pub fn credentials(&self) -> Option<&CredentialSet> {
        match self {
            Self::Disabled => None,
            Self::Valid(credentials) | Self::Refreshed(credentials) => Some(credentials),
        }
    }

    pub fn into_credentials(self) -> Option<CredentialSet> {
        match self {
            Self::Disabled => None,
            Self::Valid(credentials) | Self::Refreshed(credentials) => Some(credentials),
        }
    }

    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

/// Orchestrates load, staleness check, refresh and persistence.
pub struct TokenLifecycleManager<S: TokenStore, R: RefreshClient> {
    store: Arc<S>,
    refresh_client: Arc<R>,
    client: ClientSettings,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    /// Superseding set, once one has been obtained in this process.
    current: tokio::sync::Mutex<Option<CredentialSet>>,
    state: Mutex<LifecycleState>,
}

impl<S: TokenStore, R: RefreshClient> TokenLifecycleManager<S, R> {
    /// Create new lifecycle manager.
    pub fn new(
        store: Arc<S>,
        refresh_client: Arc<R>,
        client: ClientSettings,
        policy: ExpiryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            refresh_client,
            client,
            policy,
            clock,
            current: tokio::sync::Mutex::new(None),
            state: Mutex::new(LifecycleState::Idle),
        }
    }

    /// Last state reached.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(from = state.as_str(), to = next.as_str(), "Lifecycle transition");
        *state = next;
    }

    fn fail(&self, error: TokenRefreshError) -> TokenRefreshError {
        self.transition(LifecycleState::RefreshFailed);
        tracing::error!(
            error = %error,
            error_code = error.error_code(),
            retryable = error.is_retryable(),
            "Token refresh failed"
        );
        error
    }

    fn client_credentials(&self) -> Result<ClientCredentials, TokenRefreshError> {
        self.client.credentials().map_err(|e| match e {
            ConfigurationError::MissingRequired { field } => {
                RefreshError::MissingClientCredentials { field }.into()
            }
            other => other.into(),
        })
    }

    /// Return a usable credential set, refreshing it first if it is about to
    /// expire.
    ///
    /// Concurrent callers serialize on the manager; once a refresh has
    /// succeeded, later calls evaluate the superseding set instead of the
    /// loaded one and never reuse the consumed refresh token.
    pub async fn ensure_valid(&self) -> Result<LifecycleOutcome, TokenRefreshError> {
        let mut current = self.current.lock().await;
        self.transition(LifecycleState::Idle);

        if !self.store.oauth_enabled()? {
            self.transition(LifecycleState::Disabled);
            tracing::info!("OAuth mode disabled, no credentials");
            return Ok(LifecycleOutcome::Disabled);
        }

        let loaded = match current.as_ref() {
            Some(credentials) => credentials.clone(),
            None => self.store.load().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to load credential set");
                e
            })?,
        };
        self.transition(LifecycleState::Loaded);

        let now = self.clock.now();
        if !self.policy.is_expiring_soon(loaded.expires_at(), now) {
            self.transition(LifecycleState::Valid);
            tracing::info!(
                expires_at = %loaded.expires_at(),
                remaining_secs = self.policy.remaining(loaded.expires_at(), now).as_secs(),
                "Access token still valid"
            );
            return Ok(LifecycleOutcome::Valid(loaded));
        }
        self.transition(LifecycleState::NeedsRefresh);

        let client_credentials = self.client_credentials().map_err(|e| self.fail(e))?;

        self.transition(LifecycleState::Refreshing);
        tracing::info!(
            expires_at = %loaded.expires_at(),
            refresh_token = %redact(loaded.refresh_token()),
            "Refreshing access token"
        );

        let refreshed = self
            .refresh_client
            .exchange(loaded.refresh_token(), &client_credentials)
            .await
            .map_err(|e| self.fail(e.into()))?;

        // The old refresh token is consumed from here on.
        *current = Some(refreshed.clone());

        if let Err(e) = self.store.persist_local(&refreshed).await {
            return Err(self.fail(e.into()));
        }

        if let Err(e) = self.store.persist_remote(&refreshed).await {
            tracing::warn!(
                error = %e,
                not_implemented = e.is_not_implemented(),
                "Failed to persist credential set to secret vault"
            );
            self.store.warn(&e.to_string());
        }

        self.transition(LifecycleState::Refreshed);
        tracing::info!(
            expires_at = %refreshed.expires_at(),
            refresh_token = %redact(refreshed.refresh_token()),
            "Access token refreshed"
        );

        Ok(LifecycleOutcome::Refreshed(refreshed))
    }
}
