//! CI Token Refresher
//!
//! High-level entry point wiring the production stack (reqwest transport,
//! GitHub Actions context and secrets) from a [`RefreshConfig`].

use std::sync::Arc;

use crate::core::{
    Clock, ExpiryPolicy, HttpTransport, ReqwestHttpTransport, SystemClock,
    DEFAULT_MAX_RESPONSE_SIZE,
};
use crate::error::TokenRefreshError;
use crate::token::{
    ContextTokenStore, ExecutionContext, GitHubActionsContext, GitHubSecretVault,
    HttpRefreshClient, LifecycleOutcome, LifecycleState, SecretVault, TokenLifecycleManager,
};
use crate::types::RefreshConfig;

/// Token refresher for a CI run.
pub struct CiTokenRefresher<
    C: ExecutionContext = GitHubActionsContext,
    T: HttpTransport = ReqwestHttpTransport,
    V: SecretVault = GitHubSecretVault<ReqwestHttpTransport>,
> {
    context: Arc<C>,
    manager: TokenLifecycleManager<ContextTokenStore<C, V>, HttpRefreshClient<T>>,
}

impl CiTokenRefresher {
    /// Create a refresher for the current GitHub Actions run.
    pub fn new(config: RefreshConfig) -> Result<Self, TokenRefreshError> {
        let transport = Arc::new(ReqwestHttpTransport::with_options(
            config.timeout,
            DEFAULT_MAX_RESPONSE_SIZE,
        )?);
        let vault = Arc::new(GitHubSecretVault::new(
            config.vault.api_url.clone(),
            config.vault.token.clone(),
            transport.clone(),
        ));
        let context = Arc::new(GitHubActionsContext::from_env());

        Ok(Self::with_components(
            config,
            context,
            transport,
            vault,
            Arc::new(SystemClock),
        ))
    }
}

impl<C: ExecutionContext, T: HttpTransport, V: SecretVault> CiTokenRefresher<C, T, V> {
    /// Create a refresher with custom components.
    pub fn with_components(
        config: RefreshConfig,
        context: Arc<C>,
        transport: Arc<T>,
        vault: Arc<V>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = ContextTokenStore::new(context.clone(), vault)
            .with_expiry_unit(config.expiry_unit)
            .with_scope(config.vault.scope.clone())
            .with_secret_names(config.vault.secret_names.clone());

        let refresh_client = HttpRefreshClient::with_optional_endpoint(
            config.token_endpoint.clone(),
            config.timeout,
            transport,
            clock.clone(),
        );

        let manager = TokenLifecycleManager::new(
            Arc::new(store),
            Arc::new(refresh_client),
            config.client,
            ExpiryPolicy::new(config.expiry_buffer),
            clock,
        );

        Self { context, manager }
    }

    /// Execution context of the run.
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Ensure the run holds a usable credential set.
    pub async fn run(&self) -> Result<LifecycleOutcome, TokenRefreshError> {
        self.manager.ensure_valid().await
    }

    /// Last lifecycle state reached.
    pub fn state(&self) -> LifecycleState {
        self.manager.state()
    }
}
