//! CI Token Refresh
//!
//! OAuth credential lifecycle for an automated CI pipeline: decide whether the
//! access token handed to the run is still usable, refresh it against the
//! authorization server when it is not, and propagate the rotated credential
//! set to the current run and to the repository's secret store.
//!
//! # Features
//!
//! - Staleness check with a configurable safety buffer
//! - Token Refresh (RFC 6749 Section 6), `client_secret_post` or `client_secret_basic`
//! - GitHub Actions inputs, masked outputs and workflow annotations
//! - GitHub Actions secrets as the long-lived store (manual-update advisory
//!   until sealed encryption is available)
//!
//! # Example
//!
//! ```rust,ignore
//! use ci_token_refresh::{CiTokenRefresher, RefreshConfig, LifecycleOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RefreshConfig::from_env()?;
//!     let refresher = CiTokenRefresher::new(config)?;
//!
//!     match refresher.run().await? {
//!         LifecycleOutcome::Disabled => println!("no credentials"),
//!         LifecycleOutcome::Valid(_) => println!("access token still valid"),
//!         LifecycleOutcome::Refreshed(_) => println!("access token refreshed"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: credential set, configuration and timestamp types
//! - `error`: error hierarchy
//! - `core`: HTTP transport, clock and expiry policy
//! - `token`: execution context, secret vault, token store, refresh client and
//!   the lifecycle manager
//! - `builders`: fluent configuration builder and environment loading
//! - `telemetry`: logging setup and secret redaction
//! - `client`: production wiring of all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::CiTokenRefresher;

// Re-export builders
pub use builders::{refresh_config, RefreshConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, parse_error_response, ConfigurationError, CredentialsError,
    OAuth2ErrorResponse, PersistError, RefreshError, TokenRefreshError, TokenRefreshResult,
    TransportError,
};

// Re-export types
pub use types::{
    // Config
    ClientAuthMethod, ClientCredentials, ClientSettings, GrantType, RefreshConfig, SecretNames,
    VaultScope, VaultSettings,
    // Credentials
    CredentialSet, EpochUnit, TokenResponse,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Time
    is_expiring_soon, Clock, ExpiryPolicy, FixedClock, SystemClock,
};

// Re-export token lifecycle
pub use token::{
    // Context
    ExecutionContext, GitHubActionsContext, InMemoryExecutionContext,
    // Vault
    GitHubSecretVault, MockSecretVault, SecretEntry, SecretVault,
    // Store
    ContextTokenStore, TokenStore,
    // Refresh
    HttpRefreshClient, MockRefreshClient, RefreshClient,
    // Manager
    LifecycleOutcome, LifecycleState, TokenLifecycleManager,
};

// Re-export telemetry
pub use telemetry::{redact, LogFormat, LogLevel, LoggingConfig};
