//! Token Lifecycle
//!
//! - **Execution context**: inputs, outputs and annotations of the CI run
//! - **Secret vault**: long-lived storage for the next run
//! - **Token store**: credential set load and persistence over both
//! - **Refresh client**: refresh-token exchange against the token endpoint
//! - **Lifecycle manager**: staleness check, refresh and propagation

pub mod context;
pub mod manager;
pub mod refresh;
pub mod store;
pub mod vault;

// Execution Context
pub use context::{
    escape_command_data, ExecutionContext, GitHubActionsContext, InMemoryExecutionContext,
};

// Secret Vault
pub use vault::{
    manual_update_advisory, GitHubSecretVault, MockSecretVault, PublicKey, SecretEntry,
    SecretVault,
};

// Token Store
pub use store::{parse_flag, ContextTokenStore, TokenStore};

// Refresh Client
pub use refresh::{HttpRefreshClient, MockRefreshClient, RefreshClient};

// Lifecycle Manager
pub use manager::{LifecycleOutcome, LifecycleState, TokenLifecycleManager};
