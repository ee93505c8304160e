//! Configuration Types
//!
//! Process-wide configuration for the token refresh step.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::EpochUnit;

/// Default exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default staleness buffer.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(300);
/// Default secret vault API base URL.
pub const DEFAULT_VAULT_API_URL: &str = "https://api.github.com";

/// Refresh step configuration.
#[derive(Clone, Debug)]
pub struct RefreshConfig {
    /// Token endpoint URL, required only when a refresh is needed.
    pub token_endpoint: Option<String>,
    /// Client id and secret, when configured.
    pub client: ClientSettings,
    /// Exchange timeout.
    pub timeout: Duration,
    /// Refresh tokens this long before expiry.
    pub expiry_buffer: Duration,
    /// Unit of `expires_at` in the execution context.
    pub expiry_unit: EpochUnit,
    /// Remote secret vault settings.
    pub vault: VaultSettings,
}

/// Client settings as configured; validated into [`ClientCredentials`] only
/// when a refresh is actually needed.
#[derive(Clone, Default)]
pub struct ClientSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub auth_method: ClientAuthMethod,
}

impl ClientSettings {
    /// Build the credentials required for the exchange.
    pub fn credentials(&self) -> Result<ClientCredentials, ConfigurationError> {
        let client_id = self
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            })?;

        let client_secret = self
            .client_secret
            .clone()
            .filter(|secret| !secret.expose_secret().trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            })?;

        Ok(ClientCredentials {
            client_id,
            client_secret,
            auth_method: self.auth_method,
        })
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client credentials for the refresh exchange.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            auth_method: ClientAuthMethod::default(),
        }
    }

    pub fn with_auth_method(mut self, auth_method: ClientAuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in request body.
    #[default]
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
}

impl std::str::FromStr for ClientAuthMethod {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client_secret_post" | "post" => Ok(Self::ClientSecretPost),
            "client_secret_basic" | "basic" => Ok(Self::ClientSecretBasic),
            other => Err(ConfigurationError::InvalidValue {
                field: "client_auth_method".to_string(),
                message: format!("unsupported client auth method {:?}", other),
            }),
        }
    }
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Scope of the long-lived secret vault (repository that owns the secrets).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultScope {
    pub owner: String,
    pub repository: String,
}

impl VaultScope {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
        }
    }
}

impl std::str::FromStr for VaultScope {
    type Err = ConfigurationError;

    /// Parse an `owner/repository` slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, repository))
                if !owner.is_empty() && !repository.is_empty() && !repository.contains('/') =>
            {
                Ok(Self::new(owner, repository))
            }
            _ => Err(ConfigurationError::InvalidValue {
                field: "vault_repository".to_string(),
                message: format!("expected owner/repository, got {:?}", s),
            }),
        }
    }
}

impl std::fmt::Display for VaultScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// Names under which the credential set is kept in the vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretNames {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            access_token: "OAUTH_ACCESS_TOKEN".to_string(),
            refresh_token: "OAUTH_REFRESH_TOKEN".to_string(),
            expires_at: "OAUTH_EXPIRES_AT".to_string(),
        }
    }
}

/// Remote secret vault settings.
#[derive(Clone)]
pub struct VaultSettings {
    /// Vault API base URL.
    pub api_url: String,
    /// Repository that owns the secrets.
    pub scope: Option<VaultScope>,
    /// Token authorized to manage the repository's secrets.
    pub token: Option<SecretString>,
    /// Secret names.
    pub secret_names: SecretNames,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_VAULT_API_URL.to_string(),
            scope: None,
            token: None,
            secret_names: SecretNames::default(),
        }
    }
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("api_url", &self.api_url)
            .field("scope", &self.scope)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("secret_names", &self.secret_names)
            .finish()
    }
}
