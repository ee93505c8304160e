//! Configuration Builder
//!
//! Fluent builder for the refresh step configuration, and loading it from the
//! process environment.

use secrecy::SecretString;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::{
    ClientAuthMethod, ClientSettings, EpochUnit, RefreshConfig, SecretNames, VaultScope,
    VaultSettings, DEFAULT_EXPIRY_BUFFER, DEFAULT_TIMEOUT, DEFAULT_VAULT_API_URL,
};

pub const ENV_TOKEN_ENDPOINT: &str = "OAUTH_TOKEN_ENDPOINT";
pub const ENV_CLIENT_ID: &str = "OAUTH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "OAUTH_CLIENT_SECRET";
pub const ENV_CLIENT_AUTH_METHOD: &str = "OAUTH_CLIENT_AUTH_METHOD";
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "OAUTH_REFRESH_TIMEOUT_SECS";
pub const ENV_EXPIRY_BUFFER_SECS: &str = "OAUTH_EXPIRY_BUFFER_SECS";
pub const ENV_EXPIRES_AT_UNIT: &str = "OAUTH_EXPIRES_AT_UNIT";
pub const ENV_VAULT_REPOSITORY: &str = "OAUTH_VAULT_REPOSITORY";
pub const ENV_VAULT_TOKEN: &str = "OAUTH_VAULT_TOKEN";
pub const ENV_VAULT_API_URL: &str = "OAUTH_VAULT_API_URL";

/// Refresh configuration builder.
#[derive(Default)]
pub struct RefreshConfigBuilder {
    token_endpoint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: ClientAuthMethod,
    timeout: Option<Duration>,
    expiry_buffer: Option<Duration>,
    expiry_unit: EpochUnit,
    vault_api_url: Option<String>,
    vault_scope: Option<VaultScope>,
    vault_token: Option<SecretString>,
    secret_names: SecretNames,
}

impl RefreshConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Set exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set staleness buffer.
    pub fn expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = Some(buffer);
        self
    }

    /// Set the unit of `expires_at` in the execution context.
    pub fn expiry_unit(mut self, unit: EpochUnit) -> Self {
        self.expiry_unit = unit;
        self
    }

    /// Set vault API base URL.
    pub fn vault_api_url(mut self, url: impl Into<String>) -> Self {
        self.vault_api_url = Some(url.into());
        self
    }

    /// Set the repository owning the long-lived secrets.
    pub fn vault_scope(mut self, scope: VaultScope) -> Self {
        self.vault_scope = Some(scope);
        self
    }

    /// Set vault API token.
    pub fn vault_token(mut self, token: impl Into<String>) -> Self {
        self.vault_token = Some(SecretString::new(token.into()));
        self
    }

    /// Set vault secret names.
    pub fn secret_names(mut self, names: SecretNames) -> Self {
        self.secret_names = names;
        self
    }

    /// Build the refresh configuration.
    pub fn build(self) -> Result<RefreshConfig, ConfigurationError> {
        if let Some(endpoint) = &self.token_endpoint {
            validate_url(endpoint)?;
        }

        let api_url = self
            .vault_api_url
            .unwrap_or_else(|| DEFAULT_VAULT_API_URL.to_string());
        validate_url(&api_url)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                field: "timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(RefreshConfig {
            token_endpoint: self.token_endpoint,
            client: ClientSettings {
                client_id: self.client_id,
                client_secret: self.client_secret,
                auth_method: self.auth_method,
            },
            timeout,
            expiry_buffer: self.expiry_buffer.unwrap_or(DEFAULT_EXPIRY_BUFFER),
            expiry_unit: self.expiry_unit,
            vault: VaultSettings {
                api_url,
                scope: self.vault_scope,
                token: self.vault_token,
                secret_names: self.secret_names,
            },
        })
    }
}

fn validate_url(raw: &str) -> Result<(), ConfigurationError> {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
        }),
    }
}

fn parse_secs(field: &str, raw: &str) -> Result<Duration, ConfigurationError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigurationError::InvalidValue {
            field: field.to_string(),
            message: e.to_string(),
        })
}

impl RefreshConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup. Blank values count as
    /// unset; `OAUTH_VAULT_*` variables fall back to the runner's `GITHUB_*`
    /// ones. The token endpoint is optional here and only required once a
    /// refresh is needed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut builder = RefreshConfigBuilder::new();

        if let Some(endpoint) = get(ENV_TOKEN_ENDPOINT) {
            builder = builder.token_endpoint(endpoint.trim());
        }

        if let Some(client_id) = get(ENV_CLIENT_ID) {
            builder = builder.client_id(client_id.trim());
        }
        if let Some(client_secret) = get(ENV_CLIENT_SECRET) {
            builder = builder.client_secret(client_secret);
        }
        if let Some(method) = get(ENV_CLIENT_AUTH_METHOD) {
            builder = builder.auth_method(method.parse()?);
        }
        if let Some(raw) = get(ENV_REFRESH_TIMEOUT_SECS) {
            builder = builder.timeout(parse_secs(ENV_REFRESH_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = get(ENV_EXPIRY_BUFFER_SECS) {
            builder = builder.expiry_buffer(parse_secs(ENV_EXPIRY_BUFFER_SECS, &raw)?);
        }
        if let Some(unit) = get(ENV_EXPIRES_AT_UNIT) {
            builder = builder.expiry_unit(unit.parse()?);
        }
        if let Some(repository) = get(ENV_VAULT_REPOSITORY).or_else(|| get("GITHUB_REPOSITORY")) {
            builder = builder.vault_scope(repository.parse()?);
        }
        if let Some(token) = get(ENV_VAULT_TOKEN).or_else(|| get("GITHUB_TOKEN")) {
            builder = builder.vault_token(token);
        }
        if let Some(api_url) = get(ENV_VAULT_API_URL).or_else(|| get("GITHUB_API_URL")) {
            builder = builder.vault_api_url(api_url.trim());
        }

        builder.build()
    }
}

/// Create a new refresh configuration builder.
pub fn refresh_config() -> RefreshConfigBuilder {
    RefreshConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_builder_defaults() {
        let config = refresh_config()
            .token_endpoint("https://auth.example.com/oauth/token")
            .build()
            .unwrap();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.expiry_buffer, Duration::from_secs(300));
        assert_eq!(config.expiry_unit, EpochUnit::Milliseconds);
        assert_eq!(config.client.auth_method, ClientAuthMethod::ClientSecretPost);
        assert_eq!(config.vault.api_url, "https://api.github.com");
        assert!(config.vault.scope.is_none());
        assert!(config.client.client_id.is_none());
    }

    #[test]
    fn test_builder_without_endpoint() {
        let config = refresh_config().client_id("ci-client").build().unwrap();
        assert!(config.token_endpoint.is_none());
    }

    #[test]
    fn test_builder_rejects_invalid_urls() {
        for endpoint in ["not a url", "ftp://auth.example.com/token"] {
            let result = refresh_config().token_endpoint(endpoint).build();
            assert!(
                matches!(result, Err(ConfigurationError::InvalidEndpoint { .. })),
                "{}",
                endpoint
            );
        }
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = refresh_config()
            .token_endpoint("https://auth.example.com/oauth/token")
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_lookup_full() {
        let config = RefreshConfig::from_lookup(lookup(&[
            (ENV_TOKEN_ENDPOINT, "https://auth.example.com/oauth/token"),
            (ENV_CLIENT_ID, "ci-client"),
            (ENV_CLIENT_SECRET, "ci-secret"),
            (ENV_CLIENT_AUTH_METHOD, "client_secret_basic"),
            (ENV_REFRESH_TIMEOUT_SECS, "10"),
            (ENV_EXPIRY_BUFFER_SECS, "60"),
            (ENV_EXPIRES_AT_UNIT, "s"),
            (ENV_VAULT_REPOSITORY, "octo-org/pipeline"),
            (ENV_VAULT_TOKEN, "ghp_vault"),
        ]))
        .unwrap();

        assert_eq!(config.client.client_id.as_deref(), Some("ci-client"));
        assert_eq!(
            config.client.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("ci-secret")
        );
        assert_eq!(config.client.auth_method, ClientAuthMethod::ClientSecretBasic);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.expiry_buffer, Duration::from_secs(60));
        assert_eq!(config.expiry_unit, EpochUnit::Seconds);
        assert_eq!(
            config.vault.scope,
            Some(VaultScope::new("octo-org", "pipeline"))
        );
        assert!(config.vault.token.is_some());
    }

    #[test]
    fn test_from_lookup_falls_back_to_runner_variables() {
        let config = RefreshConfig::from_lookup(lookup(&[
            (ENV_TOKEN_ENDPOINT, "https://auth.example.com/oauth/token"),
            ("GITHUB_REPOSITORY", "octo-org/runner-repo"),
            ("GITHUB_TOKEN", "ghs_runner"),
            ("GITHUB_API_URL", "https://github.example.com/api/v3"),
            (ENV_VAULT_TOKEN, "  "),
        ]))
        .unwrap();

        assert_eq!(
            config.vault.scope,
            Some(VaultScope::new("octo-org", "runner-repo"))
        );
        assert_eq!(
            config.vault.token.as_ref().map(|s| s.expose_secret().as_str()),
            Some("ghs_runner")
        );
        assert_eq!(config.vault.api_url, "https://github.example.com/api/v3");
    }

    #[test]
    fn test_from_lookup_empty_environment() {
        let config = RefreshConfig::from_lookup(lookup(&[(ENV_TOKEN_ENDPOINT, " ")])).unwrap();
        assert!(config.token_endpoint.is_none());
        assert!(config.client.client_id.is_none());
        assert_eq!(config.vault.api_url, DEFAULT_VAULT_API_URL);
    }

    #[test]
    fn test_from_lookup_errors() {
        assert!(matches!(
            RefreshConfig::from_lookup(lookup(&[(ENV_TOKEN_ENDPOINT, "not a url")])),
            Err(ConfigurationError::InvalidEndpoint { .. })
        ));

        let bad_timeout = RefreshConfig::from_lookup(lookup(&[
            (ENV_TOKEN_ENDPOINT, "https://auth.example.com/oauth/token"),
            (ENV_REFRESH_TIMEOUT_SECS, "soon"),
        ]));
        assert!(matches!(
            bad_timeout,
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == ENV_REFRESH_TIMEOUT_SECS
        ));

        let bad_scope = RefreshConfig::from_lookup(lookup(&[
            (ENV_TOKEN_ENDPOINT, "https://auth.example.com/oauth/token"),
            (ENV_VAULT_REPOSITORY, "just-a-name"),
        ]));
        assert!(bad_scope.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = refresh_config()
            .token_endpoint("https://auth.example.com/oauth/token")
            .client_id("ci-client")
            .client_secret("super-secret-value")
            .vault_token("ghp_super-secret-token")
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("ci-client"));
    }
}
