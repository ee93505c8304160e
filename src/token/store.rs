//! Token Store
//!
//! Reads the credential set from the execution context and writes rotated
//! sets back to the context and to the secret vault.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::error::{ConfigurationError, CredentialsError, PersistError, TokenRefreshError};
use crate::telemetry::redact;
use crate::token::context::ExecutionContext;
use crate::token::vault::{manual_update_advisory, SecretEntry, SecretVault};
use crate::types::{CredentialSet, EpochUnit, SecretNames, VaultScope};

/// Input gating OAuth mode.
pub const INPUT_USE_OAUTH: &str = "use_oauth";
/// Access token input and output name.
pub const ACCESS_TOKEN: &str = "access_token";
/// Refresh token input and output name.
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Expiry input and output name.
pub const EXPIRES_AT: &str = "expires_at";

/// Token store interface.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Whether OAuth mode is enabled for this run.
    fn oauth_enabled(&self) -> Result<bool, TokenRefreshError>;

    /// Load the current credential set.
    async fn load(&self) -> Result<CredentialSet, TokenRefreshError>;

    /// Expose a credential set to the rest of the current run.
    async fn persist_local(&self, credentials: &CredentialSet) -> Result<(), PersistError>;

    /// Write a credential set to long-lived storage for future runs.
    async fn persist_remote(&self, credentials: &CredentialSet) -> Result<(), PersistError>;

    /// Surface a warning to whoever watches the run.
    fn warn(&self, message: &str);
}

/// Parse a boolean flag input.
pub fn parse_flag(field: &str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a boolean, got {:?}", raw),
        }),
    }
}

/// Token store backed by an execution context and a secret vault.
pub struct ContextTokenStore<C: ExecutionContext, V: SecretVault> {
    context: Arc<C>,
    vault: Arc<V>,
    expiry_unit: EpochUnit,
    scope: Option<VaultScope>,
    secret_names: SecretNames,
}

impl<C: ExecutionContext, V: SecretVault> ContextTokenStore<C, V> {
    /// Create new token store.
    pub fn new(context: Arc<C>, vault: Arc<V>) -> Self {
        Self {
            context,
            vault,
            expiry_unit: EpochUnit::default(),
            scope: None,
            secret_names: SecretNames::default(),
        }
    }

    pub fn with_expiry_unit(mut self, unit: EpochUnit) -> Self {
        self.expiry_unit = unit;
        self
    }

    pub fn with_scope(mut self, scope: Option<VaultScope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_secret_names(mut self, names: SecretNames) -> Self {
        self.secret_names = names;
        self
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    fn required_input(&self, name: &str) -> Result<String, CredentialsError> {
        self.context
            .input(name)
            .ok_or_else(|| CredentialsError::Missing {
                field: name.to_string(),
            })
    }

    fn secret_entries(&self, credentials: &CredentialSet) -> Vec<SecretEntry> {
        vec![
            SecretEntry::new(
                self.secret_names.access_token.clone(),
                credentials.access_token(),
            ),
            SecretEntry::new(
                self.secret_names.refresh_token.clone(),
                credentials.refresh_token(),
            ),
            SecretEntry::new(
                self.secret_names.expires_at.clone(),
                self.expiry_unit.format(credentials.expires_at()),
            ),
        ]
    }
}

#[async_trait]
impl<C: ExecutionContext, V: SecretVault> TokenStore for ContextTokenStore<C, V> {
    fn oauth_enabled(&self) -> Result<bool, TokenRefreshError> {
        match self.context.input(INPUT_USE_OAUTH) {
            Some(raw) => Ok(parse_flag(INPUT_USE_OAUTH, &raw)?),
            None => Ok(false),
        }
    }

    async fn load(&self) -> Result<CredentialSet, TokenRefreshError> {
        let access_token = self.required_input(ACCESS_TOKEN)?;
        let refresh_token = self.required_input(REFRESH_TOKEN)?;
        let raw_expiry = self.required_input(EXPIRES_AT)?;
        let expires_at = self.expiry_unit.parse(&raw_expiry)?;

        tracing::debug!(
            access_token = %redact(&access_token),
            refresh_token = %redact(&refresh_token),
            expires_at = %expires_at,
            "Loaded credential set"
        );

        Ok(CredentialSet::new(access_token, refresh_token, expires_at))
    }

    async fn persist_local(&self, credentials: &CredentialSet) -> Result<(), PersistError> {
        self.context.mask(credentials.access_token());
        self.context.mask(credentials.refresh_token());

        self.context
            .set_output(ACCESS_TOKEN, credentials.access_token())?;
        self.context
            .set_output(REFRESH_TOKEN, credentials.refresh_token())?;
        self.context.set_output(
            EXPIRES_AT,
            &self.expiry_unit.format(credentials.expires_at()),
        )?;

        Ok(())
    }

    async fn persist_remote(&self, credentials: &CredentialSet) -> Result<(), PersistError> {
        let entries = self.secret_entries(credentials);

        let scope = match &self.scope {
            Some(scope) => scope,
            None => {
                return Err(PersistError::NotConfigured {
                    reason: "no vault repository".to_string(),
                    advisory: manual_update_advisory(None, &entries),
                })
            }
        };

        tracing::debug!(
            scope = %scope,
            secrets = entries.len(),
            refresh_token = %redact(entries[1].value.expose_secret()),
            "Writing credential set to secret vault"
        );

        self.vault.write_secrets(scope, &entries).await
    }

    fn warn(&self, message: &str) {
        self.context.warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::context::InMemoryExecutionContext;
    use crate::token::vault::MockSecretVault;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn full_context() -> InMemoryExecutionContext {
        InMemoryExecutionContext::new()
            .with_input(INPUT_USE_OAUTH, "true")
            .with_input(ACCESS_TOKEN, "A1")
            .with_input(REFRESH_TOKEN, "R1")
            .with_input(EXPIRES_AT, "1700000000000")
    }

    fn store(
        context: InMemoryExecutionContext,
    ) -> ContextTokenStore<InMemoryExecutionContext, MockSecretVault> {
        ContextTokenStore::new(Arc::new(context), Arc::new(MockSecretVault::new()))
            .with_scope(Some(VaultScope::new("octo-org", "pipeline")))
    }

    #[test]
    fn test_parse_flag() {
        for raw in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_flag("use_oauth", raw).unwrap(), "{}", raw);
        }
        for raw in ["false", "0", "No", "off"] {
            assert!(!parse_flag("use_oauth", raw).unwrap(), "{}", raw);
        }
        assert!(parse_flag("use_oauth", "maybe").is_err());
    }

    #[test]
    fn test_oauth_enabled_gate() {
        assert!(store(full_context()).oauth_enabled().unwrap());
        assert!(!store(InMemoryExecutionContext::new())
            .oauth_enabled()
            .unwrap());
        assert!(!store(InMemoryExecutionContext::new().with_input(INPUT_USE_OAUTH, "false"))
            .oauth_enabled()
            .unwrap());

        let invalid = store(InMemoryExecutionContext::new().with_input(INPUT_USE_OAUTH, "sure"))
            .oauth_enabled()
            .unwrap_err();
        assert!(matches!(invalid, TokenRefreshError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_load_reads_all_fields() {
        let credentials = store(full_context()).load().await.unwrap();
        assert_eq!(credentials.access_token(), "A1");
        assert_eq!(credentials.refresh_token(), "R1");
        assert_eq!(
            credentials.expires_at(),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
        );
    }

    #[tokio::test]
    async fn test_load_names_missing_field() {
        let context = InMemoryExecutionContext::new()
            .with_input(ACCESS_TOKEN, "A1")
            .with_input(REFRESH_TOKEN, "  ")
            .with_input(EXPIRES_AT, "1700000000000");

        let error = store(context).load().await.unwrap_err();
        match error {
            TokenRefreshError::Credentials(CredentialsError::Missing { field }) => {
                assert_eq!(field, REFRESH_TOKEN)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_rejects_unparsable_expiry() {
        let context = InMemoryExecutionContext::new()
            .with_input(ACCESS_TOKEN, "A1")
            .with_input(REFRESH_TOKEN, "R1")
            .with_input(EXPIRES_AT, "tomorrow");

        let error = store(context).load().await.unwrap_err();
        assert!(matches!(
            error,
            TokenRefreshError::Credentials(CredentialsError::InvalidExpiry { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_in_seconds() {
        let store = store(full_context().with_input(EXPIRES_AT, "1700000000"))
            .with_expiry_unit(EpochUnit::Seconds);
        let credentials = store.load().await.unwrap();
        assert_eq!(credentials.expires_at().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_persist_local_masks_then_writes_outputs() {
        let store = store(full_context());
        let expires_at = Utc.timestamp_millis_opt(1_700_003_600_000).unwrap();
        store
            .persist_local(&CredentialSet::new("A2", "R2", expires_at))
            .await
            .unwrap();

        let context = store.context();
        assert_eq!(context.get_masked(), vec!["A2", "R2"]);
        assert_eq!(
            context.get_outputs(),
            vec![
                (ACCESS_TOKEN.to_string(), "A2".to_string()),
                (REFRESH_TOKEN.to_string(), "R2".to_string()),
                (EXPIRES_AT.to_string(), "1700003600000".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_local_failure_is_reported() {
        let store = store(full_context());
        store.context().set_fail_outputs(true);
        let result = store
            .persist_local(&CredentialSet::new("A2", "R2", Utc::now()))
            .await;
        assert!(matches!(result, Err(PersistError::LocalWrite { .. })));
    }

    #[tokio::test]
    async fn test_persist_remote_writes_named_secrets() {
        let vault = Arc::new(MockSecretVault::new());
        let store = ContextTokenStore::new(Arc::new(full_context()), vault.clone())
            .with_scope(Some(VaultScope::new("octo-org", "pipeline")))
            .with_expiry_unit(EpochUnit::Seconds);
        let expires_at = Utc.timestamp_opt(1_700_003_600, 0).unwrap();

        store
            .persist_remote(&CredentialSet::new("A2", "R2", expires_at))
            .await
            .unwrap();

        let history = vault.get_write_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0, VaultScope::new("octo-org", "pipeline"));
        assert_eq!(
            history[0].1,
            vec!["OAUTH_ACCESS_TOKEN", "OAUTH_REFRESH_TOKEN", "OAUTH_EXPIRES_AT"]
        );
        assert_eq!(vault.secret("OAUTH_EXPIRES_AT").as_deref(), Some("1700003600"));
    }

    #[tokio::test]
    async fn test_persist_remote_without_scope_is_not_configured() {
        let vault = Arc::new(MockSecretVault::new());
        let store = ContextTokenStore::new(Arc::new(full_context()), vault.clone());

        let error = store
            .persist_remote(&CredentialSet::new("A2", "R2", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(error, PersistError::NotConfigured { .. }));
        assert!(error.advisory().unwrap().contains("OAUTH_REFRESH_TOKEN"));
        assert!(vault.get_write_history().is_empty());
    }
}
