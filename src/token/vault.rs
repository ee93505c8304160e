//! Secret Vault
//!
//! Long-lived secret storage that lets the next CI run start with the rotated
//! credential set. Writes to GitHub Actions secrets must be sealed with the
//! repository public key; that encryption is not implemented, so the GitHub
//! vault stops after validating the key and returns a manual-update advisory
//! instead of writing anything.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::PersistError;
use crate::telemetry::redact;
use crate::types::VaultScope;

/// Length of a sealed-box (X25519) public key.
const PUBLIC_KEY_LEN: usize = 32;

/// A named secret value to write.
#[derive(Clone)]
pub struct SecretEntry {
    pub name: String,
    pub value: SecretString,
}

impl SecretEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: SecretString::new(value.into()),
        }
    }
}

impl std::fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEntry")
            .field("name", &self.name)
            .field("value", &redact(self.value.expose_secret()))
            .finish()
    }
}

/// Manual-update instruction listing each secret with a truncated value.
pub fn manual_update_advisory(scope: Option<&VaultScope>, entries: &[SecretEntry]) -> String {
    let target = scope
        .map(|s| format!("repository {}", s))
        .unwrap_or_else(|| "the secret store".to_string());
    let listed = entries
        .iter()
        .map(|e| format!("{}={}", e.name, redact(e.value.expose_secret())))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "update these secrets in {} manually with the values from this run: {}",
        target, listed
    )
}

/// Secret vault interface.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Write secrets under `scope`.
    async fn write_secrets(
        &self,
        scope: &VaultScope,
        entries: &[SecretEntry],
    ) -> Result<(), PersistError>;
}

/// Repository public key used to seal secrets.
#[derive(Clone, Debug, Deserialize)]
pub struct PublicKey {
    /// Key ID.
    pub key_id: String,
    /// Public key (base64 encoded).
    pub key: String,
}

/// GitHub Actions repository secrets.
pub struct GitHubSecretVault<T: HttpTransport> {
    api_url: String,
    token: Option<SecretString>,
    transport: Arc<T>,
}

impl<T: HttpTransport> GitHubSecretVault<T> {
    pub fn new(api_url: impl Into<String>, token: Option<SecretString>, transport: Arc<T>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            transport,
        }
    }

    fn public_key_url(&self, scope: &VaultScope) -> String {
        format!(
            "{}/repos/{}/{}/actions/secrets/public-key",
            self.api_url, scope.owner, scope.repository
        )
    }

    /// Fetch and validate the repository public key.
    pub async fn get_public_key(
        &self,
        scope: &VaultScope,
        token: &SecretString,
    ) -> Result<PublicKey, PersistError> {
        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Bearer {}", token.expose_secret()),
        );
        headers.insert(
            "accept".to_string(),
            "application/vnd.github+json".to_string(),
        );
        headers.insert("x-github-api-version".to_string(), "2022-11-28".to_string());

        let response = self
            .transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: self.public_key_url(scope),
                headers,
                body: None,
                timeout: None,
            })
            .await?;

        if !response.is_success() {
            return Err(PersistError::Vault {
                status: response.status,
                message: format!("failed to fetch public key for {}", scope),
            });
        }

        let key: PublicKey =
            serde_json::from_str(&response.body).map_err(|e| PersistError::Vault {
                status: response.status,
                message: format!("malformed public key response: {}", e),
            })?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(key.key.trim())
            .map_err(|e| PersistError::Vault {
                status: response.status,
                message: format!("public key {} is not valid base64: {}", key.key_id, e),
            })?;

        if decoded.len() != PUBLIC_KEY_LEN {
            return Err(PersistError::Vault {
                status: response.status,
                message: format!(
                    "public key {} has {} bytes, expected {}",
                    key.key_id,
                    decoded.len(),
                    PUBLIC_KEY_LEN
                ),
            });
        }

        Ok(key)
    }
}

#[async_trait]
impl<T: HttpTransport> SecretVault for GitHubSecretVault<T> {
    async fn write_secrets(
        &self,
        scope: &VaultScope,
        entries: &[SecretEntry],
    ) -> Result<(), PersistError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| PersistError::NotConfigured {
                reason: "no vault token".to_string(),
                advisory: manual_update_advisory(Some(scope), entries),
            })?;

        let key = self.get_public_key(scope, token).await?;

        tracing::debug!(
            scope = %scope,
            key_id = %key.key_id,
            "Fetched repository public key"
        );

        // TODO: seal each value with the repository key (libsodium sealed box)
        // and PUT /repos/{owner}/{repo}/actions/secrets/{name}.
        Err(PersistError::NotImplemented {
            capability: "sealed-box secret encryption",
            advisory: manual_update_advisory(Some(scope), entries),
        })
    }
}

/// Mock secret vault for testing.
#[derive(Default)]
pub struct MockSecretVault {
    secrets: Mutex<HashMap<String, String>>,
    write_history: Mutex<Vec<(VaultScope, Vec<String>)>>,
    next_error: Mutex<Option<PersistError>>,
}

impl MockSecretVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: PersistError) -> &Self {
        *self.next_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    /// Scopes and secret names written, in call order.
    pub fn get_write_history(&self) -> Vec<(VaultScope, Vec<String>)> {
        self.write_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stored secret value.
    pub fn secret(&self, name: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl SecretVault for MockSecretVault {
    async fn write_secrets(
        &self,
        scope: &VaultScope,
        entries: &[SecretEntry],
    ) -> Result<(), PersistError> {
        self.write_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((
                scope.clone(),
                entries.iter().map(|e| e.name.clone()).collect(),
            ));

        if let Some(error) = self
            .next_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            return Err(error);
        }

        let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries {
            secrets.insert(entry.name.clone(), entry.value.expose_secret().clone());
        }
        Ok(())
    }
}
