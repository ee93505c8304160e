//! Credential Types
//!
//! The access/refresh/expiry triple that the lifecycle manager hands out.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::telemetry::redact;

/// Access token, refresh token and absolute expiry.
///
/// Immutable once constructed; a refresh produces a new `CredentialSet` that
/// supersedes the old one. `Debug` never prints either token in full.
#[derive(Clone)]
pub struct CredentialSet {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CredentialSet {
    /// Create a new credential set.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            expires_at,
        }
    }

    /// Bearer token for downstream API calls.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Refresh token, used only to mint the next credential set.
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// When the access token stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &redact(self.access_token()))
            .field("refresh_token", &redact(self.refresh_token()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
