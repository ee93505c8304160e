//! Token Types
//!
//! Token endpoint response for the refresh grant.

use serde::Deserialize;
use std::collections::HashMap;

/// Token response from authorization server.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds, relative to the moment of the response.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Rotated refresh token, if the server issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "test-refresh",
            "scope": "read write"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "test-token");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.refresh_token, Some("test-refresh".to_string()));
        assert_eq!(response.scope, Some("read write".to_string()));
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let json = r#"{"access_token": "A2", "expires_in": 3600, "id_token": "x"}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert!(response.refresh_token.is_none());
        assert!(response.extra.contains_key("id_token"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let json = r#"{"access_token": "secret-access", "refresh_token": "secret-refresh"}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let debug = format!("{:?}", response);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
