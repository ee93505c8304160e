//! Token Refresh Error Types
//!
//! Error hierarchy for the CI token lifecycle. Only configuration, credential,
//! refresh and local persistence failures ever reach the caller; remote vault
//! failures are downgraded to warnings by the lifecycle manager.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the token lifecycle.
#[derive(Error, Debug)]
pub enum TokenRefreshError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Missing credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(
        "Token refresh failed, re-authenticate and update the stored secrets manually: {0}"
    )]
    Refresh(#[from] RefreshError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

impl TokenRefreshError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "TOKEN_CONFIG",
            Self::Credentials(_) => "TOKEN_MISSING_CREDENTIALS",
            Self::Refresh(_) => "TOKEN_REFRESH",
            Self::Persist(_) => "TOKEN_PERSIST",
        }
    }

    /// Whether a pipeline-level retry could succeed.
    ///
    /// Nothing in this crate retries on its own; this only classifies the
    /// failure for the surrounding CI job.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refresh(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether an operator has to re-authenticate and update secrets by hand.
    pub fn needs_manual_intervention(&self) -> bool {
        match self {
            Self::Credentials(_) => true,
            Self::Refresh(e) => !e.is_retryable(),
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

/// Errors reading the credential set from the execution context.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("{field} is absent or empty while OAuth mode is enabled")]
    Missing { field: String },

    #[error("expires_at {value:?} is not a valid epoch timestamp: {message}")]
    InvalidExpiry { value: String, message: String },
}

/// Token endpoint exchange error.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("token endpoint rejected the refresh (HTTP {status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        /// RFC 6749 `error` code, when the body carried one.
        error_code: Option<String>,
    },

    #[error("malformed token response (HTTP {status}): {message}")]
    Malformed { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("OAuth client credentials are not configured: {field} is missing")]
    MissingClientCredentials { field: String },

    #[error("token endpoint is not configured: set OAUTH_TOKEN_ENDPOINT")]
    MissingTokenEndpoint,

    #[error("failed to encode refresh request: {message}")]
    RequestEncoding { message: String },
}

impl RefreshError {
    /// HTTP status of the exchange, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::Malformed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl TransportError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConnectionFailed { .. })
    }
}

/// Persistence error.
///
/// `advisory` fields carry a manual-update instruction with redacted values.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to write execution output {name}: {message}")]
    LocalWrite { name: String, message: String },

    #[error("secret vault request failed (HTTP {status}): {message}")]
    Vault { status: u16, message: String },

    #[error("secret vault unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("secret vault is not configured ({reason}); {advisory}")]
    NotConfigured { reason: String, advisory: String },

    #[error("{capability} is not implemented; {advisory}")]
    NotImplemented {
        capability: &'static str,
        advisory: String,
    },
}

impl PersistError {
    /// Manual-update instruction attached to this error, if any.
    pub fn advisory(&self) -> Option<&str> {
        match self {
            Self::NotConfigured { advisory, .. } | Self::NotImplemented { advisory, .. } => {
                Some(advisory)
            }
            _ => None,
        }
    }

    /// Check if this is the unimplemented sealed-encryption path.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

/// Result type for token lifecycle operations.
pub type TokenRefreshResult<T> = Result<T, TokenRefreshError>;

/// OAuth2 error response from the token endpoint (RFC 6749 Section 5.2).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Create a refresh error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> RefreshError {
    if let Some(response) = parse_error_response(body) {
        let message = match &response.error_description {
            Some(description) => format!("{}: {}", response.error, description),
            None => response.error.clone(),
        };
        return RefreshError::Rejected {
            status,
            message,
            error_code: Some(response.error),
        };
    }

    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };

    RefreshError::Rejected {
        status,
        message,
        error_code: None,
    }
}
