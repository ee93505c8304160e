//! Timestamp Types
//!
//! Conversion between external epoch strings and the internal UTC instant.
//! Every instant inside the crate is a `DateTime<Utc>`; epoch values are
//! converted once, at the execution-context boundary, in an explicitly
//! configured unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, CredentialsError};

/// Unit of an absolute epoch timestamp exchanged with the execution context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochUnit {
    Seconds,
    #[default]
    Milliseconds,
}

impl EpochUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Milliseconds => "ms",
        }
    }

    /// Parse an epoch string into a UTC instant.
    pub fn parse(&self, raw: &str) -> Result<DateTime<Utc>, CredentialsError> {
        let trimmed = raw.trim();
        let value: i64 = trimmed.parse().map_err(|e: std::num::ParseIntError| {
            CredentialsError::InvalidExpiry {
                value: trimmed.to_string(),
                message: e.to_string(),
            }
        })?;

        let instant = match self {
            Self::Seconds => DateTime::from_timestamp(value, 0),
            Self::Milliseconds => DateTime::from_timestamp_millis(value),
        };

        instant.ok_or_else(|| CredentialsError::InvalidExpiry {
            value: trimmed.to_string(),
            message: format!("out of range for epoch {}", self.as_str()),
        })
    }

    /// Format a UTC instant as an epoch string.
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self {
            Self::Seconds => instant.timestamp().to_string(),
            Self::Milliseconds => instant.timestamp_millis().to_string(),
        }
    }
}

impl std::str::FromStr for EpochUnit {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "seconds" => Ok(Self::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(Self::Milliseconds),
            other => Err(ConfigurationError::InvalidValue {
                field: "expires_at_unit".to_string(),
                message: format!("expected \"s\" or \"ms\", got {:?}", other),
            }),
        }
    }
}

impl std::fmt::Display for EpochUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
