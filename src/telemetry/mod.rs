//! Telemetry
//!
//! Logging setup and secret redaction for diagnostics.

pub mod logging;
pub mod redaction;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use redaction::redact;
