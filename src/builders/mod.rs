//! Builders
//!
//! Fluent builder for the refresh step configuration.

pub mod config;

pub use config::{refresh_config, RefreshConfigBuilder};
