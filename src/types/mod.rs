//! Token Refresh Types
//!
//! Data structures shared across the token lifecycle.

pub mod config;
pub mod credentials;
pub mod timestamp;
pub mod token;

pub use config::*;
pub use credentials::*;
pub use timestamp::*;
pub use token::*;
