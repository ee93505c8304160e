//! Token Refresh Core Components
//!
//! Core infrastructure: HTTP transport, time source and expiry policy.

pub mod clock;
pub mod expiry;
pub mod transport;

pub use clock::*;
pub use expiry::*;
pub use transport::*;
