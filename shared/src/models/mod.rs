//! Data models
//!
//! Stored by claim-server as JSON in redb and returned as-is by its HTTP API.
//! Timestamps are epoch milliseconds.

pub mod claim;
pub mod payment;

// Re-exports
pub use claim::*;
pub use payment::*;
