//! Shared types for the claim payout service
//!
//! Domain models, the unified error system and small utilities used by
//! `claim-server` and anything that talks to its HTTP API.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
