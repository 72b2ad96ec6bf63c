//! Claim lifecycle controller
//!
//! ```text
//! pending --approve(ok)-----> confirm     [awaiting_review -> complete]
//! pending --approve(error)--> pending     [unchanged, error reported]
//! pending --reject----------> cancelled   [awaiting_review -> cancelled]
//! confirm | cancelled: terminal, further decisions -> AlreadyDecided
//! ```

mod controller;
mod error;

pub use controller::{ClaimController, Payout, PayoutSettings};
pub use error::{ClaimError, ClaimResult, Prerequisite};
