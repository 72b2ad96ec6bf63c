//! Code vault
//!
//! Single-use promotional codes. `redeem` is the only operation the claim
//! flow needs; the local implementation sits on the claim database.

use async_trait::async_trait;

use crate::storage::{ClaimStorage, StorageError};

#[async_trait]
pub trait CodeVault: Send + Sync {
    /// Atomically invalidate `code`
    ///
    /// `Ok(true)` for exactly one caller per valid code; unknown or used
    /// codes give `Ok(false)`.
    async fn redeem(&self, code: &str) -> Result<bool, StorageError>;
}

/// Vault backed by the `codes` table
#[derive(Debug, Clone)]
pub struct LocalCodeVault {
    storage: ClaimStorage,
}

impl LocalCodeVault {
    pub fn new(storage: ClaimStorage) -> Self {
        Self { storage }
    }

    /// Load a batch of codes; returns how many were new
    pub fn import_codes(&self, codes: &[String]) -> Result<usize, StorageError> {
        let added = self.storage.import_codes(codes)?;
        tracing::info!(received = codes.len(), added, "Imported promo codes");
        Ok(added)
    }
}

#[async_trait]
impl CodeVault for LocalCodeVault {
    async fn redeem(&self, code: &str) -> Result<bool, StorageError> {
        let redeemed = self.storage.redeem_code(code)?;
        if !redeemed {
            tracing::debug!(code = %code, "Code unknown or already used");
        }
        Ok(redeemed)
    }
}
