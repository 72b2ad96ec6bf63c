//! redb-based storage for claims, payments and conversation drafts
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `claims` | `claim_id` | `Claim` | Claim entity |
//! | `payments` | `konsol_id` | `Payment` | One row per gateway payment |
//! | `claim_payments` | `claim_id` | `konsol_id` | Latest payment of a claim |
//! | `drafts` | `user_id` | `Draft` | Conversation in progress |
//! | `codes` | `code` | `bool` (redeemed) | Local code vault |
//! | `sequence_counter` | `"claim_seq"` | `u64` | Claim number allocation |
//!
//! Values are JSON. Transitions that touch more than one record (claim id
//! allocation + claim + draft, payment + index + claim) share one write
//! transaction, so a failure leaves nothing half-written.

mod claims;
mod codes;
mod drafts;
mod payments;

use redb::{Database, TableDefinition, WriteTransaction};
use shared::error::{AppError, ErrorCode};
use shared::models::ClaimInvariantError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use payments::StatusUpdate;

const CLAIMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("claims");

const PAYMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("payments");

/// claim_id -> konsol_id of the most recent payment
const CLAIM_PAYMENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("claim_payments");

const DRAFTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("drafts");

/// code -> redeemed flag
const CODES_TABLE: TableDefinition<&str, bool> = TableDefinition::new("codes");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const CLAIM_SEQ_KEY: &str = "claim_seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Claim invariant violated: {0}")]
    Invariant(#[from] ClaimInvariantError),

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Claim {claim_id} already has payment {konsol_id}")]
    DuplicatePayment { claim_id: String, konsol_id: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ClaimNotFound(id) => AppError::claim_not_found(id),
            StorageError::PaymentNotFound(id) => {
                AppError::with_message(ErrorCode::PaymentNotFound, format!("Payment {id} not found"))
                    .with_detail("konsol_id", id)
            }
            StorageError::DuplicatePayment { claim_id, konsol_id } => {
                AppError::new(ErrorCode::ClaimAlreadyDecided)
                    .with_detail("claim_id", claim_id)
                    .with_detail("konsol_id", konsol_id)
            }
            StorageError::Invariant(e) => AppError::with_message(ErrorCode::InvalidRequest, e.to_string()),
            other => AppError::database(other.to_string()),
        }
    }
}

/// Claim and payment storage backed by redb
#[derive(Clone)]
pub struct ClaimStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for ClaimStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimStorage").finish_non_exhaustive()
    }
}

impl ClaimStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns, the claim or payment is on disk.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and local experiments)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CLAIMS_TABLE)?;
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(CLAIM_PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(DRAFTS_TABLE)?;
            let _ = write_txn.open_table(CODES_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }
}
