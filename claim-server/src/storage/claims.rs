use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use shared::models::{Claim, ProcessStatus};
use shared::util::format_claim_id;

use super::{
    CLAIM_SEQ_KEY, CLAIMS_TABLE, ClaimStorage, SEQUENCE_TABLE, StorageError, StorageResult,
};

impl ClaimStorage {
    // ========== Claim Id Allocation ==========

    /// Allocate the next claim id and insert the claim built for it
    ///
    /// The counter bump and the insert share `txn`; if the caller drops the
    /// transaction the number is not consumed.
    pub fn insert_new_claim_txn(
        &self,
        txn: &WriteTransaction,
        build: impl FnOnce(String) -> Claim,
    ) -> StorageResult<Claim> {
        let next = {
            let mut seq = txn.open_table(SEQUENCE_TABLE)?;
            let current = seq.get(CLAIM_SEQ_KEY)?.map(|g| g.value()).unwrap_or(0);
            let next = current + 1;
            seq.insert(CLAIM_SEQ_KEY, next)?;
            next
        };

        let claim = build(format_claim_id(next));
        claim.validate()?;

        let mut table = txn.open_table(CLAIMS_TABLE)?;
        let value = serde_json::to_vec(&claim)?;
        table.insert(claim.claim_id.as_str(), value.as_slice())?;
        Ok(claim)
    }

    /// Last allocated claim number (0 before the first claim)
    pub fn current_claim_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table.get(CLAIM_SEQ_KEY)?.map(|g| g.value()).unwrap_or(0))
    }

    // ========== Claim Operations ==========

    pub fn get_claim(&self, claim_id: &str) -> StorageResult<Option<Claim>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLAIMS_TABLE)?;

        match table.get(claim_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a claim inside a write transaction, failing if it does not exist
    pub fn require_claim_txn(&self, txn: &WriteTransaction, claim_id: &str) -> StorageResult<Claim> {
        let table = txn.open_table(CLAIMS_TABLE)?;
        let value = table
            .get(claim_id)?
            .ok_or_else(|| StorageError::ClaimNotFound(claim_id.to_string()))?;
        Ok(serde_json::from_slice(value.value())?)
    }

    /// Overwrite an existing claim (within transaction)
    ///
    /// The claim is validated first; a row violating the payout or status
    /// invariants is never written.
    pub fn update_claim_txn(&self, txn: &WriteTransaction, claim: &Claim) -> StorageResult<()> {
        claim.validate()?;
        let mut table = txn.open_table(CLAIMS_TABLE)?;
        if table.get(claim.claim_id.as_str())?.is_none() {
            return Err(StorageError::ClaimNotFound(claim.claim_id.clone()));
        }
        let value = serde_json::to_vec(claim)?;
        table.insert(claim.claim_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Overwrite an existing claim in its own transaction
    pub fn update_claim(&self, claim: &Claim) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.update_claim_txn(&txn, claim)?;
        txn.commit()?;
        Ok(())
    }

    /// Claims in the given stage, ordered by claim id
    pub fn list_claims(&self, process_status: ProcessStatus) -> StorageResult<Vec<Claim>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLAIMS_TABLE)?;

        let mut claims = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let claim: Claim = serde_json::from_slice(value.value())?;
            if claim.process_status() == process_status {
                claims.push(claim);
            }
        }

        claims.sort_by_key(|c| shared::util::parse_claim_id(&c.claim_id));
        Ok(claims)
    }
}
