use redb::{ReadableDatabase, WriteTransaction};

use super::{ClaimStorage, DRAFTS_TABLE, StorageResult};
use crate::conversation::Draft;

impl ClaimStorage {
    pub fn get_draft(&self, user_id: i64) -> StorageResult<Option<Draft>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DRAFTS_TABLE)?;

        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_draft_txn(&self, txn: &WriteTransaction, draft: &Draft) -> StorageResult<()> {
        let mut table = txn.open_table(DRAFTS_TABLE)?;
        let value = serde_json::to_vec(draft)?;
        table.insert(draft.user_id, value.as_slice())?;
        Ok(())
    }

    pub fn put_draft(&self, draft: &Draft) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_draft_txn(&txn, draft)?;
        txn.commit()?;
        Ok(())
    }

    pub fn remove_draft_txn(&self, txn: &WriteTransaction, user_id: i64) -> StorageResult<()> {
        let mut table = txn.open_table(DRAFTS_TABLE)?;
        table.remove(user_id)?;
        Ok(())
    }

    pub fn remove_draft(&self, user_id: i64) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.remove_draft_txn(&txn, user_id)?;
        txn.commit()?;
        Ok(())
    }
}
