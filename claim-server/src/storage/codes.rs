use redb::{ReadableDatabase, ReadableTable};

use super::{CODES_TABLE, ClaimStorage, StorageResult};

impl ClaimStorage {
    /// Load codes into the vault, returning how many were new
    ///
    /// Codes already present keep their redeemed flag, so re-importing a
    /// batch never revives a used code.
    pub fn import_codes<I, S>(&self, codes: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let txn = self.begin_write()?;
        let mut added = 0;
        {
            let mut table = txn.open_table(CODES_TABLE)?;
            for code in codes {
                let code = code.as_ref().trim();
                if code.is_empty() {
                    continue;
                }
                if table.get(code)?.is_none() {
                    table.insert(code, false)?;
                    added += 1;
                }
            }
        }
        txn.commit()?;
        Ok(added)
    }

    /// Atomically mark a code as used
    ///
    /// Returns `true` only for the first redemption of a known code. redb
    /// serializes write transactions, so concurrent callers see one winner.
    pub fn redeem_code(&self, code: &str) -> StorageResult<bool> {
        let txn = self.begin_write()?;
        let redeemed = {
            let mut table = txn.open_table(CODES_TABLE)?;
            let used = table.get(code)?.map(|g| g.value());
            match used {
                Some(false) => {
                    table.insert(code, true)?;
                    true
                }
                _ => false,
            }
        };
        if redeemed {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(redeemed)
    }

    /// `None` for unknown codes, otherwise whether the code was used
    pub fn code_redeemed(&self, code: &str) -> StorageResult<Option<bool>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CODES_TABLE)?;
        Ok(table.get(code)?.map(|g| g.value()))
    }
}
