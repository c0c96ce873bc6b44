//! Offline action queue persistence.
//!
//! Each pending action is one row keyed by its monotonic `u64` id, so an
//! ascending scan is FIFO order. Id assignment and the append happen inside
//! a single write transaction; redb's single-writer discipline makes that
//! the serialization point for racing enqueues, and the committed
//! transaction is the durability point required before `enqueue` returns.

use chrono::Utc;
use redb::{ReadableTable, ReadableTableMetadata, TableDefinition};

use super::Storage;
use crate::error::SyncError;
use crate::types::{ActionId, ActionKind, QueuedAction};

pub(super) const ACTIONS_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("offline_actions");

impl Storage {
    /// Append a new action with a fresh monotonic id and `attempts = 0`.
    ///
    /// The action is durably persisted before this returns.
    pub fn append_action(&self, kind: ActionKind) -> Result<QueuedAction, SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let action = {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            let next_id = {
                let last = table.iter()?.next_back().transpose()?;
                last.map(|(k, _)| k.value() + 1).unwrap_or(1)
            };
            let action = QueuedAction {
                id: ActionId(next_id),
                kind,
                enqueued_at: Utc::now().timestamp(),
                attempts: 0,
            };
            let data = serde_json::to_vec(&action)
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            table.insert(next_id, data.as_slice())?;
            action
        };
        write_txn.commit()?;
        Ok(action)
    }

    /// Load all persisted queue rows in ascending id (FIFO) order.
    ///
    /// Rows are returned undecoded; the queue component owns the policy for
    /// rows that no longer decode.
    pub fn load_actions_raw(&self) -> Result<Vec<(u64, Vec<u8>)>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ACTIONS_TABLE)?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            rows.push((key.value(), value.value().to_vec()));
        }
        Ok(rows)
    }

    /// Rewrite one action row (used to bump its attempt counter).
    pub fn store_action(&self, action: &QueuedAction) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            let data = serde_json::to_vec(action)
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            table.insert(action.id.as_u64(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete one action row by id. Returns whether the row existed.
    pub fn remove_action(&self, id: ActionId) -> Result<bool, SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            let existed = table.remove(id.as_u64())?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Delete all action rows.
    pub fn clear_actions(&self) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            let keys: Vec<u64> = {
                let mut keys = Vec::new();
                for entry in table.iter()? {
                    let (key, _) = entry?;
                    keys.push(key.value());
                }
                keys
            };
            for key in keys {
                table.remove(key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert a raw row, bypassing the typed append path. Unit tests use
    /// this to plant rows this build cannot decode.
    #[cfg(test)]
    pub(crate) fn insert_action_raw(&self, id: u64, bytes: &[u8]) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            table.insert(id, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of persisted action rows.
    pub fn action_count(&self) -> Result<u64, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ACTIONS_TABLE)?;
        Ok(table.len()?)
    }
}
