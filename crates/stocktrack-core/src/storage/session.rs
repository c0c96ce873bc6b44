//! Session persistence.
//!
//! There is exactly one active session, stored under a fixed key. The value
//! is the serde_json encoding of [`Session`].

use redb::{ReadableTable, TableDefinition};

use super::Storage;
use crate::error::SyncError;
use crate::session::Session;

pub(super) const SESSION_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("session");

/// Fixed storage key (only one session per device)
const SESSION_KEY: &str = "session";

impl Storage {
    /// Persist the session, replacing any prior one.
    pub fn save_session(&self, session: &Session) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_TABLE)?;
            let data = serde_json::to_vec(session)
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            table.insert(SESSION_KEY, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load the persisted session.
    ///
    /// Returns `None` if no session is stored. A stored value that cannot be
    /// decoded is reported as `StorageCorruption`; callers treat that as
    /// absent, never as fatal.
    pub fn load_session(&self) -> Result<Option<Session>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(SESSION_TABLE)?;

        match table.get(SESSION_KEY)? {
            Some(v) => {
                let session: Session = serde_json::from_slice(v.value())
                    .map_err(|e| SyncError::StorageCorruption(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Remove the persisted session. No-op if none is stored.
    pub fn delete_session(&self) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_TABLE)?;
            table.remove(SESSION_KEY)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
