//! Persistent storage using redb.
//!
//! This module provides ACID-compliant storage for:
//! - The active session (auth token + user identity)
//! - The offline action queue (pending mutating operations)
//!
//! redb allows a single write transaction at a time, which is the
//! serialization point that keeps concurrent enqueue/drain operations from
//! interleaving into a torn persisted state. A committed write transaction
//! is durable, which is what makes `enqueue` crash-safe.

use crate::error::SyncError;
use parking_lot::RwLock;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

// Submodules
mod queue;
mod session;

// Table initialization (used in Storage::open)
use queue::ACTIONS_TABLE;
use session::SESSION_TABLE;

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Open (or create) a storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSION_TABLE)?;
            let _ = write_txn.open_table(ACTIONS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}
