//! Durable action queue: the append-only log of pending mutations.
//!
//! Policy lives here, persistence in [`Storage`]: the queue decides what
//! happens to rows that no longer decode, while the storage layer owns the
//! serialization point (redb's single writer) and durability (commit before
//! `enqueue` returns). No retry bound is enforced at this level; retry
//! policy belongs to the sync engine.

use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::storage::Storage;
use crate::types::{ActionId, ActionKind, QueuedAction};

/// Append-only persisted queue of pending mutating operations
#[derive(Clone)]
pub struct ActionQueue {
    storage: Storage,
}

impl ActionQueue {
    /// Create a queue over the given storage
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Append an action with a fresh monotonic id and `attempts = 0`.
    ///
    /// Durably persisted before returning: a crash immediately after this
    /// call cannot lose the action.
    pub fn enqueue(&self, kind: ActionKind) -> SyncResult<QueuedAction> {
        let action = self.storage.append_action(kind)?;
        Ok(action)
    }

    /// Current queue contents in FIFO (enqueue) order.
    ///
    /// Well-formed rows are returned untouched. A row that no longer decodes
    /// (unknown kind written by another build, truncated value) can never be
    /// replayed and would block the queue forever, so it is dropped here with
    /// a diagnostic, the same way a server-side permanent rejection is.
    pub fn peek_all(&self) -> SyncResult<Vec<QueuedAction>> {
        let rows = self.storage.load_actions_raw()?;
        let mut actions = Vec::with_capacity(rows.len());
        for (id, bytes) in rows {
            match serde_json::from_slice::<QueuedAction>(&bytes) {
                Ok(action) => actions.push(action),
                Err(e) => {
                    warn!(
                        action_id = id,
                        error = %e,
                        "dropping undecodable queued action"
                    );
                    self.storage.remove_action(ActionId(id))?;
                }
            }
        }
        Ok(actions)
    }

    /// Delete one entry by id after a successful replay.
    /// Returns whether the entry existed.
    pub fn remove(&self, id: ActionId) -> SyncResult<bool> {
        self.storage.remove_action(id)
    }

    /// Bump the attempt counter of one entry after a failed replay.
    pub fn increment_attempts(&self, id: ActionId) -> SyncResult<()> {
        let rows = self.storage.load_actions_raw()?;
        let Some((_, bytes)) = rows.into_iter().find(|(row_id, _)| *row_id == id.as_u64())
        else {
            return Ok(());
        };
        let mut action: QueuedAction = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::StorageCorruption(e.to_string()))?;
        action.attempts += 1;
        self.storage.store_action(&action)
    }

    /// Number of pending actions
    pub fn len(&self) -> SyncResult<usize> {
        Ok(self.storage.action_count()? as usize)
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.storage.action_count()? == 0)
    }

    /// Drop every pending action
    pub fn clear(&self) -> SyncResult<()> {
        self.storage.clear_actions()
    }
}
