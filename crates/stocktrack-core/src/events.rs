//! Sync event types and status tracking.
//!
//! The engine broadcasts [`SyncEvent`]s so callers (screens, CLI) can render
//! sync activity without polling, and tracks a [`SyncStatus`] that moves
//! `Idle -> Draining -> Idle` per drain cycle.

use std::fmt;

use crate::types::ActionId;

/// Status of the sync engine's drain cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No drain in progress
    #[default]
    Idle,
    /// A drain is replaying queued actions
    Draining,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "Idle"),
            SyncStatus::Draining => write!(f, "Draining"),
        }
    }
}

/// Why a drain stopped before reaching the end of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Connectivity was lost before the action could be attempted
    Offline,
    /// The action was attempted but no response arrived
    Transport,
    /// The server rejected the session; re-login required
    Unauthorized,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Offline => write!(f, "offline"),
            HaltReason::Transport => write!(f, "transport failure"),
            HaltReason::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// Events emitted by the sync engine
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A mutating operation was recorded for later replay
    ActionQueued {
        id: ActionId,
        kind: &'static str,
    },
    /// A queued action was replayed successfully and removed
    ActionReplayed {
        id: ActionId,
        kind: &'static str,
    },
    /// A queued action was permanently rejected and dropped
    ActionDropped {
        id: ActionId,
        kind: &'static str,
        reason: String,
    },
    /// A drain walked the whole queue without a blocking failure
    DrainCompleted {
        replayed: usize,
        remaining: usize,
    },
    /// A drain stopped early; the remaining actions stay queued in order
    DrainHalted {
        reason: HaltReason,
        remaining: usize,
    },
    /// The session was rejected by the server; the user must log in again
    ReauthRequired,
    /// The engine moved between Idle and Draining
    StatusChanged(SyncStatus),
    /// Reachability changed
    ConnectivityChanged {
        online: bool,
    },
}
