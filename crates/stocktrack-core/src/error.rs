//! Error types for the StockTrack sync core

use thiserror::Error;

/// Main error type for sync core operations
///
/// The first four variants are the gateway's call-outcome taxonomy; callers
/// branch on them to decide between queueing (`Offline`/`Transport`),
/// forcing re-login (`Unauthorized`), and surfacing a final rejection
/// (`Server`). The remaining variants cover persistence and decoding.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No connection available; the call was never attempted
    #[error("offline: no network connection")]
    Offline,

    /// The call was attempted but no usable response arrived
    /// (timeout, connection refused, DNS failure)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server rejected the session credential (HTTP 401)
    #[error("unauthorized: session rejected, re-login required")]
    Unauthorized,

    /// The server answered with a logical rejection (4xx/5xx other than 401)
    #[error("server rejected request ({status}): {message}")]
    Server { status: u16, message: String },

    /// A persisted record could not be decoded
    #[error("persisted record unreadable: {0}")]
    StorageCorruption(String),

    /// Database creation/opening error
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered 2xx but the body had an unexpected shape
    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

impl SyncError {
    /// Whether this error is a connectivity failure that callers recover
    /// from by queueing the mutation for later replay.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Offline | SyncError::Transport(_))
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Server {
            status: 422,
            message: "Insufficient stock".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "server rejected request (422): Insufficient stock"
        );
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(SyncError::Offline.is_connectivity());
        assert!(SyncError::Transport("timed out".to_string()).is_connectivity());
        assert!(!SyncError::Unauthorized.is_connectivity());
        assert!(!SyncError::Server {
            status: 500,
            message: "boom".to_string()
        }
        .is_connectivity());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sync_err: SyncError = io_err.into();
        assert!(matches!(sync_err, SyncError::Io(_)));
    }
}
