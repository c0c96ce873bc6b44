//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout. The transport must have a bounded timeout;
/// a hung call would otherwise pin the drain cycle forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Database file name inside the data directory
const DB_FILE: &str = "stocktrack.redb";

/// Configuration for [`SyncEngine`](crate::SyncEngine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the local database
    pub data_dir: PathBuf,
    /// Base URL of the remote StockTrack API, without trailing slash
    pub base_url: String,
    /// Per-request transport timeout
    #[serde(default = "default_timeout")]
    pub request_timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl EngineConfig {
    /// Create a config with the default request timeout
    pub fn new(data_dir: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Path of the redb database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}
