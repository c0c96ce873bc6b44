//! Session store: the authenticated identity and credential used to
//! authorize remote calls.
//!
//! Exactly one session is active at a time. The store keeps an in-memory
//! copy guarded by a lock so the gateway can attach the bearer token without
//! a storage read, and persists every change through [`Storage`] so the
//! session survives restarts.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::storage::Storage;
use crate::types::User;

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated user
    pub user: User,
    /// Bearer token attached to protected calls
    pub token: String,
    /// Unix timestamp of when the session was established
    pub issued_at: i64,
}

impl Session {
    /// Create a session issued now
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            user,
            token: token.into(),
            issued_at: Utc::now().timestamp(),
        }
    }
}

/// Store holding the single active session
#[derive(Clone)]
pub struct SessionStore {
    storage: Storage,
    active: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// Create a store over the given storage. The in-memory slot starts
    /// empty; call [`restore`](Self::restore) to load a persisted session.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Load the persisted session and make it active.
    ///
    /// Fails silently: a missing record returns `None`; an unreadable record
    /// is discarded with a warning and also returns `None`. Session restore
    /// must never prevent app start.
    pub fn restore(&self) -> Option<Session> {
        match self.storage.load_session() {
            Ok(Some(session)) => {
                info!(user = %session.user.username, "restored persisted session");
                *self.active.write() = Some(session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted session");
                let _ = self.storage.delete_session();
                *self.active.write() = None;
                None
            }
        }
    }

    /// Persist the session and make it active, replacing any prior session.
    pub fn establish(&self, session: Session) -> SyncResult<()> {
        self.storage.save_session(&session)?;
        *self.active.write() = Some(session);
        Ok(())
    }

    /// Remove the persisted session; subsequent `restore()` returns `None`.
    pub fn clear(&self) -> SyncResult<()> {
        self.storage.delete_session()?;
        *self.active.write() = None;
        Ok(())
    }

    /// The currently active session, if any
    pub fn current(&self) -> Option<Session> {
        self.active.read().clone()
    }

    /// The active bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.active.read().as_ref().map(|s| s.token.clone())
    }

    /// A non-empty token implies authenticated
    pub fn is_authenticated(&self) -> bool {
        self.active.read().is_some()
    }

    /// Replace the user identity inside the active session (profile update),
    /// keeping the token, and re-persist.
    pub fn update_user(&self, user: User) -> SyncResult<()> {
        let updated = {
            let mut guard = self.active.write();
            match guard.as_mut() {
                Some(session) => {
                    session.user = user;
                    Some(session.clone())
                }
                None => None,
            }
        };
        if let Some(session) = updated {
            self.storage.save_session(&session)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SessionStore, Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path().join("test.redb")).unwrap();
        (SessionStore::new(storage.clone()), storage, temp_dir)
    }

    fn test_user(username: &str) -> User {
        User {
            id: 1,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            telephone: None,
            role: "employee".to_string(),
            is_verified: true,
            is_first_login: false,
        }
    }

    #[test]
    fn test_restore_empty_returns_none() {
        let (store, _storage, _temp) = create_test_store();
        assert!(store.restore().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_establish_then_current_and_token() {
        let (store, _storage, _temp) = create_test_store();

        store
            .establish(Session::new(test_user("amara"), "tok-1"))
            .unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        assert_eq!(store.current().unwrap().user.username, "amara");
    }

    #[test]
    fn test_establish_overwrites_prior_session() {
        let (store, _storage, _temp) = create_test_store();

        store
            .establish(Session::new(test_user("first"), "tok-1"))
            .unwrap();
        store
            .establish(Session::new(test_user("second"), "tok-2"))
            .unwrap();

        assert_eq!(store.current().unwrap().user.username, "second");
        assert_eq!(store.restore().unwrap().token, "tok-2");
    }

    #[test]
    fn test_clear_removes_session() {
        let (store, _storage, _temp) = create_test_store();

        store
            .establish(Session::new(test_user("amara"), "tok"))
            .unwrap();
        store.clear().unwrap();

        assert!(store.current().is_none());
        assert!(store.restore().is_none());
    }

    #[test]
    fn test_session_survives_new_store_instance() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");

        {
            let storage = Storage::open(&db_path).unwrap();
            let store = SessionStore::new(storage);
            store
                .establish(Session::new(test_user("amara"), "tok"))
                .unwrap();
        }

        {
            let storage = Storage::open(&db_path).unwrap();
            let store = SessionStore::new(storage);
            // Not yet restored
            assert!(store.current().is_none());
            let restored = store.restore().unwrap();
            assert_eq!(restored.token, "tok");
            assert!(store.is_authenticated());
        }
    }

    #[test]
    fn test_update_user_keeps_token() {
        let (store, _storage, _temp) = create_test_store();

        store
            .establish(Session::new(test_user("amara"), "tok"))
            .unwrap();

        let mut renamed = test_user("amara");
        renamed.first_name = "Renamed".to_string();
        store.update_user(renamed).unwrap();

        let current = store.current().unwrap();
        assert_eq!(current.user.first_name, "Renamed");
        assert_eq!(current.token, "tok");

        // Persisted too
        assert_eq!(store.restore().unwrap().user.first_name, "Renamed");
    }

    #[test]
    fn test_update_user_without_session_is_noop() {
        let (store, _storage, _temp) = create_test_store();
        store.update_user(test_user("ghost")).unwrap();
        assert!(store.current().is_none());
    }
}
