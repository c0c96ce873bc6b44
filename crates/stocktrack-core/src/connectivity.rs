//! Connectivity monitor: the single source of truth for reachability.
//!
//! The host platform pushes transitions in via [`ConnectivityMonitor::set_online`];
//! every gating decision reads the live value through
//! [`ConnectivityMonitor::is_online`] rather than a cached copy. The sync
//! engine consumes [`ConnectivityMonitor::subscribe`] as its drain trigger.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Process-wide reachability state with change notifications
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Current reachability, read fresh from the channel
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Push a state update. Returns `true` if this was a transition
    /// (subscribers are only notified on transitions, not on repeats).
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state != online {
                *state = online;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(online, "connectivity changed");
        }
        changed
    }

    /// Subscribe to transitions. The receiver observes the value as of
    /// subscription time plus every later change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        // Hosts that never report assume reachability, like the original
        // client did; the gateway still fails fast on actual transport errors.
        Self::new(true)
    }
}
