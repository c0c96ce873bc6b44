//! Sync engine: orchestrates the offline queue against the remote API.
//!
//! The engine owns the drain cycle. On every trigger (connectivity
//! recovery, app start, explicit login, manual request) it walks the queue
//! in FIFO order through the dispatcher and applies the per-action outcome
//! policy:
//!
//! - success: the action is removed
//! - connectivity failure: the drain halts; everything still queued stays
//!   queued in order, since later actions may depend on earlier ones
//! - server rejection: the action is dropped with a diagnostic, so one bad
//!   payload cannot block the queue forever
//! - unauthorized: the drain halts with the queue untouched and re-login is
//!   surfaced
//!
//! Re-entrant drains are coalesced: a trigger while a drain is in flight is
//! a no-op, which keeps each queued action from replaying twice.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::events::{HaltReason, SyncEvent, SyncStatus};
use crate::gateway::{ActionDispatcher, ApiGateway};
use crate::queue::ActionQueue;
use crate::session::{Session, SessionStore};
use crate::storage::Storage;
use crate::types::{ActionId, ActionKind, QueuedAction};

/// Default capacity for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of attempting a mutating operation through
/// [`SyncEngine::attempt_or_queue`]
#[derive(Debug, Clone)]
pub enum Attempt {
    /// The call reached the server and succeeded; the response body is
    /// passed through
    Completed(Value),
    /// Connectivity prevented the call; the operation was durably recorded
    /// for later replay
    Queued(QueuedAction),
}

/// What a drain trigger resulted in
#[derive(Debug, Clone)]
pub enum DrainOutcome {
    /// A drain cycle ran; see the report for what happened per action
    Completed(DrainReport),
    /// Another drain was already in flight; this trigger was coalesced
    AlreadyDraining,
    /// The monitor reported offline, so no cycle was started
    Offline,
}

/// Per-cycle account of what a drain did
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Actions replayed successfully, in replay (= enqueue) order
    pub replayed: Vec<ActionId>,
    /// Actions dropped on a permanent server rejection, with the rejection
    /// message
    pub dropped: Vec<(ActionId, String)>,
    /// Why the drain stopped early, if it did
    pub halted: Option<HaltReason>,
    /// Actions still queued when the cycle ended
    pub remaining: usize,
}

/// Orchestrator for offline-resilient synchronization
///
/// Generic over the [`ActionDispatcher`] seam so drain policy can be tested
/// against a scripted dispatcher; production code uses the default
/// [`ApiGateway`].
pub struct SyncEngine<D: ActionDispatcher = ApiGateway> {
    queue: ActionQueue,
    session: SessionStore,
    connectivity: ConnectivityMonitor,
    dispatcher: Arc<D>,
    /// Single-flight gate: holding it is being in the `Draining` state
    drain_gate: Mutex<()>,
    status_tx: watch::Sender<SyncStatus>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine<ApiGateway> {
    /// Create an engine backed by the real API gateway.
    ///
    /// Opens (or creates) the local database, restores any persisted
    /// session, and wires the gateway to the shared session store and
    /// connectivity monitor.
    pub fn new(config: &EngineConfig) -> SyncResult<Self> {
        info!(data_dir = ?config.data_dir, base_url = %config.base_url, "initializing sync engine");

        let storage = Storage::open(config.db_path())?;
        let connectivity = ConnectivityMonitor::default();
        let session = SessionStore::new(storage.clone());
        session.restore();
        let gateway = ApiGateway::new(config, session.clone(), connectivity.clone())?;

        Ok(Self::assemble(
            storage,
            session,
            connectivity,
            Arc::new(gateway),
        ))
    }

    /// The gateway, for read operations and auth flows the engine does not
    /// wrap
    pub fn gateway(&self) -> &ApiGateway {
        self.dispatcher.as_ref()
    }

    /// Log in, establish the session, then drain anything recorded while
    /// offline or logged out.
    pub async fn login(&self, username: &str, password: &str) -> SyncResult<Session> {
        let session = self.gateway().login(username, password).await?;
        if let Err(e) = self.drain().await {
            warn!(error = %e, "post-login drain failed");
        }
        Ok(session)
    }

    /// App-start hook: restore the persisted session and, when online,
    /// drain the queue left over from the previous run.
    pub async fn start(&self) -> SyncResult<Option<Session>> {
        let restored = self.session.restore();
        if restored.is_some() && self.connectivity.is_online() {
            if let Err(e) = self.drain().await {
                warn!(error = %e, "startup drain failed");
            }
        }
        Ok(restored)
    }
}

impl<D: ActionDispatcher> SyncEngine<D> {
    /// Create an engine over an arbitrary dispatcher (used by tests)
    pub fn with_dispatcher(
        storage: Storage,
        connectivity: ConnectivityMonitor,
        dispatcher: Arc<D>,
    ) -> Self {
        let session = SessionStore::new(storage.clone());
        session.restore();
        Self::assemble(storage, session, connectivity, dispatcher)
    }

    fn assemble(
        storage: Storage,
        session: SessionStore,
        connectivity: ConnectivityMonitor,
        dispatcher: Arc<D>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Self {
            queue: ActionQueue::new(storage),
            session,
            connectivity,
            dispatcher,
            drain_gate: Mutex::new(()),
            status_tx,
            event_tx,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Drain Cycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Replay all queued actions in enqueue order.
    ///
    /// Coalesces with any drain already in flight and aborts immediately
    /// when the monitor reports offline. Runs to completion or to the first
    /// blocking failure; there is no external cancellation.
    pub async fn drain(&self) -> SyncResult<DrainOutcome> {
        let _guard = match self.drain_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("drain already in progress, coalescing trigger");
                return Ok(DrainOutcome::AlreadyDraining);
            }
        };

        if !self.connectivity.is_online() {
            debug!("drain skipped: offline");
            return Ok(DrainOutcome::Offline);
        }

        self.set_status(SyncStatus::Draining);
        let result = self.run_drain_cycle().await;
        self.set_status(SyncStatus::Idle);

        let report = result?;
        match report.halted {
            Some(reason) => self.emit(SyncEvent::DrainHalted {
                reason,
                remaining: report.remaining,
            }),
            None => self.emit(SyncEvent::DrainCompleted {
                replayed: report.replayed.len(),
                remaining: report.remaining,
            }),
        }
        Ok(DrainOutcome::Completed(report))
    }

    async fn run_drain_cycle(&self) -> SyncResult<DrainReport> {
        let pending = self.queue.peek_all()?;
        if !pending.is_empty() {
            info!(pending = pending.len(), "draining offline action queue");
        }

        let mut report = DrainReport::default();

        for action in pending {
            let kind = action.kind.name();
            match self.dispatcher.dispatch(&action.kind).await {
                Ok(_) => {
                    self.queue.remove(action.id)?;
                    debug!(id = %action.id, kind, "replayed queued action");
                    self.emit(SyncEvent::ActionReplayed {
                        id: action.id,
                        kind,
                    });
                    report.replayed.push(action.id);
                }
                Err(SyncError::InvalidResponse(detail)) => {
                    // 2xx reached the server; only the body was unreadable.
                    // Keeping the action queued would replay the mutation.
                    self.queue.remove(action.id)?;
                    warn!(id = %action.id, kind, %detail, "replay applied, response unreadable");
                    self.emit(SyncEvent::ActionReplayed {
                        id: action.id,
                        kind,
                    });
                    report.replayed.push(action.id);
                }
                Err(SyncError::Server { status, message }) => {
                    self.queue.remove(action.id)?;
                    warn!(
                        id = %action.id,
                        kind,
                        status,
                        %message,
                        "queued action permanently rejected, dropping"
                    );
                    self.emit(SyncEvent::ActionDropped {
                        id: action.id,
                        kind,
                        reason: message.clone(),
                    });
                    report.dropped.push((action.id, message));
                }
                Err(SyncError::Unauthorized) => {
                    warn!(id = %action.id, kind, "session rejected during drain, halting");
                    self.emit(SyncEvent::ReauthRequired);
                    report.halted = Some(HaltReason::Unauthorized);
                    break;
                }
                Err(e) if e.is_connectivity() => {
                    self.queue.increment_attempts(action.id)?;
                    let reason = if matches!(e, SyncError::Offline) {
                        HaltReason::Offline
                    } else {
                        HaltReason::Transport
                    };
                    warn!(id = %action.id, kind, error = %e, "connectivity failure, halting drain");
                    report.halted = Some(reason);
                    break;
                }
                Err(e) => {
                    warn!(id = %action.id, kind, error = %e, "unexpected dispatch error, halting drain");
                    report.halted = Some(HaltReason::Transport);
                    break;
                }
            }
        }

        report.remaining = self.queue.len()?;
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutations
    // ═══════════════════════════════════════════════════════════════════════

    /// Attempt a mutating operation now, or durably queue it when
    /// connectivity prevents it.
    ///
    /// Server rejections and authorization failures are surfaced to the
    /// caller unqueued; they are logical outcomes, not connectivity ones.
    pub async fn attempt_or_queue(&self, kind: ActionKind) -> SyncResult<Attempt> {
        if !self.connectivity.is_online() {
            info!(kind = kind.name(), "offline, recording action for later replay");
            return Ok(Attempt::Queued(self.enqueue(kind)?));
        }

        match self.dispatcher.dispatch(&kind).await {
            Ok(value) => Ok(Attempt::Completed(value)),
            Err(e) if e.is_connectivity() => {
                info!(kind = kind.name(), error = %e, "call failed on connectivity, queueing");
                Ok(Attempt::Queued(self.enqueue(kind)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Durably record a mutating operation for later replay
    pub fn enqueue(&self, kind: ActionKind) -> SyncResult<QueuedAction> {
        let action = self.queue.enqueue(kind)?;
        self.emit(SyncEvent::ActionQueued {
            id: action.id,
            kind: action.kind.name(),
        });
        Ok(action)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Triggers & Observers
    // ═══════════════════════════════════════════════════════════════════════

    /// Spawn the background task that drains the queue whenever the monitor
    /// reports an offline-to-online transition. This is the only automatic
    /// drain trigger.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *rx.borrow();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                engine.emit(SyncEvent::ConnectivityChanged { online });
                if online && !was_online {
                    info!("connectivity restored, draining offline queue");
                    if let Err(e) = engine.drain().await {
                        warn!(error = %e, "auto drain failed");
                    }
                }
                was_online = online;
            }
        })
    }

    /// Subscribe to sync events. Multiple subscribers can exist; events are
    /// broadcast to all.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Current drain-cycle status
    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// The currently active session, if any
    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    /// Clear the session; queued actions are retained for the next login
    pub fn logout(&self) -> SyncResult<()> {
        info!("logging out, clearing session");
        self.session.clear()
    }

    /// Number of actions waiting for replay
    pub fn pending_count(&self) -> SyncResult<usize> {
        self.queue.len()
    }

    /// Snapshot of the pending actions in FIFO order
    pub fn pending_actions(&self) -> SyncResult<Vec<QueuedAction>> {
        self.queue.peek_all()
    }

    /// The connectivity monitor, for hosts pushing reachability updates
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// The underlying queue, for maintenance callers
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    fn set_status(&self, status: SyncStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
        if changed {
            self.emit(SyncEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }
}
