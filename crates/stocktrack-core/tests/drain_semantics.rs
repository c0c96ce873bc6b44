//! Drain-policy integration tests.
//!
//! The engine is driven against a scripted dispatcher so every per-action
//! outcome (success, transport failure, server rejection, auth rejection)
//! can be forced deterministically, without a network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use stocktrack_core::{
    ActionDispatcher, ActionId, ActionKind, Attempt, ConnectivityMonitor, DrainOutcome,
    HaltReason, NewProduct, SaleRequest, StockAdjustment, StockDirection, SyncEngine, SyncError,
    SyncEvent, SyncResult, Storage,
};

/// One scripted call outcome
#[derive(Debug, Clone)]
enum Outcome {
    Accept,
    Transport,
    Offline,
    Unauthorized,
    Server(u16, &'static str),
}

/// Dispatcher that pops one scripted outcome per call and records what was
/// dispatched. When the script runs dry it accepts everything.
struct ScriptedDispatcher {
    script: Mutex<VecDeque<Outcome>>,
    dispatched: Mutex<Vec<ActionKind>>,
    delay: Option<Duration>,
}

impl ScriptedDispatcher {
    fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            dispatched: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            dispatched: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    fn dispatched(&self) -> Vec<ActionKind> {
        self.dispatched.lock().clone()
    }
}

#[async_trait]
impl ActionDispatcher for ScriptedDispatcher {
    async fn dispatch(&self, kind: &ActionKind) -> SyncResult<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.dispatched.lock().push(kind.clone());
        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Accept);
        match outcome {
            Outcome::Accept => Ok(json!({ "data": {} })),
            Outcome::Transport => Err(SyncError::Transport("connection reset".into())),
            Outcome::Offline => Err(SyncError::Offline),
            Outcome::Unauthorized => Err(SyncError::Unauthorized),
            Outcome::Server(status, message) => Err(SyncError::Server {
                status,
                message: message.to_string(),
            }),
        }
    }
}

fn create_product(name: &str) -> ActionKind {
    ActionKind::CreateProduct(NewProduct {
        name: name.to_string(),
        description: None,
        price: 4.0,
        quantity: 20,
        product_type_id: 1,
    })
}

fn update_stock(product_id: i64) -> ActionKind {
    ActionKind::UpdateStock(StockAdjustment {
        product_id,
        direction: StockDirection::Out,
        quantity: 2,
        reason: "sold on floor".to_string(),
        cost_price: None,
    })
}

fn record_sale(product_id: i64) -> ActionKind {
    ActionKind::RecordSale(SaleRequest {
        product_id,
        qty_sold: 1,
    })
}

fn engine_with(
    dispatcher: Arc<ScriptedDispatcher>,
    online: bool,
) -> (SyncEngine<ScriptedDispatcher>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::open(temp_dir.path().join("test.redb")).unwrap();
    let engine =
        SyncEngine::with_dispatcher(storage, ConnectivityMonitor::new(online), dispatcher);
    (engine, temp_dir)
}

fn unwrap_report(outcome: DrainOutcome) -> stocktrack_core::DrainReport {
    match outcome {
        DrainOutcome::Completed(report) => report,
        other => panic!("expected a completed drain, got {other:?}"),
    }
}

#[tokio::test]
async fn drain_replays_in_enqueue_order() {
    let dispatcher = ScriptedDispatcher::new(vec![]);
    let (engine, _temp) = engine_with(dispatcher.clone(), true);

    for id in 1..=5 {
        engine.enqueue(record_sale(id)).unwrap();
    }

    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(
        report.replayed,
        (1..=5).map(ActionId).collect::<Vec<_>>()
    );
    assert_eq!(report.remaining, 0);

    let replayed_ids: Vec<i64> = dispatcher
        .dispatched()
        .iter()
        .map(|kind| match kind {
            ActionKind::RecordSale(sale) => sale.product_id,
            other => panic!("unexpected kind: {other:?}"),
        })
        .collect();
    assert_eq!(replayed_ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn queued_actions_survive_restart_and_replay() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.redb");

    // First run: offline, two actions recorded, process "crashes"
    {
        let storage = Storage::open(&db_path).unwrap();
        let engine = SyncEngine::with_dispatcher(
            storage,
            ConnectivityMonitor::new(false),
            ScriptedDispatcher::new(vec![]),
        );
        match engine.attempt_or_queue(record_sale(1)).await.unwrap() {
            Attempt::Queued(action) => assert_eq!(action.id, ActionId(1)),
            Attempt::Completed(_) => panic!("offline attempt must queue"),
        }
        engine.attempt_or_queue(update_stock(2)).await.unwrap();
    }

    // Second run: back online, the persisted queue drains
    {
        let dispatcher = ScriptedDispatcher::new(vec![]);
        let storage = Storage::open(&db_path).unwrap();
        let engine = SyncEngine::with_dispatcher(
            storage,
            ConnectivityMonitor::new(true),
            dispatcher.clone(),
        );

        assert_eq!(engine.pending_count().unwrap(), 2);
        let report = unwrap_report(engine.drain().await.unwrap());
        assert_eq!(report.replayed.len(), 2);
        assert_eq!(engine.pending_count().unwrap(), 0);
        assert_eq!(dispatcher.dispatched().len(), 2);
    }
}

#[tokio::test]
async fn transport_failure_halts_drain_in_place() {
    // Remote accepts A, times out on B, never reaches C.
    let dispatcher = ScriptedDispatcher::new(vec![Outcome::Accept, Outcome::Transport]);
    let (engine, _temp) = engine_with(dispatcher.clone(), true);

    engine.enqueue(create_product("A")).unwrap();
    engine.enqueue(update_stock(2)).unwrap();
    engine.enqueue(record_sale(3)).unwrap();

    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(report.replayed, vec![ActionId(1)]);
    assert_eq!(report.halted, Some(HaltReason::Transport));
    assert_eq!(report.remaining, 2);

    // C was never attempted
    assert_eq!(dispatcher.dispatched().len(), 2);

    // B and C remain, in order; B carries the failed attempt
    let pending = engine.pending_actions().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, ActionId(2));
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[1].id, ActionId(3));
    assert_eq!(pending[1].attempts, 0);

    // Once the outage clears, the rest drains in order
    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(report.replayed, vec![ActionId(2), ActionId(3)]);
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn offline_error_mid_drain_also_halts() {
    let dispatcher = ScriptedDispatcher::new(vec![Outcome::Accept, Outcome::Offline]);
    let (engine, _temp) = engine_with(dispatcher, true);

    engine.enqueue(record_sale(1)).unwrap();
    engine.enqueue(record_sale(2)).unwrap();
    engine.enqueue(record_sale(3)).unwrap();

    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(report.halted, Some(HaltReason::Offline));
    assert_eq!(report.remaining, 2);
}

#[tokio::test]
async fn server_rejection_drops_action_exactly_once() {
    // A sale the remote rejects with a 422 validation error
    let dispatcher =
        ScriptedDispatcher::new(vec![Outcome::Server(422, "Insufficient stock")]);
    let (engine, _temp) = engine_with(dispatcher.clone(), true);
    let mut events = engine.subscribe();

    engine.enqueue(record_sale(9)).unwrap();

    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(report.replayed, Vec::<ActionId>::new());
    assert_eq!(
        report.dropped,
        vec![(ActionId(1), "Insufficient stock".to_string())]
    );
    assert_eq!(report.halted, None);
    assert_eq!(engine.pending_count().unwrap(), 0);

    // A diagnostic was emitted citing the action
    let mut saw_drop = false;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::ActionDropped { id, kind, reason } = event {
            assert_eq!(id, ActionId(1));
            assert_eq!(kind, "RECORD_SALE");
            assert_eq!(reason, "Insufficient stock");
            saw_drop = true;
        }
    }
    assert!(saw_drop, "expected an ActionDropped diagnostic");

    // Never retried: a second drain dispatches nothing new
    unwrap_report(engine.drain().await.unwrap());
    assert_eq!(dispatcher.dispatched().len(), 1);
}

#[tokio::test]
async fn unauthorized_halts_with_queue_untouched() {
    let dispatcher = ScriptedDispatcher::new(vec![Outcome::Unauthorized]);
    let (engine, _temp) = engine_with(dispatcher.clone(), true);
    let mut events = engine.subscribe();

    engine.enqueue(record_sale(1)).unwrap();
    engine.enqueue(record_sale(2)).unwrap();

    let report = unwrap_report(engine.drain().await.unwrap());
    assert_eq!(report.halted, Some(HaltReason::Unauthorized));
    assert_eq!(report.replayed, Vec::<ActionId>::new());
    assert_eq!(report.remaining, 2);

    // Queue untouched: same ids, no attempt bump
    let pending = engine.pending_actions().unwrap();
    assert_eq!(pending[0].attempts, 0);
    assert_eq!(pending[1].attempts, 0);

    // Only the first action was ever attempted
    assert_eq!(dispatcher.dispatched().len(), 1);

    let mut saw_reauth = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SyncEvent::ReauthRequired) {
            saw_reauth = true;
        }
    }
    assert!(saw_reauth, "expected a re-authentication requirement");
}

#[tokio::test]
async fn concurrent_drains_coalesce() {
    let dispatcher = ScriptedDispatcher::with_delay(Duration::from_millis(25));
    let (engine, _temp) = engine_with(dispatcher.clone(), true);
    let engine = Arc::new(engine);

    for id in 1..=3 {
        engine.enqueue(record_sale(id)).unwrap();
    }

    let (a, b) = tokio::join!(engine.drain(), engine.drain());
    let outcomes = [a.unwrap(), b.unwrap()];

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, DrainOutcome::Completed(_)))
        .count();
    let coalesced = outcomes
        .iter()
        .filter(|o| matches!(o, DrainOutcome::AlreadyDraining))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(coalesced, 1);

    // Every action replayed exactly once
    assert_eq!(dispatcher.dispatched().len(), 3);
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn attempt_or_queue_surfaces_server_rejection_unqueued() {
    let dispatcher = ScriptedDispatcher::new(vec![Outcome::Server(400, "bad payload")]);
    let (engine, _temp) = engine_with(dispatcher, true);

    let err = engine
        .attempt_or_queue(record_sale(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Server { status: 400, .. }));
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn attempt_or_queue_queues_on_transport_failure() {
    let dispatcher = ScriptedDispatcher::new(vec![Outcome::Transport]);
    let (engine, _temp) = engine_with(dispatcher, true);

    match engine.attempt_or_queue(update_stock(4)).await.unwrap() {
        Attempt::Queued(action) => assert_eq!(action.kind.name(), "UPDATE_STOCK"),
        Attempt::Completed(_) => panic!("transport failure must queue"),
    }
    assert_eq!(engine.pending_count().unwrap(), 1);
}
