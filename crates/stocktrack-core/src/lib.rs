//! StockTrack Sync Core Library
//!
//! Offline-resilient synchronization core for the StockTrack inventory
//! client.
//!
//! ## Overview
//!
//! Screens and other callers never talk to the network directly. Mutations
//! go through the [`SyncEngine`]: when the device is reachable they execute
//! immediately through the authenticated [`ApiGateway`]; when it is not (or
//! the transport fails mid-call) they are durably recorded in the
//! [`ActionQueue`] and replayed in enqueue order once the
//! [`ConnectivityMonitor`] reports the network back.
//!
//! ## Core Guarantees
//!
//! - **Durable**: a queued action survives a crash the moment `enqueue`
//!   returns
//! - **Ordered**: replay happens in exact enqueue order; a blocking failure
//!   halts the drain rather than skipping ahead
//! - **At-least-once**: actions stay queued until the server accepts or
//!   permanently rejects them
//! - **Session-consistent**: a 401 anywhere tears the session down and
//!   forces re-login; nothing is silently retried with a dead credential
//!
//! ## Quick Start
//!
//! ```ignore
//! use stocktrack_core::{ActionKind, EngineConfig, SaleRequest, SyncEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::new("~/.stocktrack/data", "https://api.example.com");
//!     let engine = Arc::new(SyncEngine::new(&config)?);
//!
//!     // Restore a persisted session and replay anything left queued
//!     engine.start().await?;
//!
//!     // Drain automatically whenever connectivity returns
//!     engine.spawn_auto_sync();
//!
//!     // Record a sale; it completes now or is queued for later
//!     let sale = ActionKind::RecordSale(SaleRequest { product_id: 7, qty_sold: 2 });
//!     engine.attempt_or_queue(sale).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod queue;
pub mod session;
pub mod storage;
pub mod types;

// Re-exports
pub use config::EngineConfig;
pub use connectivity::ConnectivityMonitor;
pub use engine::{Attempt, DrainOutcome, DrainReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use events::{HaltReason, SyncEvent, SyncStatus};
pub use gateway::{ActionDispatcher, ApiGateway};
pub use queue::ActionQueue;
pub use session::{Session, SessionStore};
pub use storage::Storage;
pub use types::*;
