//! Core types for the StockTrack sync core

use serde::{Deserialize, Serialize};

/// Products at or below this quantity are considered low on stock
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Unique identifier for a queued action
///
/// Ids are monotonic `u64`s assigned under the queue's write transaction,
/// so ascending id order is exactly enqueue order (FIFO).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ActionId(pub u64);

impl ActionId {
    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action_{}", self.0)
    }
}

/// A mutating operation, tagged with its payload
///
/// Wire shape matches what the remote API expects per endpoint and what the
/// queue persists: `{"kind": "CREATE_PRODUCT", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Create a new product (`POST /api/products`)
    CreateProduct(NewProduct),
    /// Adjust a product's stock level (`POST /api/products/{id}/stock`)
    UpdateStock(StockAdjustment),
    /// Record a sale (`POST /api/employee/sell-product`)
    RecordSale(SaleRequest),
}

impl ActionKind {
    /// Short name used in logs and events
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::CreateProduct(_) => "CREATE_PRODUCT",
            ActionKind::UpdateStock(_) => "UPDATE_STOCK",
            ActionKind::RecordSale(_) => "RECORD_SALE",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A durably persisted record of a mutating operation that could not be
/// completed immediately
///
/// Created when a mutating call fails due to connectivity; removed after a
/// successful replay; retained with an incremented `attempts` counter when a
/// replay attempt fails on transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Unique monotonic id, doubles as the FIFO sort key
    pub id: ActionId,
    /// The operation and its payload
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Unix timestamp of when the action was enqueued
    pub enqueued_at: i64,
    /// Number of failed replay attempts so far
    pub attempts: u32,
}

/// Payload for creating a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    pub quantity: i64,
    pub product_type_id: i64,
}

/// Direction of a stock adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl std::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockDirection::In => f.write_str("in"),
            StockDirection::Out => f.write_str("out"),
        }
    }
}

/// Payload for adjusting a product's stock level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product_id: i64,
    #[serde(rename = "type")]
    pub direction: StockDirection,
    pub quantity: i64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
}

/// Payload for recording a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub product_id: i64,
    pub qty_sold: i64,
}

/// Authenticated user identity as returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub telephone: Option<String>,
    pub role: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_first_login: bool,
}

/// Product as fetched from the remote service
///
/// The core does not own product state; this is read-through data for
/// callers. Only the pending mutation log is owned locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub product_type_id: Option<i64>,
}

impl Product {
    /// Whether the product is at or below the low-stock threshold
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= LOW_STOCK_THRESHOLD
    }
}

/// Product category as fetched from the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    pub id: i64,
    pub name: String,
}

/// Sale record as fetched from the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    pub product_id: i64,
    pub qty_sold: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}
