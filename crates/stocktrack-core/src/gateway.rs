//! Authenticated API gateway: the single chokepoint for remote calls.
//!
//! Every outbound request goes through [`ApiGateway::request`], which
//! enforces the call preconditions in order (fresh connectivity check, then
//! bearer credential) and classifies the outcome into the error taxonomy:
//!
//! - offline pre-check fails -> [`SyncError::Offline`], no network attempt
//! - attempted but no response -> [`SyncError::Transport`]
//! - HTTP 401 -> session torn down, [`SyncError::Unauthorized`]
//! - any other non-2xx -> [`SyncError::Server`] (logical rejection)
//!
//! Callers queue mutations on connectivity failures, force re-login on
//! `Unauthorized`, and surface `Server` rejections as final.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::session::{Session, SessionStore};
use crate::types::{
    ActionKind, NewProduct, Product, ProductType, Sale, SaleRequest, StockAdjustment, User,
};

/// Remote API paths, mirroring the service's route table
pub mod endpoints {
    pub const LOGIN: &str = "/api/user/login";
    pub const REGISTER: &str = "/api/user/register";
    pub const CHANGE_PASSWORD: &str = "/api/user/change-password";
    pub const PRODUCTS: &str = "/api/products";
    pub const PRODUCT_TYPES: &str = "/api/product-types";
    pub const SELL_PRODUCT: &str = "/api/employee/sell-product";
    pub const MY_SALES: &str = "/api/employee/my-sales";
    pub const PENDING_SALES: &str = "/api/admin/pending-sales";
    pub const REPORTS: &str = "/api/reports";

    pub fn product(id: i64) -> String {
        format!("{PRODUCTS}/{id}")
    }

    pub fn product_stock(id: i64) -> String {
        format!("{PRODUCTS}/{id}/stock")
    }

    pub fn approve_sale(id: i64) -> String {
        format!("/api/admin/approve-sale/{id}")
    }

    pub fn user(id: i64) -> String {
        format!("/api/user/{id}")
    }
}

/// Seam between the sync engine and the remote service.
///
/// The production implementation is [`ApiGateway`]; tests drive the engine
/// with a scripted dispatcher instead of a live server.
#[async_trait]
pub trait ActionDispatcher: Send + Sync + 'static {
    /// Replay one queued action against its endpoint
    async fn dispatch(&self, kind: &ActionKind) -> SyncResult<Value>;
}

/// Gateway wrapping all calls to the remote StockTrack API
#[derive(Clone)]
pub struct ApiGateway {
    http: Client,
    base_url: String,
    session: SessionStore,
    connectivity: ConnectivityMonitor,
}

impl ApiGateway {
    /// Build a gateway with a bounded-timeout HTTP client
    pub fn new(
        config: &EngineConfig,
        session: SessionStore,
        connectivity: ConnectivityMonitor,
    ) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
            connectivity,
        })
    }

    /// Perform one classified call against the remote API.
    ///
    /// Preconditions are checked in order: a fresh connectivity read (offline
    /// means no network attempt at all), then bearer-token attachment when a
    /// session exists. Returns the parsed JSON body (`Null` for empty
    /// bodies).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> SyncResult<Value> {
        if !self.connectivity.is_online() {
            debug!(%path, "skipping call: offline");
            return Err(SyncError::Offline);
        }

        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(query) = query {
            req = req.query(query);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(%method, %path, "session rejected by server, clearing");
            if let Err(e) = self.session.clear() {
                warn!(error = %e, "failed to clear rejected session");
            }
            return Err(SyncError::Unauthorized);
        }

        let text = resp
            .text()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SyncError::Server {
                status: status.as_u16(),
                message: rejection_message(&text),
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| SyncError::InvalidResponse(e.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Auth Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Log in and establish the session from the `{ token, data: { user } }`
    /// response.
    pub async fn login(&self, username: &str, password: &str) -> SyncResult<Session> {
        let body = json!({ "username": username, "password": password });
        let resp = self
            .request(Method::POST, endpoints::LOGIN, Some(&body), None)
            .await?;

        let token = resp["token"]
            .as_str()
            .ok_or_else(|| SyncError::InvalidResponse("login response missing token".into()))?
            .to_string();
        let user: User = serde_json::from_value(resp["data"]["user"].clone())
            .map_err(|e| SyncError::InvalidResponse(format!("login response user: {e}")))?;

        let session = Session::new(user, token);
        self.session.establish(session.clone())?;
        Ok(session)
    }

    /// Register a new account. Does not establish a session.
    pub async fn register(&self, registration: &Value) -> SyncResult<Value> {
        self.request(Method::POST, endpoints::REGISTER, Some(registration), None)
            .await
    }

    /// Change the current user's password
    pub async fn change_password(&self, current: &str, new: &str) -> SyncResult<Value> {
        let body = json!({ "currentPassword": current, "newPassword": new });
        self.request(Method::POST, endpoints::CHANGE_PASSWORD, Some(&body), None)
            .await
    }

    /// Update the current user's profile and re-persist the returned
    /// identity into the session.
    pub async fn update_profile(&self, profile: &Value) -> SyncResult<User> {
        let user_id = self
            .session
            .current()
            .map(|s| s.user.id)
            .ok_or(SyncError::Unauthorized)?;
        let resp = self
            .request(Method::PUT, &endpoints::user(user_id), Some(profile), None)
            .await?;
        let user: User = serde_json::from_value(resp["data"].clone())
            .map_err(|e| SyncError::InvalidResponse(format!("profile response: {e}")))?;
        self.session.update_user(user.clone())?;
        Ok(user)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Read Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// List products, optionally filtered by a search term
    pub async fn fetch_products(&self, search: Option<&str>) -> SyncResult<Vec<Product>> {
        let query: Vec<(&str, &str)> = search.map(|s| ("search", s)).into_iter().collect();
        let resp = self
            .request(
                Method::GET,
                endpoints::PRODUCTS,
                None,
                if query.is_empty() { None } else { Some(&query) },
            )
            .await?;
        parse_data(resp, "products")
    }

    /// Fetch one product by id
    pub async fn fetch_product(&self, id: i64) -> SyncResult<Product> {
        let resp = self
            .request(Method::GET, &endpoints::product(id), None, None)
            .await?;
        parse_data(resp, "product")
    }

    /// List product categories
    pub async fn fetch_product_types(&self) -> SyncResult<Vec<ProductType>> {
        let resp = self
            .request(Method::GET, endpoints::PRODUCT_TYPES, None, None)
            .await?;
        parse_data(resp, "product types")
    }

    /// List the current employee's sales
    pub async fn my_sales(&self) -> SyncResult<Vec<Sale>> {
        let resp = self
            .request(Method::GET, endpoints::MY_SALES, None, None)
            .await?;
        parse_data(resp, "sales")
    }

    /// List sales awaiting admin approval
    pub async fn pending_sales(&self) -> SyncResult<Vec<Sale>> {
        let resp = self
            .request(Method::GET, endpoints::PENDING_SALES, None, None)
            .await?;
        parse_data(resp, "pending sales")
    }

    /// Fetch a report by name, passed through as raw JSON
    pub async fn fetch_report(&self, name: &str) -> SyncResult<Value> {
        let path = format!("{}/{}", endpoints::REPORTS, name);
        self.request(Method::GET, &path, None, None).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutating Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a product
    pub async fn create_product(&self, product: &NewProduct) -> SyncResult<Value> {
        let body = serde_json::to_value(product)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        self.request(Method::POST, endpoints::PRODUCTS, Some(&body), None)
            .await
    }

    /// Adjust a product's stock level
    pub async fn update_stock(&self, adjustment: &StockAdjustment) -> SyncResult<Value> {
        let body = serde_json::to_value(adjustment)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        self.request(
            Method::POST,
            &endpoints::product_stock(adjustment.product_id),
            Some(&body),
            None,
        )
        .await
    }

    /// Record a sale
    pub async fn record_sale(&self, sale: &SaleRequest) -> SyncResult<Value> {
        let body =
            serde_json::to_value(sale).map_err(|e| SyncError::Serialization(e.to_string()))?;
        self.request(Method::POST, endpoints::SELL_PRODUCT, Some(&body), None)
            .await
    }

    /// Approve a pending sale (admin). Never queued offline; a failed
    /// approval is surfaced to the caller directly.
    pub async fn approve_sale(&self, sale_id: i64) -> SyncResult<Value> {
        self.request(Method::POST, &endpoints::approve_sale(sale_id), None, None)
            .await
    }
}

#[async_trait]
impl ActionDispatcher for ApiGateway {
    async fn dispatch(&self, kind: &ActionKind) -> SyncResult<Value> {
        match kind {
            ActionKind::CreateProduct(product) => self.create_product(product).await,
            ActionKind::UpdateStock(adjustment) => self.update_stock(adjustment).await,
            ActionKind::RecordSale(sale) => self.record_sale(sale).await,
        }
    }
}

/// Pull the `data` envelope out of a 2xx body and deserialize it
fn parse_data<T: serde::de::DeserializeOwned>(resp: Value, what: &str) -> SyncResult<T> {
    let data = resp
        .get("data")
        .cloned()
        .ok_or_else(|| SyncError::InvalidResponse(format!("{what} response missing data")))?;
    serde_json::from_value(data)
        .map_err(|e| SyncError::InvalidResponse(format!("{what} response: {e}")))
}

/// Best-effort human message from an error body: the API's
/// `{"message": ...}` envelope when present, else the raw body.
fn rejection_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    if body.is_empty() {
        "request rejected".to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(endpoints::product_stock(7), "/api/products/7/stock");
        assert_eq!(endpoints::approve_sale(3), "/api/admin/approve-sale/3");
        assert_eq!(endpoints::user(12), "/api/user/12");
        assert_eq!(endpoints::product(5), "/api/products/5");
    }

    #[test]
    fn test_rejection_message_prefers_envelope() {
        assert_eq!(
            rejection_message(r#"{"message":"Insufficient stock"}"#),
            "Insufficient stock"
        );
        assert_eq!(rejection_message("plain text error"), "plain text error");
        assert_eq!(rejection_message(""), "request rejected");
    }

    #[test]
    fn test_parse_data_missing_envelope() {
        let err = parse_data::<Vec<Product>>(serde_json::json!({}), "products").unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
    }
}
