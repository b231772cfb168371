//! HTTP surface for the support agent.
//!
//! - `POST /v1/turn`          — process one conversation turn, returns the envelope
//! - `POST /v1/session/reset` — clear a customer's conversation history
//! - `GET  /health`           — readiness, degraded when a store is empty
//!
//! The requesting `customer_id` arrives in the body; this service trusts
//! the fronting auth layer to have established it. Sessions are keyed by
//! customer and created on first turn.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use helpline_agent::{Envelope, ToolRouter};
use helpline_core::{CustomerId, Session};
use helpline_store::{CatalogStore, OrderLedger};

/// Sessions are held behind per-customer locks: the map lock is only
/// taken long enough to fetch or insert an entry, so one customer's
/// slow oracle round-trip never stalls another customer's turn.
/// Overlapping requests for the same customer still serialize on the
/// session lock and observe each other's history.
type SessionTable = Arc<Mutex<HashMap<CustomerId, Arc<Mutex<Session>>>>>;

#[derive(Clone)]
pub struct AppState {
    router: Arc<ToolRouter>,
    catalog: Arc<CatalogStore>,
    ledger: Arc<OrderLedger>,
    sessions: SessionTable,
}

impl AppState {
    pub fn new(
        router: Arc<ToolRouter>,
        catalog: Arc<CatalogStore>,
        ledger: Arc<OrderLedger>,
    ) -> Self {
        Self { router, catalog, ledger, sessions: Arc::new(Mutex::new(HashMap::new())) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/turn", post(turn))
        .route("/v1/session/reset", post(reset))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub customer_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub customer_id: String,
}

pub async fn turn(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Json<Envelope> {
    let customer = CustomerId(request.customer_id);
    info!(event_name = "agent.turn.received", customer_id = %customer.0, "processing turn");

    let session = {
        let mut sessions = state.sessions.lock().await;
        sessions
            .entry(customer.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(customer.clone()))))
            .clone()
    };
    let mut session = session.lock().await;
    let envelope = state.router.process_turn(&mut session, &request.text).await;
    Json(envelope)
}

pub async fn reset(State(state): State<AppState>, Json(request): Json<ResetRequest>) -> StatusCode {
    let customer = CustomerId(request.customer_id);
    let session = {
        let sessions = state.sessions.lock().await;
        sessions.get(&customer).cloned()
    };
    if let Some(session) = session {
        let mut session = session.lock().await;
        state.router.reset_session(&mut session);
    }
    info!(event_name = "agent.session.reset", customer_id = %customer.0, "session reset");
    StatusCode::NO_CONTENT
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog: HealthCheck,
    pub ledger: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = store_check(!state.catalog.is_empty(), state.catalog.len(), "catalog");
    let ledger_ready = !state.ledger.is_empty().await;
    let ledger = store_check(ledger_ready, usize::from(ledger_ready), "ledger");

    let ready = catalog.status == "ready" && ledger.status == "ready";
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        catalog,
        ledger,
        checked_at: Utc::now().to_rfc3339(),
    };
    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn store_check(ready: bool, records: usize, name: &str) -> HealthCheck {
    if ready {
        HealthCheck { status: "ready", detail: format!("{name} loaded ({records} record(s))") }
    } else {
        HealthCheck { status: "degraded", detail: format!("{name} is empty or failed to load") }
    }
}
