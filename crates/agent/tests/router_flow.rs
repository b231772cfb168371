//! End-to-end router behavior against a scripted oracle: one planned
//! reply per turn, no network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use helpline_agent::{
    standard_registry, CapabilitySpec, Envelope, EnvelopeKind, Oracle, OracleReply, ToolCall,
    ToolRouter,
};
use helpline_core::{CustomerId, Order, Product, Role, Session, Turn};
use helpline_store::{CatalogStore, Embedder, OrderLedger, VectorIndex};

/// Replays a fixed queue of plan verdicts; narration echoes the tool
/// text with a marker so tests can tell the phases apart.
struct ScriptedOracle {
    replies: Mutex<VecDeque<anyhow::Result<OracleReply>>>,
    narration_fails: bool,
}

impl ScriptedOracle {
    fn new(replies: Vec<anyhow::Result<OracleReply>>) -> Self {
        Self { replies: Mutex::new(replies.into()), narration_fails: false }
    }

    fn with_broken_narration(replies: Vec<anyhow::Result<OracleReply>>) -> Self {
        Self { replies: Mutex::new(replies.into()), narration_fails: true }
    }

    fn invoke(name: &str, arguments: serde_json::Value) -> anyhow::Result<OracleReply> {
        Ok(OracleReply::Invoke(ToolCall { name: name.to_string(), arguments }))
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn plan(
        &self,
        _history: &[Turn],
        capabilities: &[CapabilitySpec],
    ) -> anyhow::Result<OracleReply> {
        assert_eq!(capabilities.len(), 9, "every capability should be advertised");
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| panic!("oracle script exhausted"))
    }

    async fn narrate(
        &self,
        _history: &[Turn],
        _call: &ToolCall,
        tool_text: &str,
    ) -> anyhow::Result<String> {
        if self.narration_fails {
            anyhow::bail!("narration endpoint down");
        }
        Ok(format!("[narrated] {tool_text}"))
    }
}

struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

fn router(oracle: ScriptedOracle) -> ToolRouter {
    let products: Vec<Product> = serde_json::from_value(json!([
        {"product_id": "P-1", "product_name": "iPhone 15",
         "category": "Electronics", "description": "flagship phone", "price": 799.00}
    ]))
    .expect("catalog fixture");
    let orders: Vec<Order> = serde_json::from_value(json!([
        {
            "order_id": "A100",
            "customer_id": "C0010",
            "order_status": "Placed",
            "order_date": "2025-11-02",
            "products": [{"product_name": "iPhone 15", "quantity": 1}]
        }
    ]))
    .expect("ledger fixture");
    let records = serde_json::from_value(json!([
        {"document": "Flagship phone.", "embedding": [0.0, 1.0],
         "metadata": {"product_name": "iPhone 15"}}
    ]))
    .expect("index fixture");

    let registry = standard_registry(
        Arc::new(CatalogStore::from_products(products)),
        Arc::new(OrderLedger::in_memory(orders)),
        Arc::new(VectorIndex::empty()),
        Arc::new(VectorIndex::from_records(records)),
        Arc::new(FixedEmbedder(vec![0.0, 1.0])),
        60,
    );
    ToolRouter::new(Arc::new(oracle), registry)
}

fn assert_plain(envelope: &Envelope) {
    assert_eq!(envelope.kind, EnvelopeKind::None);
    assert!(envelope.items.is_empty());
}

#[tokio::test]
async fn conversational_turn_needs_no_tool() {
    let router = router(ScriptedOracle::new(vec![Ok(OracleReply::Say("Hi there!".to_string()))]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    let envelope = router.process_turn(&mut session, "hello").await;
    assert_eq!(envelope.text, "Hi there!");
    assert_plain(&envelope);

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Agent);
}

#[tokio::test]
async fn status_check_produces_an_order_list_envelope() {
    let router = router(ScriptedOracle::new(vec![ScriptedOracle::invoke(
        "check_order_status",
        json!({"order_id": "A100"}),
    )]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    let envelope = router.process_turn(&mut session, "where is order A100?").await;
    assert_eq!(envelope.text, "[narrated] Order A100 is currently 'Placed'.");
    assert_eq!(envelope.kind, EnvelopeKind::OrderList);
    assert_eq!(envelope.items.len(), 1);
    assert_eq!(envelope.items[0]["order_id"], "A100");
}

#[tokio::test]
async fn cancel_flow_updates_state_visible_to_next_turn() {
    let router = router(ScriptedOracle::new(vec![
        ScriptedOracle::invoke("cancel_order", json!({"order_id": "A100"})),
        ScriptedOracle::invoke("check_order_status", json!({"order_id": "A100"})),
    ]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    let first = router.process_turn(&mut session, "cancel order A100").await;
    assert_eq!(first.text, "[narrated] Success. Order A100 has been cancelled.");

    let second = router.process_turn(&mut session, "check A100 again").await;
    assert_eq!(second.text, "[narrated] Order A100 is currently 'Cancelled'.");
}

#[tokio::test]
async fn oracle_failure_becomes_an_apology_envelope() {
    let router =
        router(ScriptedOracle::new(vec![Err(anyhow::anyhow!("classification timed out"))]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    let envelope = router.process_turn(&mut session, "cancel my order").await;
    assert!(envelope.text.contains("I'm sorry"));
    assert_plain(&envelope);
    // The apology is still recorded so the next turn has coherent history.
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn unknown_tool_choice_becomes_an_apology_envelope() {
    let router = router(ScriptedOracle::new(vec![ScriptedOracle::invoke(
        "order_pizza",
        json!({}),
    )]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    let envelope = router.process_turn(&mut session, "order me a pizza").await;
    assert!(envelope.text.contains("I'm sorry"));
    assert_plain(&envelope);
}

#[tokio::test]
async fn failed_narration_falls_back_to_the_tool_text() {
    let router = router(ScriptedOracle::with_broken_narration(vec![ScriptedOracle::invoke(
        "cancel_order",
        json!({"order_id": "A100"}),
    )]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    // The cancellation already happened; its confirmation must survive
    // the narration failure.
    let envelope = router.process_turn(&mut session, "cancel order A100").await;
    assert_eq!(envelope.text, "Success. Order A100 has been cancelled.");
}

#[tokio::test]
async fn reset_clears_history_but_keeps_identity() {
    let router = router(ScriptedOracle::new(vec![Ok(OracleReply::Say("Hi!".to_string()))]));
    let mut session = Session::new(CustomerId("C0010".to_string()));

    router.reset_session(&mut session);
    assert!(session.history().is_empty());

    router.process_turn(&mut session, "hello").await;
    router.reset_session(&mut session);
    assert!(session.history().is_empty());
    assert_eq!(session.customer_id(), &CustomerId("C0010".to_string()));
}
