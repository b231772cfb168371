use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use helpline_core::{
    AccessScope, OrderEvent, OrderStatus, SearchableLineItem, Session, TransitionError,
};
use helpline_store::{
    partial_ratio, Embedder, MutationError, MutationReceipt, OrderLedger, VectorIndex,
};

use crate::oracle::CapabilitySpec;
use crate::tools::{missing_argument, str_argument, OrderSummary, Tool, ToolOutcome};

const NOT_FOUND: &str = "Order not found (or it does not belong to you).";
const LEDGER_UNAVAILABLE: &str = "Order database unavailable.";
const PERSIST_WARNING: &str = " (Warning: the change could not be saved to disk.)";

fn customer_scope(session: &Session) -> AccessScope {
    AccessScope::Customer(session.customer_id().clone())
}

fn order_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "order_id": {
                "type": "string",
                "description": "The order id, e.g. \"A100\""
            }
        },
        "required": ["order_id"]
    })
}

/// Hybrid lookup: the product index identifies what the user means, the
/// ledger (access-filtered) says whether they ever ordered it.
pub struct FindOrdersByDescription {
    ledger: Arc<OrderLedger>,
    product_index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    fuzzy_threshold: u8,
}

impl FindOrdersByDescription {
    pub fn new(
        ledger: Arc<OrderLedger>,
        product_index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        fuzzy_threshold: u8,
    ) -> Self {
        Self { ledger, product_index, embedder, fuzzy_threshold }
    }
}

/// Best fuzzy match for `target` among the line-item names the scope may
/// see. Ties keep the first (oldest) spelling.
fn closest_owned_name(items: &[SearchableLineItem], target: &str, threshold: u8) -> Option<String> {
    let mut best: Option<(u8, &str)> = None;
    for item in items {
        let score = partial_ratio(target, &item.product_name);
        if score >= threshold && best.map_or(true, |(top, _)| score > top) {
            best = Some((score, item.product_name.as_str()));
        }
    }
    best.map(|(_, name)| name.to_string())
}

#[async_trait]
impl Tool for FindOrdersByDescription {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "find_orders_by_description",
            description: "Find the user's OWN past orders from a vague product description \
                          (e.g. \"where are my shoes?\"). Only for questions about their \
                          purchases, never for shopping.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "How the user described the product they ordered"
                    }
                },
                "required": ["description"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value, session: &Session) -> ToolOutcome {
        let Some(description) = str_argument(arguments, "description") else {
            return missing_argument("description");
        };
        if self.product_index.is_empty() {
            return ToolOutcome::text("Product search unavailable.");
        }
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        let query = match self.embedder.embed(description).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(error = %error, "embedding request failed");
                return ToolOutcome::text("Product search unavailable.");
            }
        };

        let hits = self.product_index.search(&query, 1);
        let Some(matched_name) = hits.first().and_then(|hit| hit.product_name()) else {
            return ToolOutcome::text(format!(
                "I couldn't find any products matching '{description}'."
            ));
        };

        // The index metadata and the ledger can spell the same product
        // differently; retry the join fuzzily before concluding the
        // customer never ordered it.
        let items = self.ledger.searchable_items(&customer_scope(session)).await;
        let owned_name = items
            .iter()
            .find(|item| item.product_name == matched_name)
            .map(|item| item.product_name.clone())
            .or_else(|| closest_owned_name(&items, matched_name, self.fuzzy_threshold));

        let Some(owned_name) = owned_name else {
            return ToolOutcome::text(format!(
                "I found the product '{matched_name}' in our catalog, but you haven't ordered it."
            ));
        };
        let summaries: Vec<OrderSummary> = items
            .iter()
            .filter(|item| item.product_name == owned_name)
            .map(OrderSummary::from)
            .collect();
        ToolOutcome::orders(
            format!("Found {} order(s) containing '{owned_name}'.", summaries.len()),
            summaries,
        )
    }
}

pub struct CheckOrderStatus {
    ledger: Arc<OrderLedger>,
}

impl CheckOrderStatus {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for CheckOrderStatus {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "check_order_status",
            description: "Check the status of one specific order by its id.",
            parameters: order_id_schema(),
        }
    }

    async fn execute(&self, arguments: &Value, session: &Session) -> ToolOutcome {
        let Some(order_id) = str_argument(arguments, "order_id") else {
            return missing_argument("order_id");
        };
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        match self.ledger.find_order(order_id, &customer_scope(session)).await {
            Some(order) => {
                let text = format!(
                    "Order {} is currently '{}'.",
                    order.order_id.0, order.order_status
                );
                ToolOutcome::orders(text, vec![OrderSummary::from(&order)])
            }
            None => ToolOutcome::text(NOT_FOUND),
        }
    }
}

pub struct CancelOrder {
    ledger: Arc<OrderLedger>,
}

impl CancelOrder {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for CancelOrder {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "cancel_order",
            description: "Cancel an order. Only when the user explicitly asks to cancel.",
            parameters: order_id_schema(),
        }
    }

    async fn execute(&self, arguments: &Value, session: &Session) -> ToolOutcome {
        let Some(order_id) = str_argument(arguments, "order_id") else {
            return missing_argument("order_id");
        };
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        match self.ledger.apply(order_id, &OrderEvent::CancelRequested, &customer_scope(session)).await
        {
            Ok(receipt) => ToolOutcome::text(with_persist_warning(
                format!("Success. Order {} has been cancelled.", receipt.order_id.0),
                &receipt,
            )),
            Err(MutationError::NotFound) => ToolOutcome::text(NOT_FOUND),
            Err(MutationError::Transition {
                order_id,
                source: TransitionError::CancelBlocked { current },
            }) => ToolOutcome::text(format!(
                "Cannot cancel order {}. It is currently '{current}'.",
                order_id.0
            )),
            Err(MutationError::Transition { source, .. }) => ToolOutcome::text(source.to_string()),
        }
    }
}

pub struct InitiateReturn {
    ledger: Arc<OrderLedger>,
}

impl InitiateReturn {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for InitiateReturn {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "initiate_return",
            description: "Start a return for a delivered order. Only when the user \
                          explicitly asks to return an item.",
            parameters: order_id_schema(),
        }
    }

    async fn execute(&self, arguments: &Value, session: &Session) -> ToolOutcome {
        let Some(order_id) = str_argument(arguments, "order_id") else {
            return missing_argument("order_id");
        };
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        match self.ledger.apply(order_id, &OrderEvent::ReturnRequested, &customer_scope(session)).await
        {
            Ok(receipt) => ToolOutcome::text(with_persist_warning(
                format!("Return initiated for order {}.", receipt.order_id.0),
                &receipt,
            )),
            Err(MutationError::NotFound) => ToolOutcome::text(NOT_FOUND),
            Err(MutationError::Transition {
                order_id,
                source: TransitionError::ReturnBlocked { current },
            }) => ToolOutcome::text(format!(
                "Cannot return order {}. It is '{current}' (must be Delivered).",
                order_id.0
            )),
            Err(MutationError::Transition { source, .. }) => ToolOutcome::text(source.to_string()),
        }
    }
}

pub struct GetOrderHistory {
    ledger: Arc<OrderLedger>,
}

impl GetOrderHistory {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for GetOrderHistory {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "get_order_history",
            description: "List all of the user's past orders, newest first. Answer with a \
                          short phrase like \"Here are your orders\" rather than reciting \
                          every detail.",
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _arguments: &Value, session: &Session) -> ToolOutcome {
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        let history = self.ledger.order_history(session.customer_id()).await;
        if history.is_empty() {
            return ToolOutcome::text("No order history found.");
        }
        let summaries: Vec<OrderSummary> = history.iter().map(OrderSummary::from).collect();
        ToolOutcome::orders(format!("Here are your {} order(s).", summaries.len()), summaries)
    }
}

/// Unrestricted status override. Registered under an admin-only name so
/// the oracle cannot reach it from ambiguous phrasing; it bypasses the
/// ownership filter but not existence.
pub struct AdminUpdateOrder {
    ledger: Arc<OrderLedger>,
}

impl AdminUpdateOrder {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for AdminUpdateOrder {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "admin_update_order",
            description: "Force an order to any status, for any customer. ONLY when the \
                          user explicitly says \"force update\" or \"admin mode\".",
            parameters: json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "string",
                        "description": "The order id to override"
                    },
                    "new_status": {
                        "type": "string",
                        "description": "The target status, e.g. \"Shipped\""
                    }
                },
                "required": ["order_id", "new_status"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value, _session: &Session) -> ToolOutcome {
        let Some(order_id) = str_argument(arguments, "order_id") else {
            return missing_argument("order_id");
        };
        let Some(new_status) = str_argument(arguments, "new_status") else {
            return missing_argument("new_status");
        };
        if self.ledger.is_empty().await {
            return ToolOutcome::text(LEDGER_UNAVAILABLE);
        }

        let target = OrderStatus::from(new_status.to_string());
        match self
            .ledger
            .apply(order_id, &OrderEvent::AdminOverride { target }, &AccessScope::Admin)
            .await
        {
            Ok(receipt) => ToolOutcome::text(with_persist_warning(
                format!("Admin update: order {} is now '{}'.", receipt.order_id.0, receipt.new_status),
                &receipt,
            )),
            Err(MutationError::NotFound) => ToolOutcome::text("Order not found."),
            Err(MutationError::Transition { source, .. }) => ToolOutcome::text(source.to_string()),
        }
    }
}

fn with_persist_warning(text: String, receipt: &MutationReceipt) -> String {
    if receipt.persisted {
        text
    } else {
        format!("{text}{PERSIST_WARNING}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use helpline_core::{CustomerId, Order, Session};
    use helpline_store::{Embedder, OrderLedger, VectorIndex};

    use super::{
        AdminUpdateOrder, CancelOrder, CheckOrderStatus, FindOrdersByDescription, GetOrderHistory,
        InitiateReturn,
    };
    use crate::tools::{Tool, ToolPayload};

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn session_for(customer: &str) -> Session {
        Session::new(CustomerId(customer.to_string()))
    }

    fn ledger() -> Arc<OrderLedger> {
        let orders: Vec<Order> = serde_json::from_value(json!([
            {
                "order_id": "A100",
                "customer_id": "C0010",
                "order_status": "Delivered",
                "order_date": "2025-10-20",
                "products": [{"product_name": "iPhone 15", "quantity": 1}]
            },
            {
                "order_id": "B200",
                "customer_id": "C0010",
                "order_status": "Placed",
                "order_date": "2025-11-02",
                "products": [{"product_name": "Galaxy S24", "quantity": 1}]
            },
            {
                "order_id": "X900",
                "customer_id": "C0042",
                "order_status": "Placed",
                "order_date": "2025-11-05",
                "products": [{"product_name": "iPhone 15", "quantity": 1}]
            }
        ]))
        .expect("ledger fixture");
        Arc::new(OrderLedger::in_memory(orders))
    }

    fn phone_index() -> Arc<VectorIndex> {
        let records = serde_json::from_value(json!([
            {"document": "Flagship phone with a titanium frame.",
             "embedding": [0.0, 1.0],
             "metadata": {"product_name": "iPhone 15"}},
            {"document": "Android flagship with a bright display.",
             "embedding": [1.0, 0.0],
             "metadata": {"product_name": "Galaxy S24"}}
        ]))
        .expect("index fixture");
        Arc::new(VectorIndex::from_records(records))
    }

    #[tokio::test]
    async fn check_status_reports_status_with_order_payload() {
        let tool = CheckOrderStatus::new(ledger());
        let outcome = tool.execute(&json!({"order_id": "A 100"}), &session_for("C0010")).await;
        assert_eq!(outcome.text, "Order A100 is currently 'Delivered'.");
        match outcome.payload {
            ToolPayload::Orders(orders) => assert_eq!(orders[0].order_id, "A100"),
            other => panic!("expected order payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_and_missing_orders_read_identically() {
        let tool = CheckOrderStatus::new(ledger());
        let foreign = tool.execute(&json!({"order_id": "X900"}), &session_for("C0010")).await;
        let missing = tool.execute(&json!({"order_id": "Z999"}), &session_for("C0010")).await;
        assert_eq!(foreign.text, missing.text);
        assert_eq!(foreign.text, "Order not found (or it does not belong to you).");
    }

    #[tokio::test]
    async fn cancel_succeeds_then_blocked_cancel_names_status() {
        let shared = ledger();
        let cancel = CancelOrder::new(shared.clone());
        let user = session_for("C0010");

        let first = cancel.execute(&json!({"order_id": "B200"}), &user).await;
        assert_eq!(first.text, "Success. Order B200 has been cancelled.");

        let second = cancel.execute(&json!({"order_id": "B200"}), &user).await;
        assert_eq!(second.text, "Cannot cancel order B200. It is currently 'Cancelled'.");
    }

    #[tokio::test]
    async fn blocked_cancel_with_spoken_id_names_the_clean_id() {
        let cancel = CancelOrder::new(ledger());
        let blocked = cancel.execute(&json!({"order_id": " A 100 "}), &session_for("C0010")).await;
        assert_eq!(blocked.text, "Cannot cancel order A100. It is currently 'Delivered'.");
    }

    #[tokio::test]
    async fn return_requires_delivered_and_cites_current_status() {
        let shared = ledger();
        let initiate = InitiateReturn::new(shared.clone());
        let user = session_for("C0010");

        let delivered = initiate.execute(&json!({"order_id": "A100"}), &user).await;
        assert_eq!(delivered.text, "Return initiated for order A100.");

        let repeat = initiate.execute(&json!({"order_id": "A100"}), &user).await;
        assert_eq!(
            repeat.text,
            "Cannot return order A100. It is 'Return Requested' (must be Delivered)."
        );

        let placed = initiate.execute(&json!({"order_id": "B200"}), &user).await;
        assert_eq!(placed.text, "Cannot return order B200. It is 'Placed' (must be Delivered).");
    }

    #[tokio::test]
    async fn history_lists_only_own_orders_newest_first() {
        let tool = GetOrderHistory::new(ledger());
        let outcome = tool.execute(&json!({}), &session_for("C0010")).await;
        match outcome.payload {
            ToolPayload::Orders(orders) => {
                let ids: Vec<&str> = orders.iter().map(|order| order.order_id.as_str()).collect();
                assert_eq!(ids, vec!["B200", "A100"]);
            }
            other => panic!("expected order payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_for_unknown_customer_is_empty_message() {
        let tool = GetOrderHistory::new(ledger());
        let outcome = tool.execute(&json!({}), &session_for("C9999")).await;
        assert_eq!(outcome.text, "No order history found.");
    }

    #[tokio::test]
    async fn description_lookup_joins_index_hit_to_own_orders() {
        let tool = FindOrdersByDescription::new(
            ledger(),
            phone_index(),
            Arc::new(FixedEmbedder(vec![0.0, 1.0])),
            60,
        );
        let outcome =
            tool.execute(&json!({"description": "my fancy phone"}), &session_for("C0010")).await;
        match outcome.payload {
            ToolPayload::Orders(orders) => {
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].order_id, "A100");
                assert_eq!(orders[0].products, vec!["iPhone 15".to_string()]);
            }
            other => panic!("expected order payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn description_lookup_survives_index_name_drift() {
        // The index spells the product "Apple iPhone 15"; the ledger's
        // line items say "iPhone 15". The fuzzy re-join must still find
        // the customer's order.
        let records = serde_json::from_value(json!([
            {"document": "Flagship phone with a titanium frame.",
             "embedding": [0.0, 1.0],
             "metadata": {"product_name": "Apple iPhone 15"}}
        ]))
        .expect("index fixture");
        let tool = FindOrdersByDescription::new(
            ledger(),
            Arc::new(VectorIndex::from_records(records)),
            Arc::new(FixedEmbedder(vec![0.0, 1.0])),
            60,
        );

        let outcome =
            tool.execute(&json!({"description": "my apple phone"}), &session_for("C0010")).await;
        assert_eq!(outcome.text, "Found 1 order(s) containing 'iPhone 15'.");
        match outcome.payload {
            ToolPayload::Orders(orders) => {
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].order_id, "A100");
            }
            other => panic!("expected order payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn description_lookup_never_surfaces_other_customers_orders() {
        let tool = FindOrdersByDescription::new(
            ledger(),
            phone_index(),
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            60,
        );
        // The index resolves to "Galaxy S24"; C0042 never ordered one.
        let outcome =
            tool.execute(&json!({"description": "that android phone"}), &session_for("C0042")).await;
        assert_eq!(
            outcome.text,
            "I found the product 'Galaxy S24' in our catalog, but you haven't ordered it."
        );
        assert_eq!(outcome.payload, ToolPayload::None);
    }

    #[tokio::test]
    async fn admin_override_works_across_customers_but_not_for_ghosts() {
        let shared = ledger();
        let admin = AdminUpdateOrder::new(shared.clone());
        let user = session_for("C0010");

        let cross = admin
            .execute(&json!({"order_id": "X900", "new_status": "Shipped"}), &user)
            .await;
        assert_eq!(cross.text, "Admin update: order X900 is now 'Shipped'.");

        let ghost = admin
            .execute(&json!({"order_id": "Z999", "new_status": "Shipped"}), &user)
            .await;
        assert_eq!(ghost.text, "Order not found.");
    }
}
