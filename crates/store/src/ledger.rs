use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;

use helpline_core::{
    apply_event, normalize_order_id, AccessScope, CustomerId, Order, OrderEvent, OrderId,
    OrderStatus, SearchableLineItem, TransitionError,
};

use crate::StoreError;

/// The authoritative, mutable store of customer orders.
///
/// Loaded from a working copy that is created from the immutable original
/// on first run; the original is never written. Every mutation runs the
/// full read-check-write-persist sequence under the write lock, so two
/// concurrent cancels of the same order cannot both observe "not yet
/// cancelled". Reads share the read lock. The working copy is rewritten
/// atomically (temp file, then rename) so an external reader never sees a
/// torn file.
pub struct OrderLedger {
    orders: RwLock<Vec<Order>>,
    working_copy: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationReceipt {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    /// False when the in-memory mutation succeeded but the working copy
    /// could not be written. The mutation is kept; callers surface this
    /// as a warning.
    pub persisted: bool,
}

#[derive(Debug, Error)]
pub enum MutationError {
    /// Covers both a genuinely missing order and one owned by another
    /// customer. The two cases are deliberately indistinguishable.
    #[error("order not found")]
    NotFound,
    /// Carries the normalized id the ledger resolved, so callers can
    /// name the order without re-normalizing the raw input themselves.
    #[error("{source}")]
    Transition { order_id: OrderId, source: TransitionError },
}

impl OrderLedger {
    /// Opens the ledger, creating the working copy from the original
    /// first if it does not exist yet.
    pub fn open(original: &Path, working_copy: &Path) -> Result<Self, StoreError> {
        if !working_copy.exists() && original.exists() {
            fs::copy(original, working_copy).map_err(|source| StoreError::Persist {
                path: working_copy.to_path_buf(),
                source,
            })?;
            tracing::info!(
                original = %original.display(),
                working_copy = %working_copy.display(),
                "created ledger working copy"
            );
        }

        let raw = fs::read(working_copy)
            .map_err(|source| StoreError::ReadFile { path: working_copy.to_path_buf(), source })?;
        let orders: Vec<Order> = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::ParseFile { path: working_copy.to_path_buf(), source })?;

        Ok(Self { orders: RwLock::new(orders), working_copy: Some(working_copy.to_path_buf()) })
    }

    /// Ledger with persistence disabled. Used as the degraded fallback
    /// when the ledger files cannot be loaded, and in tests.
    pub fn in_memory(orders: Vec<Order>) -> Self {
        Self { orders: RwLock::new(orders), working_copy: None }
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Exact-id lookup under the given scope. An order that exists but
    /// is not visible to the scope is reported as absent.
    pub async fn find_order(&self, raw_id: &str, scope: &AccessScope) -> Option<Order> {
        let clean_id = normalize_order_id(raw_id);
        let orders = self.orders.read().await;
        orders.iter().find(|order| order.order_id.0 == clean_id && scope.permits(order)).cloned()
    }

    /// All orders owned by `customer`, newest order date first. The sort
    /// is stable: orders sharing a date keep ledger insertion order.
    pub async fn order_history(&self, customer: &CustomerId) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut history: Vec<Order> =
            orders.iter().filter(|order| &order.customer_id == customer).cloned().collect();
        history.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        history
    }

    /// Flattened (order, line item) projection, restricted to what the
    /// scope may see. Recomputed per call; never a source of truth.
    pub async fn searchable_items(&self, scope: &AccessScope) -> Vec<SearchableLineItem> {
        let orders = self.orders.read().await;
        orders.iter().filter(|order| scope.permits(order)).flat_map(Order::flatten).collect()
    }

    /// Applies one status transition as a transaction: find, check scope,
    /// validate the transition, mutate, persist — all under the write
    /// lock. A persistence failure keeps the in-memory mutation and is
    /// reported through `MutationReceipt::persisted`.
    pub async fn apply(
        &self,
        raw_id: &str,
        event: &OrderEvent,
        scope: &AccessScope,
    ) -> Result<MutationReceipt, MutationError> {
        let clean_id = normalize_order_id(raw_id);
        let mut orders = self.orders.write().await;

        let order = orders
            .iter_mut()
            .find(|order| order.order_id.0 == clean_id && scope.permits(order))
            .ok_or(MutationError::NotFound)?;

        let new_status = apply_event(&order.order_status, event).map_err(|source| {
            MutationError::Transition { order_id: OrderId(clean_id.clone()), source }
        })?;
        order.order_status = new_status.clone();

        let persisted = match &self.working_copy {
            Some(path) => match persist_orders(path, &orders) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(
                        order_id = %clean_id,
                        error = %error,
                        "ledger mutation applied in memory but working copy write failed"
                    );
                    false
                }
            },
            None => true,
        };

        Ok(MutationReceipt { order_id: OrderId(clean_id), new_status, persisted })
    }
}

fn persist_orders(path: &Path, orders: &[Order]) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(orders)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)
        .map_err(|source| StoreError::Persist { path: tmp.clone(), source })?;
    fs::rename(&tmp, path)
        .map_err(|source| StoreError::Persist { path: path.to_path_buf(), source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use helpline_core::{
        AccessScope, CustomerId, Order, OrderEvent, OrderId, OrderStatus, TransitionError,
    };

    use super::{MutationError, OrderLedger};

    fn scope(customer: &str) -> AccessScope {
        AccessScope::Customer(CustomerId(customer.to_string()))
    }

    fn fixture_orders() -> serde_json::Value {
        serde_json::json!([
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
                "products": [{"product_name": "Galaxy S24", "quantity": 2}]
            },
            {
                "order_id": "B201",
                "customer_id": "C0010",
                "order_status": "Shipped",
                "order_date": "2025-11-02",
                "products": [{"product_name": "AirPods Pro", "quantity": 1}]
            },
            {
                "order_id": "X900",
                "customer_id": "C0042",
                "order_status": "Placed",
                "order_date": "2025-11-05",
                "products": [{"product_name": "iPhone 15", "quantity": 1}]
            }
        ])
    }

    fn write_fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
        let original = dir.path().join("order_database.json");
        let working_copy = dir.path().join("order_database_copy.json");
        fs::write(&original, serde_json::to_vec_pretty(&fixture_orders()).expect("encode"))
            .expect("write original");
        (original, working_copy)
    }

    fn parse_orders(ledger_orders: serde_json::Value) -> Vec<Order> {
        serde_json::from_value(ledger_orders).expect("fixture parses")
    }

    #[tokio::test]
    async fn first_open_creates_working_copy_and_never_mutates_original() {
        let dir = TempDir::new().expect("temp dir");
        let (original, working_copy) = write_fixture(&dir);
        let original_bytes = fs::read(&original).expect("read original");

        let ledger = OrderLedger::open(&original, &working_copy).expect("ledger opens");
        assert!(working_copy.exists(), "working copy should be created on first run");

        let receipt = ledger
            .apply("B200", &OrderEvent::CancelRequested, &scope("C0010"))
            .await
            .expect("cancel placed order");
        assert!(receipt.persisted);

        assert_eq!(fs::read(&original).expect("re-read original"), original_bytes);
    }

    #[tokio::test]
    async fn cancel_then_check_reports_cancelled() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let owner = scope("C0010");

        ledger.apply("B200", &OrderEvent::CancelRequested, &owner).await.expect("cancel");
        let order = ledger.find_order("B200", &owner).await.expect("order visible");
        assert_eq!(order.order_status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn blocked_cancel_names_status_and_leaves_ledger_unchanged() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let owner = scope("C0010");

        let error = ledger
            .apply("B201", &OrderEvent::CancelRequested, &owner)
            .await
            .expect_err("shipped orders cannot be cancelled");
        assert!(matches!(
            error,
            MutationError::Transition {
                source: TransitionError::CancelBlocked { current: OrderStatus::Shipped },
                ..
            }
        ));

        let order = ledger.find_order("B201", &owner).await.expect("order visible");
        assert_eq!(order.order_status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn foreign_order_is_indistinguishable_from_missing() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let intruder = scope("C0042");

        // B200 exists but belongs to C0010; Z999 does not exist at all.
        assert!(ledger.find_order("B200", &intruder).await.is_none());
        assert!(ledger.find_order("Z999", &intruder).await.is_none());

        let foreign = ledger
            .apply("B200", &OrderEvent::CancelRequested, &intruder)
            .await
            .expect_err("foreign order must be hidden");
        let missing = ledger
            .apply("Z999", &OrderEvent::CancelRequested, &intruder)
            .await
            .expect_err("missing order");
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn return_flow_for_delivered_order_then_repeat_rejection() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let owner = scope("C0010");

        let receipt = ledger
            .apply("A100", &OrderEvent::ReturnRequested, &owner)
            .await
            .expect("delivered order is returnable");
        assert_eq!(receipt.new_status, OrderStatus::ReturnRequested);

        let error = ledger
            .apply("A100", &OrderEvent::ReturnRequested, &owner)
            .await
            .expect_err("second return is rejected");
        assert!(error.to_string().contains("Return Requested"));
    }

    #[tokio::test]
    async fn blocked_mutation_reports_the_normalized_id() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));

        let error = ledger
            .apply(" B 201 ", &OrderEvent::CancelRequested, &scope("C0010"))
            .await
            .expect_err("shipped orders cannot be cancelled");
        match error {
            MutationError::Transition { order_id, .. } => {
                assert_eq!(order_id, OrderId("B201".to_string()));
            }
            other => panic!("expected a transition rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn order_id_lookup_tolerates_spoken_whitespace() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let owner = scope("C0010");

        let order = ledger.find_order(" A 100 ", &owner).await.expect("normalized id matches");
        assert_eq!(order.order_id, OrderId("A100".to_string()));
    }

    #[tokio::test]
    async fn history_is_date_descending_stable_and_owner_pure() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));
        let history = ledger.order_history(&CustomerId("C0010".to_string())).await;

        let ids: Vec<&str> = history.iter().map(|order| order.order_id.0.as_str()).collect();
        // B200 and B201 share a date; insertion order must hold between them.
        assert_eq!(ids, vec!["B200", "B201", "A100"]);
        assert!(history.iter().all(|order| order.customer_id.0 == "C0010"));
        assert!(history.windows(2).all(|pair| pair[0].order_date >= pair[1].order_date));
    }

    #[tokio::test]
    async fn admin_override_bypasses_ownership_but_not_existence() {
        let ledger = OrderLedger::in_memory(parse_orders(fixture_orders()));

        let receipt = ledger
            .apply(
                "X900",
                &OrderEvent::AdminOverride { target: OrderStatus::Shipped },
                &AccessScope::Admin,
            )
            .await
            .expect("admin can touch any order");
        assert_eq!(receipt.new_status, OrderStatus::Shipped);

        let error = ledger
            .apply(
                "Z999",
                &OrderEvent::AdminOverride { target: OrderStatus::Shipped },
                &AccessScope::Admin,
            )
            .await
            .expect_err("missing order stays missing for admins");
        assert!(matches!(error, MutationError::NotFound));
    }

    #[tokio::test]
    async fn persist_then_reload_round_trips_untouched_records() {
        let dir = TempDir::new().expect("temp dir");
        let (original, working_copy) = write_fixture(&dir);

        let ledger = OrderLedger::open(&original, &working_copy).expect("ledger opens");
        ledger
            .apply("B200", &OrderEvent::CancelRequested, &scope("C0010"))
            .await
            .expect("cancel persists");

        let reloaded = OrderLedger::open(&original, &working_copy).expect("reload working copy");
        let owner = scope("C0010");

        let mutated = reloaded.find_order("B200", &owner).await.expect("mutated order");
        assert_eq!(mutated.order_status, OrderStatus::Cancelled);

        // Untouched records must round-trip value-identically.
        let expected = parse_orders(fixture_orders());
        for untouched_id in ["A100", "B201"] {
            let before = expected
                .iter()
                .find(|order| order.order_id.0 == untouched_id)
                .expect("fixture order");
            let after = reloaded.find_order(untouched_id, &owner).await.expect("reloaded order");
            assert_eq!(
                serde_json::to_value(&after).expect("encode"),
                serde_json::to_value(before).expect("encode")
            );
        }
    }

    #[tokio::test]
    async fn persistence_failure_keeps_memory_state_and_flags_receipt() {
        let dir = TempDir::new().expect("temp dir");
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).expect("create data dir");
        let original = data_dir.join("order_database.json");
        let working_copy = data_dir.join("order_database_copy.json");
        fs::write(&original, serde_json::to_vec_pretty(&fixture_orders()).expect("encode"))
            .expect("write original");

        let ledger = OrderLedger::open(&original, &working_copy).expect("ledger opens");
        fs::remove_dir_all(&data_dir).expect("pull the directory out from under the ledger");

        let owner = scope("C0010");
        let receipt = ledger
            .apply("B200", &OrderEvent::CancelRequested, &owner)
            .await
            .expect("mutation still applies in memory");
        assert!(!receipt.persisted, "write-through should have failed");

        let order = ledger.find_order("B200", &owner).await.expect("order visible");
        assert_eq!(order.order_status, OrderStatus::Cancelled);
    }
}
