//! The capability set the router can dispatch to.
//!
//! Tools never raise: every failure mode (missing store, missing
//! argument, blocked transition, order not visible) is converted into a
//! user-facing result string at the tool boundary. The payload is a
//! tagged enum so the router classifies results by tag, never by
//! sniffing the text.

pub mod catalog;
pub mod knowledge;
pub mod orders;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use helpline_core::{Order, Product, SearchableLineItem, Session};

use crate::oracle::CapabilitySpec;

pub use catalog::{BrowseCatalog, SearchProducts};
pub use knowledge::GetPolicyInfo;
pub use orders::{
    AdminUpdateOrder, CancelOrder, CheckOrderStatus, FindOrdersByDescription, GetOrderHistory,
    InitiateReturn,
};

/// The slice of an order a tool hands back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub order_status: String,
    pub order_date: NaiveDate,
    pub products: Vec<String>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.0.clone(),
            order_status: order.order_status.to_string(),
            order_date: order.order_date,
            products: order.products.iter().map(|item| item.product_name.clone()).collect(),
        }
    }
}

impl From<&SearchableLineItem> for OrderSummary {
    fn from(item: &SearchableLineItem) -> Self {
        Self {
            order_id: item.order_id.0.clone(),
            order_status: item.order_status.to_string(),
            order_date: item.order_date,
            products: vec![item.product_name.clone()],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolPayload {
    None,
    Orders(Vec<OrderSummary>),
    Products(Vec<Product>),
}

/// What a tool produced: text for the oracle to narrate, plus the tagged
/// structured payload for the envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    pub text: String,
    pub payload: ToolPayload,
}

impl ToolOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), payload: ToolPayload::None }
    }

    pub fn orders(text: impl Into<String>, orders: Vec<OrderSummary>) -> Self {
        Self { text: text.into(), payload: ToolPayload::Orders(orders) }
    }

    pub fn products(text: impl Into<String>, products: Vec<Product>) -> Self {
        Self { text: text.into(), payload: ToolPayload::Products(products) }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> CapabilitySpec;
    async fn execute(&self, arguments: &Value, session: &Session) -> ToolOutcome;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.spec().name.to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn capabilities(&self) -> Vec<CapabilitySpec> {
        let mut specs: Vec<CapabilitySpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Wires the full capability set against the given stores. Both the
/// server and the REPL register the same nine tools.
pub fn standard_registry(
    catalog: Arc<helpline_store::CatalogStore>,
    ledger: Arc<helpline_store::OrderLedger>,
    general_index: Arc<helpline_store::VectorIndex>,
    product_index: Arc<helpline_store::VectorIndex>,
    embedder: Arc<dyn helpline_store::Embedder>,
    fuzzy_threshold: u8,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(SearchProducts::new(catalog.clone(), fuzzy_threshold));
    registry.register(BrowseCatalog::new(
        catalog,
        product_index.clone(),
        embedder.clone(),
        fuzzy_threshold,
    ));
    registry.register(FindOrdersByDescription::new(
        ledger.clone(),
        product_index,
        embedder.clone(),
        fuzzy_threshold,
    ));
    registry.register(CheckOrderStatus::new(ledger.clone()));
    registry.register(CancelOrder::new(ledger.clone()));
    registry.register(InitiateReturn::new(ledger.clone()));
    registry.register(GetOrderHistory::new(ledger.clone()));
    registry.register(AdminUpdateOrder::new(ledger));
    registry.register(GetPolicyInfo::new(general_index, embedder));
    registry
}

/// Extracts a required string argument, trimmed. `None` means the oracle
/// sent malformed arguments; callers answer with a missing-argument
/// message instead of failing.
pub(crate) fn str_argument<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn missing_argument(key: &str) -> ToolOutcome {
    ToolOutcome::text(format!("Missing required argument: {key}."))
}
