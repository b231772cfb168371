use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Order status as found in the ledger file. Known statuses parse
/// case-insensitively; anything else is carried through verbatim as
/// `Other` so a persist-then-reload cycle never rewrites source data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Placed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnRequested,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Placed => "Placed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::ReturnRequested => "Return Requested",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "placed" => Self::Placed,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "out for delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            "return requested" => Self::ReturnRequested,
            _ => Self::Other(value),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// One line of an order, exactly as the source record gives it.
/// `product_name` is the join key into the catalog and the vector
/// metadata; every other attribute (quantity, unit price, ...) is kept
/// in `attributes` untouched so the ledger round-trips byte-for-byte.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub order_status: OrderStatus,
    pub order_date: NaiveDate,
    pub products: Vec<LineItem>,
}

impl Order {
    /// Projects this order into one searchable row per line item.
    pub fn flatten(&self) -> impl Iterator<Item = SearchableLineItem> + '_ {
        self.products.iter().map(move |item| SearchableLineItem {
            order_id: self.order_id.clone(),
            customer_id: self.customer_id.clone(),
            order_status: self.order_status.clone(),
            order_date: self.order_date,
            product_name: item.product_name.clone(),
        })
    }
}

/// Flattened (order, line item) pair used for product-level search over
/// the ledger. Recomputed from the ledger on demand; never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchableLineItem {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub order_status: OrderStatus,
    pub order_date: NaiveDate,
    pub product_name: String,
}

/// Order ids arrive from voice transcription with stray whitespace
/// ("A 100"); strip it before any ledger lookup.
pub fn normalize_order_id(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
