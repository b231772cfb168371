use crate::domain::order::{CustomerId, Order};

/// Identity under which a ledger read or write runs. Every non-admin
/// operation is restricted to rows owned by the scoped customer; a row
/// that fails the predicate must be reported exactly like a row that
/// does not exist, so callers cannot probe other customers' orders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessScope {
    Customer(CustomerId),
    Admin,
}

impl AccessScope {
    pub fn permits(&self, order: &Order) -> bool {
        match self {
            Self::Admin => true,
            Self::Customer(id) => &order.customer_id == id,
        }
    }

    pub fn customer(&self) -> Option<&CustomerId> {
        match self {
            Self::Customer(id) => Some(id),
            Self::Admin => None,
        }
    }
}
