pub mod access;
pub mod config;
pub mod domain;
pub mod transitions;

pub use access::AccessScope;
pub use domain::order::{
    normalize_order_id, CustomerId, LineItem, Order, OrderId, OrderStatus, SearchableLineItem,
};
pub use domain::product::{Product, ProductId};
pub use domain::session::{Role, Session, Turn};
pub use transitions::{apply_event, OrderEvent, TransitionError};
