use thiserror::Error;

use crate::domain::order::OrderStatus;

/// Status-changing requests a tool call can make against one order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderEvent {
    CancelRequested,
    ReturnRequested,
    AdminOverride { target: OrderStatus },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot cancel: the order is currently '{current}'")]
    CancelBlocked { current: OrderStatus },
    #[error("cannot return: the order is '{current}' (must be Delivered)")]
    ReturnBlocked { current: OrderStatus },
}

/// Applies one event to the current status and returns the new status.
/// Rejections always name the blocking status so the caller can explain
/// why the request was refused.
pub fn apply_event(
    current: &OrderStatus,
    event: &OrderEvent,
) -> Result<OrderStatus, TransitionError> {
    use OrderStatus::{Cancelled, Delivered, OutForDelivery, ReturnRequested, Shipped};

    match event {
        OrderEvent::CancelRequested => match current {
            Delivered | Shipped | OutForDelivery | Cancelled => {
                Err(TransitionError::CancelBlocked { current: current.clone() })
            }
            _ => Ok(Cancelled),
        },
        OrderEvent::ReturnRequested => match current {
            Delivered => Ok(ReturnRequested),
            _ => Err(TransitionError::ReturnBlocked { current: current.clone() }),
        },
        // The admin path is gated at the router layer; here it is an
        // unconditional transition to the supplied target.
        OrderEvent::AdminOverride { target } => Ok(target.clone()),
    }
}
