//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Reserved ──► AwaitingPayment ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │               │
///    └────────────┴───────────────┴──► Cancelled
/// ```
///
/// Everything up to `AwaitingPayment` is driven synchronously by the
/// saga; `Confirmed` and `Cancelled` (from `AwaitingPayment`) are driven
/// by asynchronous payment events; the remainder are administrative
/// forward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order persisted, inventory not yet reserved.
    #[default]
    Pending,

    /// All line items reserved in inventory.
    Reserved,

    /// Payment intent opened, waiting for the gateway callback.
    AwaitingPayment,

    /// Payment completed (async event applied).
    Confirmed,

    /// Order is being fulfilled.
    Processing,

    /// Order handed to the carrier.
    Shipped,

    /// Order delivered (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Reserved)
                | (Reserved, AwaitingPayment)
                | (AwaitingPayment, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Reserved, Cancelled)
                | (AwaitingPayment, Cancelled)
        )
    }

    /// Returns true if the order can still be cancelled by saga compensation
    /// or a caller-initiated cancel. After `Confirmed` cancellation becomes
    /// a refund flow, not a compensation.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Reserved | OrderStatus::AwaitingPayment
        )
    }

    /// Returns true if items can still be modified.
    pub fn can_modify_items(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Reserved => "Reserved",
            OrderStatus::AwaitingPayment => "AwaitingPayment",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
