//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// pending ──► confirmed ──► processing ──► shipped ──► delivered
///    │            │
///    └────────────┴──► cancelled
/// ```
///
/// Forward moves go strictly later in the chain and never backwards.
/// `cancelled` is reachable from `pending` and `confirmed` only and is
/// absolutely terminal; `shipped` and `delivered` cannot be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order committed at checkout, stock reserved.
    #[default]
    Pending,

    /// Order acknowledged by the shop.
    Confirmed,

    /// Order is being prepared.
    Processing,

    /// Order has left the shop; cancellation is no longer possible.
    Shipped,

    /// Order received by the customer (terminal).
    Delivered,

    /// Order was cancelled and its stock released (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Parses a status from its wire representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns the status name as stored and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the forward chain; `None` for `cancelled`, which sits
    /// outside it.
    fn sequence_index(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if a forward transition to `to` is legal from this
    /// status: both sit in the chain and `to` is strictly later.
    pub fn can_advance_to(&self, to: OrderStatus) -> bool {
        match (self.sequence_index(), to.sequence_index()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if no further transition is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The statuses a cancellation may start from.
    pub fn cancellable() -> [OrderStatus; 2] {
        [OrderStatus::Pending, OrderStatus::Confirmed]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
