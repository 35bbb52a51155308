//! Plain persistence records.
//!
//! The store is deliberately domain-dumb: money is carried as raw cents and
//! order status as text. Interpreting either (arithmetic, state-machine
//! rules) is the domain crate's job.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A catalog product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Unit price in cents. Positive for any sellable product.
    pub price_cents: i64,
    pub stock: u32,
    pub active: bool,
}

/// A cart row. One per user, created lazily on first access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A single cart line item. `product_id` is a weak reference: the product
/// may be deactivated independently of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// An order row. Immutable after creation except for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Order total in cents, frozen at creation.
    pub total_cents: i64,
    pub status: String,
    pub payment_method: Option<String>,
}

/// An order line item with values frozen at order time. `subtotal_cents` is
/// never recomputed from the live product price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A stock increment applied when an order is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Filter for listing a user's orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
