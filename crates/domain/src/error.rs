//! Domain error taxonomy.

use common::{CartItemId, OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors that can occur during shop operations.
///
/// Every operation either fully succeeds or returns one of these with no
/// partial state change; the store's transaction boundaries absorb partial
/// failures. The API layer maps kinds to HTTP status codes; nothing here
/// knows about transport.
#[derive(Debug, Error)]
pub enum ShopError {
    /// The product does not exist or has been deactivated.
    #[error("product {product_id} is not available")]
    ProductUnavailable { product_id: ProductId },

    /// Requested quantity exceeds what is currently in stock.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A checkout was attempted with no items.
    #[error("order must contain at least one item")]
    EmptyOrder,

    /// The cart item does not exist in the caller's cart.
    #[error("cart item {item_id} not found")]
    ItemNotFound { item_id: CartItemId },

    /// Quantity must be greater than zero.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The order does not exist, or does not belong to the caller.
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// The requested status change is not a legal transition. In particular,
    /// shipped and delivered orders are final and cannot be cancelled.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order was already cancelled; nothing was changed.
    #[error("order {order_id} is already cancelled")]
    AlreadyCancelled { order_id: OrderId },

    /// The status value is not one the state machine recognizes.
    #[error("unknown order status: {value:?}")]
    UnknownStatus { value: String },

    /// A concurrent operation changed the order first; the caller may retry.
    #[error("order {order_id} was modified concurrently")]
    ConcurrencyConflict { order_id: OrderId },

    /// The operation requires the admin role.
    #[error("operation requires the admin role")]
    AccessDenied,

    /// An error occurred in the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
