//! The shop store trait.

use async_trait::async_trait;
use common::{CartId, CartItemId, OrderId, ProductId, UserId};

use crate::{
    CartItemRecord, CartRecord, OrderFilter, OrderItemRecord, OrderRecord, ProductRecord, Result,
    StockAdjustment,
};

/// Repository interface over the shop's durable state.
///
/// Every method is a complete unit of work: it either fully applies or leaves
/// no trace. The two multi-record writes, [`commit_order`] and
/// [`transition_order`], run inside a single transaction (or a
/// single writer lock for the in-memory implementation), which is what lets
/// the domain layer promise all-or-nothing checkout and cancellation.
///
/// [`commit_order`]: ShopStore::commit_order
/// [`transition_order`]: ShopStore::transition_order
#[async_trait]
pub trait ShopStore: Send + Sync {
    // -- Products --

    /// Inserts a product, replacing an existing row with the same id.
    async fn upsert_product(&self, product: ProductRecord) -> Result<()>;

    /// Loads a product by id.
    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>>;

    /// Loads the products matching `ids`. Missing ids are simply absent from
    /// the result; the caller decides whether that is an error.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>>;

    /// Flips a product's `active` flag. This is the only deletion mechanism:
    /// products referenced by order history are never removed.
    ///
    /// Returns false if the product does not exist.
    async fn set_product_active(&self, id: &ProductId, active: bool) -> Result<bool>;

    /// Guarded stock decrement: subtracts `quantity` only if the product is
    /// active and has at least that much stock, as one atomic conditional
    /// update. Returns false when the guard fails.
    async fn reserve_stock(&self, id: &ProductId, quantity: u32) -> Result<bool>;

    /// Unconditional stock increment, used to restock on cancellation.
    ///
    /// Returns false if the product does not exist.
    async fn release_stock(&self, id: &ProductId, quantity: u32) -> Result<bool>;

    // -- Carts --

    /// Returns the user's cart, creating an empty one if none exists.
    ///
    /// At most one cart per user ever exists; concurrent calls for the same
    /// user converge on the same row.
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<CartRecord>;

    /// Lists the line items of a cart.
    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>>;

    /// Loads a single line item, scoped to the cart that owns it.
    async fn cart_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItemRecord>>;

    /// Finds the cart's line item for a product, if any.
    async fn cart_item_for_product(
        &self,
        cart_id: CartId,
        product_id: &ProductId,
    ) -> Result<Option<CartItemRecord>>;

    /// Inserts a new line item.
    async fn insert_cart_item(&self, item: CartItemRecord) -> Result<()>;

    /// Overwrites a line item's quantity. Returns false if the item is gone.
    async fn set_cart_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<bool>;

    /// Deletes a line item. Returns false if it was already gone.
    async fn delete_cart_item(&self, item_id: CartItemId) -> Result<bool>;

    /// Deletes all line items of a cart, returning how many were removed.
    async fn clear_cart(&self, cart_id: CartId) -> Result<u64>;

    /// Deletes the cart's line items for the given products, returning how
    /// many were removed. Used to supersede purchased lines after checkout.
    async fn delete_cart_items_for_products(
        &self,
        cart_id: CartId,
        product_ids: &[ProductId],
    ) -> Result<u64>;

    // -- Orders --

    /// Atomically persists a new order with its items and applies a guarded
    /// stock decrement for every line.
    ///
    /// If any decrement's guard fails (insufficient stock, or the product
    /// vanished or was deactivated since validation), nothing is written and
    /// [`StoreError::StockConflict`] names the offending product.
    ///
    /// [`StoreError::StockConflict`]: crate::StoreError::StockConflict
    async fn commit_order(&self, order: OrderRecord, items: Vec<OrderItemRecord>) -> Result<()>;

    /// Loads an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Lists the frozen line items of an order.
    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItemRecord>>;

    /// Lists a user's orders, newest first, honoring the filter.
    async fn orders_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
    ) -> Result<Vec<OrderRecord>>;

    /// Atomically moves an order from one of `allowed_from` to `to` and
    /// applies every stock increment in `restock` (empty for plain forward
    /// transitions).
    ///
    /// The status write is guarded on the current status, so a concurrent
    /// transition makes this return false with nothing applied; the caller
    /// re-reads and reports the conflict. Returns true when the whole
    /// transition committed.
    async fn transition_order(
        &self,
        id: OrderId,
        to: &str,
        allowed_from: &[&str],
        restock: &[StockAdjustment],
    ) -> Result<bool>;
}
