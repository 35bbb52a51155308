use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartItemId, OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartItemRecord, CartRecord, OrderFilter, OrderItemRecord, OrderRecord, ProductRecord, Result,
    StockAdjustment, StoreError, store::ShopStore,
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, ProductRecord>,
    carts: Vec<CartRecord>,
    cart_items: Vec<CartItemRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    order_items: HashMap<OrderId, Vec<OrderItemRecord>>,
}

/// In-memory store implementation for tests and the demo server.
///
/// All state lives behind a single writer lock, so every trait method is
/// trivially atomic and the guarded stock decrement serializes exactly like
/// the conditional UPDATE in the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl ShopStore for InMemoryStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let state = self.state.read().await;
        Ok(state.products.get(id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn set_product_active(&self, id: &ProductId, active: bool) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.products.get_mut(id) {
            Some(product) => {
                product.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reserve_stock(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.products.get_mut(id) {
            Some(product) if product.active && product.stock >= quantity => {
                product.stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.products.get_mut(id) {
            Some(product) => {
                product.stock += quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<CartRecord> {
        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(*cart);
        }

        let cart = CartRecord {
            id: CartId::new(),
            user_id,
            created_at: Utc::now(),
        };
        state.carts.push(cart);
        Ok(cart)
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn cart_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItemRecord>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .find(|i| i.id == item_id && i.cart_id == cart_id)
            .cloned())
    }

    async fn cart_item_for_product(
        &self,
        cart_id: CartId,
        product_id: &ProductId,
    ) -> Result<Option<CartItemRecord>> {
        let state = self.state.read().await;
        Ok(state
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && &i.product_id == product_id)
            .cloned())
    }

    async fn insert_cart_item(&self, item: CartItemRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.cart_items.push(item);
        Ok(())
    }

    async fn set_cart_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.cart_items.iter_mut().find(|i| i.id == item_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_item(&self, item_id: CartItemId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|i| i.id != item_id);
        Ok(state.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - state.cart_items.len()) as u64)
    }

    async fn delete_cart_items_for_products(
        &self,
        cart_id: CartId,
        product_ids: &[ProductId],
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|i| i.cart_id != cart_id || !product_ids.contains(&i.product_id));
        Ok((before - state.cart_items.len()) as u64)
    }

    async fn commit_order(&self, order: OrderRecord, items: Vec<OrderItemRecord>) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate every guard before touching anything, so a failure leaves
        // the state exactly as it was.
        for item in &items {
            let ok = matches!(
                state.products.get(&item.product_id),
                Some(p) if p.active && p.stock >= item.quantity
            );
            if !ok {
                return Err(StoreError::StockConflict {
                    product_id: item.product_id.clone(),
                });
            }
        }

        for item in &items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
            }
        }

        state.order_items.insert(order.id, items);
        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let state = self.state.read().await;
        Ok(state.order_items.get(&id).cloned().unwrap_or_default())
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
    ) -> Result<Vec<OrderRecord>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .filter(|o| {
                filter
                    .status
                    .as_deref()
                    .is_none_or(|status| o.status == status)
            })
            .cloned()
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0) as usize;
        let orders: Vec<_> = orders.into_iter().skip(offset).collect();

        let orders = if let Some(limit) = filter.limit {
            orders.into_iter().take(limit as usize).collect()
        } else {
            orders
        };

        Ok(orders)
    }

    async fn transition_order(
        &self,
        id: OrderId,
        to: &str,
        allowed_from: &[&str],
        restock: &[StockAdjustment],
    ) -> Result<bool> {
        let mut state = self.state.write().await;

        match state.orders.get_mut(&id) {
            Some(order) if allowed_from.contains(&order.status.as_str()) => {
                order.status = to.to_string();
            }
            _ => return Ok(false),
        }

        for adjustment in restock {
            if let Some(product) = state.products.get_mut(&adjustment.product_id) {
                product.stock += adjustment.quantity;
            }
        }

        Ok(true)
    }
}
