//! Cart aggregate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::{CartId, CartItemId, ProductId, UserId};
use serde::Serialize;
use store::{CartItemRecord, ShopStore};
use tokio::sync::Mutex as AsyncMutex;

use crate::{
    error::ShopError,
    money::Money,
    product::{Catalog, Product},
};

/// One cart line joined with its current catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Line total at the product's current price.
    pub fn line_total(&self) -> Money {
        self.product.price.multiply(self.quantity)
    }
}

/// A user's cart with its lines resolved against the live catalog.
///
/// `total` and `item_count` are derived on read, never persisted, so they
/// always reflect the latest product prices.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

impl CartView {
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// Cart operations for a user.
///
/// Mutations for the same user are serialized through a per-user lock so a
/// double-submitted request cannot produce lost updates; the stock itself is
/// only reserved at checkout, never here.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    catalog: Catalog<S>,
    locks: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl<S: ShopStore + Clone> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            store,
            locks: Arc::default(),
        }
    }

    fn user_lock(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(user_id).or_default().clone()
    }

    /// Returns the user's active cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, ShopError> {
        let cart = self.store.get_or_create_cart(user_id).await?;
        self.build_view(cart.id, cart.user_id).await
    }

    /// Adds a product to the cart, merging with an existing line.
    ///
    /// The combined quantity is checked against current stock; on failure the
    /// existing line is left unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, ShopError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if quantity == 0 {
            return Err(ShopError::InvalidQuantity { quantity });
        }

        let product = self
            .catalog
            .find_by_id(&product_id)
            .await?
            .filter(Product::is_sellable)
            .ok_or_else(|| ShopError::ProductUnavailable {
                product_id: product_id.clone(),
            })?;

        let cart = self.store.get_or_create_cart(user_id).await?;
        let existing = self.store.cart_item_for_product(cart.id, &product_id).await?;

        let combined = existing.as_ref().map_or(quantity, |i| i.quantity + quantity);
        if combined > product.stock {
            return Err(ShopError::InsufficientStock {
                product_id,
                requested: combined,
                available: product.stock,
            });
        }

        match existing {
            Some(item) => {
                self.store.set_cart_item_quantity(item.id, combined).await?;
            }
            None => {
                self.store
                    .insert_cart_item(CartItemRecord {
                        id: CartItemId::new(),
                        cart_id: cart.id,
                        product_id,
                        quantity,
                    })
                    .await?;
            }
        }

        self.build_view(cart.id, user_id).await
    }

    /// Overwrites a line's quantity.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartView, ShopError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if quantity == 0 {
            return Err(ShopError::InvalidQuantity { quantity });
        }

        let cart = self.store.get_or_create_cart(user_id).await?;
        let item = self
            .store
            .cart_item(cart.id, item_id)
            .await?
            .ok_or(ShopError::ItemNotFound { item_id })?;

        let product = self
            .catalog
            .find_by_id(&item.product_id)
            .await?
            .filter(Product::is_sellable)
            .ok_or_else(|| ShopError::ProductUnavailable {
                product_id: item.product_id.clone(),
            })?;

        if quantity > product.stock {
            return Err(ShopError::InsufficientStock {
                product_id: item.product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        if !self.store.set_cart_item_quantity(item_id, quantity).await? {
            return Err(ShopError::ItemNotFound { item_id });
        }

        self.build_view(cart.id, user_id).await
    }

    /// Removes a line from the cart. Removing an absent line is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartView, ShopError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let cart = self.store.get_or_create_cart(user_id).await?;
        if self.store.cart_item(cart.id, item_id).await?.is_some() {
            self.store.delete_cart_item(item_id).await?;
        }

        self.build_view(cart.id, user_id).await
    }

    /// Removes every line from the cart. Clearing an empty cart is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, ShopError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let cart = self.store.get_or_create_cart(user_id).await?;
        self.store.clear_cart(cart.id).await?;

        self.build_view(cart.id, user_id).await
    }

    async fn build_view(&self, cart_id: CartId, user_id: UserId) -> Result<CartView, ShopError> {
        let items = self.store.cart_items(cart_id).await?;

        let ids: Vec<ProductId> = items.iter().map(|i| i.product_id.clone()).collect();
        let products: HashMap<ProductId, Product> = self
            .catalog
            .find_many_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        // A line whose product row vanished is unusable; it is dropped from
        // the view rather than priced at a stale value.
        let lines = items
            .into_iter()
            .filter_map(|item| {
                products.get(&item.product_id).map(|product| CartLine {
                    item_id: item.id,
                    product: product.clone(),
                    quantity: item.quantity,
                })
            })
            .collect();

        Ok(CartView {
            id: cart_id,
            user_id,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{InMemoryStore, ProductRecord};

    async fn service_with(
        products: &[(&str, i64, u32)],
    ) -> (CartService<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        for &(id, price_cents, stock) in products {
            store
                .upsert_product(ProductRecord {
                    id: ProductId::new(id),
                    name: format!("Cookie {id}"),
                    price_cents,
                    stock,
                    active: true,
                })
                .await
                .unwrap();
        }
        (CartService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_access_creates_an_empty_cart() {
        let (service, _store) = service_with(&[]).await;
        let user = UserId::new();

        let cart = service.get_cart(user).await.unwrap();
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total(), Money::zero());
        assert_eq!(cart.item_count(), 0);

        let again = service.get_cart(user).await.unwrap();
        assert_eq!(cart.id, again.id);
    }

    #[tokio::test]
    async fn add_item_merges_quantities() {
        let (service, _store) = service_with(&[("CHOC", 1000, 10)]).await;
        let user = UserId::new();

        service
            .add_item(user, ProductId::new("CHOC"), 2)
            .await
            .unwrap();
        let cart = service
            .add_item(user, ProductId::new("CHOC"), 3)
            .await
            .unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.total(), Money::from_cents(5000));
        assert_eq!(cart.item_count(), 5);
    }

    #[tokio::test]
    async fn add_item_combined_quantity_respects_stock() {
        // Stock 3: first add of 2 fits, second add of 2 would make 4.
        let (service, _store) = service_with(&[("CHOC", 1000, 3)]).await;
        let user = UserId::new();

        service
            .add_item(user, ProductId::new("CHOC"), 2)
            .await
            .unwrap();

        let result = service.add_item(user, ProductId::new("CHOC"), 2).await;
        assert!(matches!(
            result,
            Err(ShopError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            })
        ));

        // The old line is unchanged.
        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn add_unknown_or_inactive_product_fails() {
        let (service, _store) = service_with(&[("CHOC", 1000, 3)]).await;
        let user = UserId::new();

        let result = service.add_item(user, ProductId::new("NOPE"), 1).await;
        assert!(matches!(result, Err(ShopError::ProductUnavailable { .. })));

        let result = service.add_item(user, ProductId::new("CHOC"), 0).await;
        assert!(matches!(result, Err(ShopError::InvalidQuantity { .. })));
    }

    #[tokio::test]
    async fn update_item_overwrites_quantity() {
        let (service, _store) = service_with(&[("CHOC", 1000, 10)]).await;
        let user = UserId::new();

        let cart = service
            .add_item(user, ProductId::new("CHOC"), 2)
            .await
            .unwrap();
        let item_id = cart.lines[0].item_id;

        let cart = service.update_item(user, item_id, 7).await.unwrap();
        assert_eq!(cart.lines[0].quantity, 7);

        let result = service.update_item(user, item_id, 11).await;
        assert!(matches!(result, Err(ShopError::InsufficientStock { .. })));

        let result = service.update_item(user, item_id, 0).await;
        assert!(matches!(result, Err(ShopError::InvalidQuantity { .. })));
    }

    #[tokio::test]
    async fn update_item_in_another_users_cart_is_not_found() {
        let (service, _store) = service_with(&[("CHOC", 1000, 10)]).await;
        let owner = UserId::new();
        let intruder = UserId::new();

        let cart = service
            .add_item(owner, ProductId::new("CHOC"), 2)
            .await
            .unwrap();
        let item_id = cart.lines[0].item_id;

        let result = service.update_item(intruder, item_id, 1).await;
        assert!(matches!(result, Err(ShopError::ItemNotFound { .. })));

        // And the owner's line is untouched.
        let cart = service.get_cart(owner).await.unwrap();
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn remove_item_is_idempotent() {
        let (service, _store) = service_with(&[("CHOC", 1000, 10)]).await;
        let user = UserId::new();

        let cart = service
            .add_item(user, ProductId::new("CHOC"), 2)
            .await
            .unwrap();
        let item_id = cart.lines[0].item_id;

        let cart = service.remove_item(user, item_id).await.unwrap();
        assert!(cart.lines.is_empty());

        // Second removal is a no-op, not an error.
        let cart = service.remove_item(user, item_id).await.unwrap();
        assert!(cart.lines.is_empty());
    }

    #[tokio::test]
    async fn clear_empties_the_cart() {
        let (service, _store) = service_with(&[("CHOC", 1000, 10), ("OAT", 500, 10)]).await;
        let user = UserId::new();

        service
            .add_item(user, ProductId::new("CHOC"), 1)
            .await
            .unwrap();
        service
            .add_item(user, ProductId::new("OAT"), 2)
            .await
            .unwrap();

        let cart = service.clear(user).await.unwrap();
        assert!(cart.lines.is_empty());

        let cart = service.clear(user).await.unwrap();
        assert!(cart.lines.is_empty());
    }

    #[tokio::test]
    async fn totals_follow_the_current_product_price() {
        let (service, store) = service_with(&[("CHOC", 1000, 10)]).await;
        let user = UserId::new();

        service
            .add_item(user, ProductId::new("CHOC"), 2)
            .await
            .unwrap();

        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.total(), Money::from_cents(2000));

        // Reprice the product; the derived total follows on the next read.
        store
            .upsert_product(ProductRecord {
                id: ProductId::new("CHOC"),
                name: "Cookie CHOC".to_string(),
                price_cents: 1500,
                stock: 10,
                active: true,
            })
            .await
            .unwrap();

        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.total(), Money::from_cents(3000));
        assert_eq!(cart.item_count(), 2);
    }

}
