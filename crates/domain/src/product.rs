//! Catalog product views.

use common::ProductId;
use serde::{Deserialize, Serialize};
use store::{ProductRecord, ShopStore};

use crate::{error::ShopError, money::Money};

/// A catalog product as the domain sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

impl Product {
    /// Returns true if the product can currently be sold.
    pub fn is_sellable(&self) -> bool {
        self.active && self.price.is_positive()
    }
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            price: Money::from_cents(record.price_cents),
            stock: record.stock,
            active: record.active,
        }
    }
}

/// Read-only product lookup over the store.
///
/// The cart and checkout paths consult the catalog for current price, stock
/// and availability; they never mutate it.
#[derive(Clone)]
pub struct Catalog<S> {
    store: S,
}

impl<S: ShopStore> Catalog<S> {
    /// Creates a catalog over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads a product by id.
    pub async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, ShopError> {
        Ok(self.store.product(id).await?.map(Product::from))
    }

    /// Loads the products matching `ids`; missing ids are absent from the
    /// result.
    pub async fn find_many_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, ShopError> {
        Ok(self
            .store
            .products(ids)
            .await?
            .into_iter()
            .map(Product::from)
            .collect())
    }
}
