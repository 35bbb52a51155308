//! Inventory ledger: guarded stock reservation and release.

use common::ProductId;
use store::ShopStore;

use crate::error::ShopError;

/// Owns stock movements for single products.
///
/// `reserve` is linearizable per product: the store performs the decrement as
/// one conditional update, so two concurrent reservations over the last unit
/// cannot both succeed. The checkout commit and cancellation restock apply
/// the same guarded updates inside their own transactions; this ledger is the
/// standalone surface for targeted stock movements.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: ShopStore> InventoryLedger<S> {
    /// Creates a ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reserves `quantity` units of a product by decrementing live stock.
    ///
    /// Fails with `ProductUnavailable` when the product is missing or
    /// inactive, and with `InsufficientStock` when the remaining stock does
    /// not cover the request.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<(), ShopError> {
        let product = self
            .store
            .product(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| ShopError::ProductUnavailable {
                product_id: product_id.clone(),
            })?;

        if self.store.reserve_stock(product_id, quantity).await? {
            return Ok(());
        }

        // The guard lost: either our read was stale or a concurrent reserve
        // got there first. Re-read for an accurate count in the error.
        let available = self
            .store
            .product(product_id)
            .await?
            .map(|p| p.stock)
            .unwrap_or(product.stock);

        Err(ShopError::InsufficientStock {
            product_id: product_id.clone(),
            requested: quantity,
            available,
        })
    }

    /// Releases `quantity` units back into stock.
    ///
    /// Trusted caller only: release is unconditional and is used where the
    /// original reservation is known to have occurred (restock on
    /// cancellation).
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), ShopError> {
        if !self.store.release_stock(product_id, quantity).await? {
            tracing::warn!(%product_id, quantity, "release for unknown product ignored");
        }
        Ok(())
    }
}
