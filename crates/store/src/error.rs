use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the shop store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A guarded stock decrement affected no rows: the product vanished, was
    /// deactivated, or its remaining stock no longer covers the requested
    /// quantity. The enclosing transaction has been rolled back.
    #[error("stock reservation failed for product {product_id}")]
    StockConflict { product_id: ProductId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
