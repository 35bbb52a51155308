use async_trait::async_trait;
use common::{CartId, CartItemId, OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItemRecord, CartRecord, OrderFilter, OrderItemRecord, OrderRecord, ProductRecord, Result,
    StockAdjustment, StoreError, store::ShopStore,
};

/// PostgreSQL-backed store implementation.
///
/// The checkout commit and the cancel-with-restock transition each run in a
/// single transaction, with stock movements expressed as guarded conditional
/// updates (`... SET stock = stock - $q WHERE stock >= $q`, affected rows
/// checked) so concurrent reservations serialize at the row level.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price_cents: row.try_get("price_cents")?,
            stock: row.try_get::<i32, _>("stock")? as u32,
            active: row.try_get("active")?,
        })
    }

    fn row_to_cart(row: PgRow) -> Result<CartRecord> {
        Ok(CartRecord {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_cart_item(row: PgRow) -> Result<CartItemRecord> {
        Ok(CartItemRecord {
            id: CartItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            created_at: row.try_get("created_at")?,
            total_cents: row.try_get("total_cents")?,
            status: row.try_get("status")?,
            payment_method: row.try_get("payment_method")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price_cents: row.try_get("unit_price_cents")?,
            subtotal_cents: row.try_get("subtotal_cents")?,
        })
    }
}

#[async_trait]
impl ShopStore for PostgresStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                active = EXCLUDED.active
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock as i32)
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock, active FROM products WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<ProductRecord>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query(
            "SELECT id, name, price_cents, stock, active FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn set_product_active(&self, id: &ProductId, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reserve_stock(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $1
            WHERE id = $2 AND active = TRUE AND stock >= $1
            "#,
        )
        .bind(quantity as i32)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_stock(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
            .bind(quantity as i32)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<CartRecord> {
        // The unique index on carts.user_id makes concurrent first accesses
        // converge on one row; the losing insert is a no-op.
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id, user_id, created_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Self::row_to_cart(row)
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_item).collect()
    }

    async fn cart_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItemRecord>> {
        let row = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE id = $1 AND cart_id = $2",
        )
        .bind(item_id.as_uuid())
        .bind(cart_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart_item).transpose()
    }

    async fn cart_item_for_product(
        &self,
        cart_id: CartId,
        product_id: &ProductId,
    ) -> Result<Option<CartItemRecord>> {
        let row = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart_item).transpose()
    }

    async fn insert_cart_item(&self, item: CartItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(item.quantity as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_cart_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<bool> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $1 WHERE id = $2")
            .bind(quantity as i32)
            .bind(item_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_item(&self, item_id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_cart_items_for_products(
        &self,
        cart_id: CartId,
        product_ids: &[ProductId],
    ) -> Result<u64> {
        let ids: Vec<String> = product_ids
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();

        let result =
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = ANY($2)")
                .bind(cart_id.as_uuid())
                .bind(&ids)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn commit_order(&self, order: OrderRecord, items: Vec<OrderItemRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Guarded decrement per line. Zero affected rows means the guard
        // failed; dropping the transaction rolls back everything, including
        // decrements already applied for earlier lines.
        for item in &items {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $1
                WHERE id = $2 AND active = TRUE AND stock >= $1
                "#,
            )
            .bind(item.quantity as i32)
            .bind(item.product_id.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(product_id = %item.product_id, "stock guard rejected checkout line");
                return Err(StoreError::StockConflict {
                    product_id: item.product_id.clone(),
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, created_at, total_cents, status, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.created_at)
        .bind(order.total_cents)
        .bind(&order.status)
        .bind(&order.payment_method)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(item.quantity as i32)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, created_at, total_cents, status, payment_method FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn order_items(&self, id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn orders_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
    ) -> Result<Vec<OrderRecord>> {
        let mut sql = String::from(
            "SELECT id, user_id, created_at, total_cents, status, payment_method FROM orders WHERE user_id = $1",
        );
        let mut param_count = 1;

        if filter.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC");

        if filter.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if filter.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut query = sqlx::query(&sql).bind(user_id.as_uuid());
        if let Some(ref status) = filter.status {
            query = query.bind(status);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            query = query.bind(offset as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn transition_order(
        &self,
        id: OrderId,
        to: &str,
        allowed_from: &[&str],
        restock: &[StockAdjustment],
    ) -> Result<bool> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.to_string()).collect();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = ANY($3)")
            .bind(to)
            .bind(id.as_uuid())
            .bind(&allowed)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Status guard lost; rollback by dropping the transaction.
            tracing::debug!(order_id = %id, to, "status guard rejected transition");
            return Ok(false);
        }

        for adjustment in restock {
            sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
                .bind(adjustment.quantity as i32)
                .bind(adjustment.product_id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
