//! Order aggregate and lifecycle operations.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{OrderId, Principal, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{
    OrderFilter, OrderItemRecord, OrderRecord, ShopStore, StockAdjustment, StoreError,
};

use crate::{
    checkout::{OrderLineRequest, plan_checkout},
    error::ShopError,
    money::Money,
    product::{Catalog, Product},
    status::OrderStatus,
};

/// One frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at order time, never recomputed.
    pub unit_price: Money,
    pub subtotal: Money,
}

/// An order as returned to callers. Everything except `status` is immutable
/// after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub items: Vec<OrderLineView>,
}

impl OrderView {
    fn from_records(
        record: OrderRecord,
        items: Vec<OrderItemRecord>,
    ) -> Result<Self, ShopError> {
        let status = parse_stored_status(&record.status)?;
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            created_at: record.created_at,
            total: Money::from_cents(record.total_cents),
            status,
            payment_method: record.payment_method,
            items: items
                .into_iter()
                .map(|item| OrderLineView {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: Money::from_cents(item.unit_price_cents),
                    subtotal: Money::from_cents(item.subtotal_cents),
                })
                .collect(),
        })
    }
}

/// Filter for listing the caller's orders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Order operations: checkout, lookup, lifecycle transitions, cancellation.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    catalog: Catalog<S>,
}

impl<S: ShopStore + Clone> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            store,
        }
    }

    /// Creates an order from the requested lines.
    ///
    /// Validates the request against the catalog state observed in a single
    /// pass, freezes prices and subtotals, then commits the order and the
    /// stock decrements as one transaction. On any failure nothing is
    /// written; a reservation lost to a concurrent checkout surfaces as
    /// `InsufficientStock` for the offending product.
    #[tracing::instrument(skip(self, items))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        items: Vec<OrderLineRequest>,
        payment_method: Option<String>,
    ) -> Result<OrderView, ShopError> {
        let start = Instant::now();
        let result = self.checkout_inner(user_id, items, payment_method).await;

        match &result {
            Ok(order) => {
                metrics::histogram!("checkout_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                metrics::counter!("checkouts_completed").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "order created");
            }
            Err(error) => {
                metrics::counter!("checkouts_rejected").increment(1);
                tracing::info!(%error, "checkout rejected");
            }
        }

        result
    }

    async fn checkout_inner(
        &self,
        user_id: UserId,
        items: Vec<OrderLineRequest>,
        payment_method: Option<String>,
    ) -> Result<OrderView, ShopError> {
        let mut ids: Vec<ProductId> = Vec::new();
        for item in &items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }

        let products: HashMap<ProductId, Product> = self
            .catalog
            .find_many_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let plan = plan_checkout(&products, &items)?;

        let order = OrderRecord {
            id: OrderId::new(),
            user_id,
            created_at: Utc::now(),
            total_cents: plan.total.cents(),
            status: OrderStatus::Pending.as_str().to_string(),
            payment_method,
        };

        let records: Vec<OrderItemRecord> = plan
            .lines
            .iter()
            .map(|line| OrderItemRecord {
                order_id: order.id,
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                subtotal_cents: line.subtotal.cents(),
            })
            .collect();

        match self.store.commit_order(order.clone(), records.clone()).await {
            Ok(()) => {}
            Err(StoreError::StockConflict { product_id }) => {
                // Validation passed but the guarded decrement lost a race.
                // Re-read so the error reflects what is true now.
                return Err(self.stock_conflict_error(&plan, product_id).await);
            }
            Err(other) => return Err(other.into()),
        }

        self.supersede_cart_lines(user_id, &plan).await;

        OrderView::from_records(order, records)
    }

    /// Maps a commit-time stock conflict to the caller-facing error kind.
    async fn stock_conflict_error(
        &self,
        plan: &crate::checkout::CheckoutPlan,
        product_id: ProductId,
    ) -> ShopError {
        let requested = plan
            .lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
            .unwrap_or(0);

        match self.catalog.find_by_id(&product_id).await {
            Ok(Some(product)) if product.active => ShopError::InsufficientStock {
                product_id,
                requested,
                available: product.stock,
            },
            Ok(_) => ShopError::ProductUnavailable { product_id },
            Err(error) => error,
        }
    }

    /// Clears the purchased products' lines from the user's cart. The order
    /// is already durable at this point, so a cleanup failure is only logged.
    async fn supersede_cart_lines(&self, user_id: UserId, plan: &crate::checkout::CheckoutPlan) {
        let purchased: Vec<ProductId> = plan
            .lines
            .iter()
            .map(|line| line.product_id.clone())
            .collect();

        let result = async {
            let cart = self.store.get_or_create_cart(user_id).await?;
            self.store
                .delete_cart_items_for_products(cart.id, &purchased)
                .await
        }
        .await;

        if let Err(error) = result {
            tracing::warn!(%user_id, %error, "failed to clear purchased lines from cart");
        }
    }

    /// Loads an order. Non-admin callers only see their own orders; a foreign
    /// order is reported as not found rather than forbidden.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        principal: Principal,
        order_id: OrderId,
    ) -> Result<OrderView, ShopError> {
        let record = self.load_visible(principal, order_id).await?;
        let items = self.store.order_items(order_id).await?;
        OrderView::from_records(record, items)
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(
        &self,
        principal: Principal,
        query: OrderListQuery,
    ) -> Result<Vec<OrderView>, ShopError> {
        let mut filter = OrderFilter::new();
        if let Some(ref value) = query.status {
            let status = parse_stored_status(value)?;
            filter = filter.status(status.as_str());
        }
        if let Some(limit) = query.limit {
            filter = filter.limit(limit);
        }
        if let Some(offset) = query.offset {
            filter = filter.offset(offset);
        }

        let records = self
            .store
            .orders_for_user(principal.user_id, filter)
            .await?;

        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            let items = self.store.order_items(record.id).await?;
            orders.push(OrderView::from_records(record, items)?);
        }
        Ok(orders)
    }

    /// Moves an order forward along the lifecycle chain (admin only).
    ///
    /// A `cancelled` target delegates to [`cancel`](Self::cancel), which is
    /// also open to the owning user and performs the restock.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        principal: Principal,
        order_id: OrderId,
        status_value: &str,
    ) -> Result<OrderView, ShopError> {
        let to = parse_stored_status(status_value)?;

        if to == OrderStatus::Cancelled {
            return self.cancel(principal, order_id).await;
        }

        if !principal.is_admin() {
            return Err(ShopError::AccessDenied);
        }

        let mut record = self
            .store
            .order(order_id)
            .await?
            .ok_or(ShopError::OrderNotFound { order_id })?;
        let from = parse_stored_status(&record.status)?;

        if !from.can_advance_to(to) {
            return Err(ShopError::InvalidTransition { from, to });
        }

        let moved = self
            .store
            .transition_order(order_id, to.as_str(), &[from.as_str()], &[])
            .await?;
        if !moved {
            return Err(ShopError::ConcurrencyConflict { order_id });
        }

        tracing::info!(%order_id, %from, %to, "order status updated");

        record.status = to.as_str().to_string();
        let items = self.store.order_items(order_id).await?;
        OrderView::from_records(record, items)
    }

    /// Cancels an order and releases its stock.
    ///
    /// Allowed for the owning user or an admin while the order is `pending`
    /// or `confirmed`. The status write and all stock increments commit
    /// together or not at all.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        principal: Principal,
        order_id: OrderId,
    ) -> Result<OrderView, ShopError> {
        let mut record = self.load_visible(principal, order_id).await?;
        let from = parse_stored_status(&record.status)?;

        if from == OrderStatus::Cancelled {
            return Err(ShopError::AlreadyCancelled { order_id });
        }
        if !from.can_cancel() {
            return Err(ShopError::InvalidTransition {
                from,
                to: OrderStatus::Cancelled,
            });
        }

        let items = self.store.order_items(order_id).await?;
        let restock: Vec<StockAdjustment> = items
            .iter()
            .map(|item| StockAdjustment {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect();

        let allowed = OrderStatus::cancellable();
        let allowed: Vec<&str> = allowed.iter().map(OrderStatus::as_str).collect();

        let cancelled = self
            .store
            .transition_order(
                order_id,
                OrderStatus::Cancelled.as_str(),
                &allowed,
                &restock,
            )
            .await?;

        if !cancelled {
            // The guard lost a race; report what the order looks like now.
            return Err(self.cancel_conflict_error(order_id).await);
        }

        metrics::counter!("orders_cancelled").increment(1);
        tracing::info!(%order_id, lines = items.len(), "order cancelled, stock released");

        record.status = OrderStatus::Cancelled.as_str().to_string();
        OrderView::from_records(record, items)
    }

    async fn cancel_conflict_error(&self, order_id: OrderId) -> ShopError {
        let record = match self.store.order(order_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return ShopError::OrderNotFound { order_id },
            Err(error) => return error.into(),
        };

        match OrderStatus::parse(&record.status) {
            Some(OrderStatus::Cancelled) => ShopError::AlreadyCancelled { order_id },
            Some(status) if !status.can_cancel() => ShopError::InvalidTransition {
                from: status,
                to: OrderStatus::Cancelled,
            },
            Some(_) => ShopError::ConcurrencyConflict { order_id },
            None => ShopError::UnknownStatus {
                value: record.status,
            },
        }
    }

    async fn load_visible(
        &self,
        principal: Principal,
        order_id: OrderId,
    ) -> Result<OrderRecord, ShopError> {
        let record = self
            .store
            .order(order_id)
            .await?
            .ok_or(ShopError::OrderNotFound { order_id })?;

        if !principal.is_admin() && record.user_id != principal.user_id {
            return Err(ShopError::OrderNotFound { order_id });
        }

        Ok(record)
    }
}

fn parse_stored_status(value: &str) -> Result<OrderStatus, ShopError> {
    OrderStatus::parse(value).ok_or_else(|| ShopError::UnknownStatus {
        value: value.to_string(),
    })
}
