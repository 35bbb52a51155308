//! End-to-end domain tests: checkout, cancellation and inventory
//! consistency over the in-memory store.

use common::{Principal, ProductId, UserId};
use domain::{
    CartService, Money, OrderLineRequest, OrderListQuery, OrderService, OrderStatus, ShopError,
};
use store::{InMemoryStore, ProductRecord, ShopStore};

async fn seed(store: &InMemoryStore, products: &[(&str, i64, u32)]) {
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
}

async fn stock_of(store: &InMemoryStore, id: &str) -> u32 {
    store
        .product(&ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .stock
}

fn request(id: &str, quantity: u32) -> OrderLineRequest {
    OrderLineRequest {
        product_id: ProductId::new(id),
        quantity,
    }
}

#[tokio::test]
async fn checkout_freezes_total_and_reserves_stock() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(user, vec![request("CHOC", 3)], None)
        .await
        .unwrap();

    assert_eq!(order.total, Money::from_cents(3000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(stock_of(&store, "CHOC").await, 2);
}

#[tokio::test]
async fn cancelling_a_fresh_order_restores_stock() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(user, vec![request("CHOC", 3)], None)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, "CHOC").await, 2);

    let cancelled = service
        .cancel(Principal::customer(user), order.id)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, "CHOC").await, 5);
}

#[tokio::test]
async fn checkout_and_cancel_are_net_zero_across_products() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5), ("OAT", 700, 8), ("GINGER", 450, 3)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(
            user,
            vec![request("CHOC", 2), request("OAT", 5), request("GINGER", 3)],
            None,
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&store, "CHOC").await, 3);
    assert_eq!(stock_of(&store, "OAT").await, 3);
    assert_eq!(stock_of(&store, "GINGER").await, 0);

    service
        .cancel(Principal::customer(user), order.id)
        .await
        .unwrap();

    assert_eq!(stock_of(&store, "CHOC").await, 5);
    assert_eq!(stock_of(&store, "OAT").await, 8);
    assert_eq!(stock_of(&store, "GINGER").await, 3);
}

#[tokio::test]
async fn insufficient_stock_leaves_no_trace() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 2)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let result = service.checkout(user, vec![request("CHOC", 3)], None).await;

    assert!(matches!(
        result,
        Err(ShopError::InsufficientStock {
            requested: 3,
            available: 2,
            ..
        })
    ));
    assert_eq!(stock_of(&store, "CHOC").await, 2);
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn empty_checkout_is_rejected() {
    let store = InMemoryStore::new();
    let service = OrderService::new(store.clone());

    let result = service.checkout(UserId::new(), vec![], None).await;
    assert!(matches!(result, Err(ShopError::EmptyOrder)));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();
    let admin = Principal::admin(UserId::new());

    let order = service
        .checkout(user, vec![request("CHOC", 2)], None)
        .await
        .unwrap();
    service
        .update_status(admin, order.id, "shipped")
        .await
        .unwrap();

    let result = service.cancel(Principal::customer(user), order.id).await;
    assert!(matches!(
        result,
        Err(ShopError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        })
    ));

    // Status and stock are untouched.
    let reloaded = service
        .get_order(Principal::customer(user), order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, OrderStatus::Shipped);
    assert_eq!(stock_of(&store, "CHOC").await, 3);
}

#[tokio::test]
async fn cancelling_twice_is_rejected_without_stock_change() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(user, vec![request("CHOC", 2)], None)
        .await
        .unwrap();
    service
        .cancel(Principal::customer(user), order.id)
        .await
        .unwrap();
    assert_eq!(stock_of(&store, "CHOC").await, 5);

    let result = service.cancel(Principal::customer(user), order.id).await;
    assert!(matches!(result, Err(ShopError::AlreadyCancelled { .. })));
    assert_eq!(stock_of(&store, "CHOC").await, 5);
}

#[tokio::test]
async fn order_totals_stay_frozen_after_a_price_change() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 10)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(user, vec![request("CHOC", 2)], None)
        .await
        .unwrap();

    // Reprice the product after the order committed.
    seed(&store, &[("CHOC", 2500, 8)]).await;

    let reloaded = service
        .get_order(Principal::customer(user), order.id)
        .await
        .unwrap();

    assert_eq!(reloaded.total, Money::from_cents(2000));
    assert_eq!(reloaded.items[0].unit_price, Money::from_cents(1000));
    assert_eq!(reloaded.items[0].subtotal, Money::from_cents(2000));
    assert_eq!(
        reloaded.total,
        reloaded.items.iter().map(|i| i.subtotal).sum()
    );
}

#[tokio::test]
async fn concurrent_checkouts_over_the_last_unit_admit_exactly_one() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 1)]).await;
    let service = OrderService::new(store.clone());

    let (a, b) = tokio::join!(
        service.checkout(UserId::new(), vec![request("CHOC", 1)], None),
        service.checkout(UserId::new(), vec![request("CHOC", 1)], None),
    );

    let successes = a.is_ok() as usize + b.is_ok() as usize;
    assert_eq!(successes, 1);

    for result in [a, b] {
        if let Err(error) = result {
            assert!(matches!(error, ShopError::InsufficientStock { .. }));
        }
    }

    assert_eq!(stock_of(&store, "CHOC").await, 0);
    assert_eq!(store.order_count().await, 1);
}

#[tokio::test]
async fn stock_never_goes_negative_under_interleaved_checkouts_and_cancels() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 4)]).await;
    let service = OrderService::new(store.clone());

    let mut successes = 0;
    for _ in 0..6 {
        let user = UserId::new();
        if let Ok(order) = service.checkout(user, vec![request("CHOC", 2)], None).await {
            // Cancel every other successful order to interleave restocks.
            if successes % 2 == 0 {
                service
                    .cancel(Principal::customer(user), order.id)
                    .await
                    .unwrap();
            }
            successes += 1;
        }
        assert!(stock_of(&store, "CHOC").await <= 4);
    }
}

#[tokio::test]
async fn checkout_clears_purchased_lines_from_the_cart() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 10), ("OAT", 700, 10)]).await;
    let carts = CartService::new(store.clone());
    let orders = OrderService::new(store.clone());
    let user = UserId::new();

    carts
        .add_item(user, ProductId::new("CHOC"), 2)
        .await
        .unwrap();
    carts
        .add_item(user, ProductId::new("OAT"), 1)
        .await
        .unwrap();

    orders
        .checkout(user, vec![request("CHOC", 2)], None)
        .await
        .unwrap();

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].product.id, ProductId::new("OAT"));
}

#[tokio::test]
async fn admin_can_cancel_a_customers_order() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();

    let order = service
        .checkout(user, vec![request("CHOC", 2)], None)
        .await
        .unwrap();

    let cancelled = service
        .cancel(Principal::admin(UserId::new()), order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, "CHOC").await, 5);
}

#[tokio::test]
async fn strangers_cannot_cancel_or_read_an_order() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());

    let order = service
        .checkout(UserId::new(), vec![request("CHOC", 1)], None)
        .await
        .unwrap();

    let stranger = Principal::customer(UserId::new());
    assert!(matches!(
        service.cancel(stranger, order.id).await,
        Err(ShopError::OrderNotFound { .. })
    ));
    assert!(matches!(
        service.get_order(stranger, order.id).await,
        Err(ShopError::OrderNotFound { .. })
    ));

    // The failed attempts changed nothing.
    assert_eq!(stock_of(&store, "CHOC").await, 4);
}

#[tokio::test]
async fn listing_orders_filters_by_status_and_paginates() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 100)]).await;
    let service = OrderService::new(store.clone());
    let user = UserId::new();
    let principal = Principal::customer(user);

    for _ in 0..3 {
        service
            .checkout(user, vec![request("CHOC", 1)], None)
            .await
            .unwrap();
    }
    let victim = service
        .checkout(user, vec![request("CHOC", 1)], None)
        .await
        .unwrap();
    service.cancel(principal, victim.id).await.unwrap();

    let all = service
        .list_orders(principal, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 4);

    let pending = service
        .list_orders(
            principal,
            OrderListQuery {
                status: Some("pending".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|o| o.status == OrderStatus::Pending));

    let page = service
        .list_orders(
            principal,
            OrderListQuery {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn deactivated_products_cannot_be_checked_out() {
    let store = InMemoryStore::new();
    seed(&store, &[("CHOC", 1000, 5)]).await;
    let service = OrderService::new(store.clone());

    store
        .set_product_active(&ProductId::new("CHOC"), false)
        .await
        .unwrap();

    let result = service
        .checkout(UserId::new(), vec![request("CHOC", 1)], None)
        .await;
    assert!(matches!(result, Err(ShopError::ProductUnavailable { .. })));
    assert_eq!(stock_of(&store, "CHOC").await, 5);
}
