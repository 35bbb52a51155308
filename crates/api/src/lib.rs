//! HTTP API server for the cookie-shop order/inventory service.
//!
//! Exposes the cart and order endpoints over axum, with structured logging
//! (tracing) and Prometheus metrics. Identity is consumed from trusted
//! headers set by an upstream auth gateway; see [`auth`].

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{CartService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::ShopStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub store: S,
}

/// Creates the application state over the given store.
pub fn create_default_state<S: ShopStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        store,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ShopStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/add", post(routes::cart::add::<S>))
        .route("/cart/items/{id}", put(routes::cart::update_item::<S>))
        .route("/cart/items/{id}", delete(routes::cart::remove_item::<S>))
        .route("/cart/clear", delete(routes::cart::clear::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
