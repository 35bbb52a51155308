//! API server entry point.

use api::config::Config;
use store::{InMemoryStore, ProductRecord, ShopStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds the demo catalog served by the in-memory store.
async fn seed_demo_catalog(store: &InMemoryStore) {
    let cookies = [
        ("CHOC-CHIP", "Chocolate chip cookie", 5500, 50),
        ("DOUBLE-CHOC", "Double chocolate cookie", 6000, 40),
        ("OATMEAL", "Oatmeal raisin cookie", 4800, 35),
        ("GINGER", "Ginger snap cookie", 4500, 60),
        ("LEMON", "Lemon glaze cookie", 5200, 25),
        ("SNICKERDOODLE", "Snickerdoodle", 5000, 45),
    ];

    for (id, name, price_cents, stock) in cookies {
        store
            .upsert_product(ProductRecord {
                id: id.into(),
                name: name.to_string(),
                price_cents,
                stock,
                active: true,
            })
            .await
            .expect("failed to seed catalog");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create the store and application state
    let store = InMemoryStore::new();
    if config.seed_demo_catalog {
        seed_demo_catalog(&store).await;
    }
    let state = api::create_default_state(store);

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
