use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::ServerConfig;
use crate::monitor::PriceMonitor;
use crate::storage::PriceHistoryStore;

pub mod handlers;
pub mod responses;

pub use handlers::{
    add_product, check_product, dashboard_page, delete_product, export_history, health_check, list_products,
    product_history, product_stats, toggle_product, update_product_handler,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<PriceMonitor>,
    pub history: PriceHistoryStore,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/product/add", post(add_product))
        .route("/product/update", post(update_product_handler))
        .route("/product/toggle", post(toggle_product))
        .route("/product/delete", post(delete_product))
        .route("/product/check", post(check_product))
        .route("/product/history", get(product_history))
        .route("/product/stats", get(product_stats))
        .route("/history/export", get(export_history))
}

pub async fn serve<F>(config: &ServerConfig, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Dashboard listening on http://{}:{}", config.host, config.port);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
