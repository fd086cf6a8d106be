//! StockCloud backend
//!
//! Inventory and sales service for a small retail business: catalog, stock
//! movements, replenishment orders, incidents and cached dashboard summaries.

use std::sync::Arc;

use axum::{routing::get, Router};
use shared::BusinessClock;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use cache::ReadThroughCache;
use store::Store;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: ReadThroughCache,
    pub config: Arc<Config>,
    pub clock: BusinessClock,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache, config: Config) -> Self {
        let clock = config.business.clock();
        Self {
            store,
            cache,
            config: Arc::new(config),
            clock,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "StockCloud Inventory API v1.0"
}
