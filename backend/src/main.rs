//! StockCloud - Backend Server
//!
//! Inventory, sales and replenishment management for a small retail store.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcloud_backend::{
    cache::{CacheStore, InMemoryCache, ReadThroughCache, RedisCache},
    create_app,
    store::PgStore,
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stockcloud_server=debug,stockcloud_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting StockCloud Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    // Cache backend
    let cache_store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => {
            tracing::info!("Connecting to Redis cache...");
            Arc::new(RedisCache::connect(url).await?)
        }
        None => {
            tracing::warn!("No Redis URL configured, using in-process cache");
            Arc::new(InMemoryCache::new())
        }
    };
    let cache = ReadThroughCache::new(
        cache_store,
        Duration::from_secs(config.cache.ttl_seconds),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    // Create application state
    let state = AppState::new(Arc::new(PgStore::new(db_pool)), cache, config);

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
