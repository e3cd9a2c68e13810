use inventory_api::api::{create_router, AppState};
use inventory_api::config::{Settings, StoreBackend};
use inventory_api::idempotency::{
    IdempotencyConfig, IdempotencyGate, IdempotencyStore, IdempotencySweepJob,
    MemoryIdempotencyStore, RedisIdempotencyStore,
};
use inventory_api::observability::{init_logging, init_metrics, HealthChecker, LogConfig, LogFormat};
use inventory_api::repositories::{
    InMemoryInventory, ItemRepository, PgItemRepository, PgProductRepository, ProductRepository,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    let log_format = LogFormat::from(settings.application.log_format.as_str());
    init_logging(&LogConfig::new(settings.application.log_level.clone(), log_format));
    info!("Configuration loaded");

    let metrics_handle = init_metrics();

    // Repositories
    let (products, items, pool): (Arc<dyn ProductRepository>, Arc<dyn ItemRepository>, _) =
        if settings.uses_database() {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(settings.database.pool_size)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&settings.database.url)
                .await?;
            info!("Database connection established");

            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Migrations applied successfully");

            let products: Arc<dyn ProductRepository> = Arc::new(PgProductRepository::new(pool.clone()));
            let items: Arc<dyn ItemRepository> = Arc::new(PgItemRepository::new(pool.clone()));
            (products, items, Some(pool))
        } else {
            warn!("No database configured, using in-memory repositories");
            let inventory = Arc::new(InMemoryInventory::new());
            let products: Arc<dyn ProductRepository> = inventory.clone();
            let items: Arc<dyn ItemRepository> = inventory;
            (products, items, None)
        };

    // Idempotency store
    let idempotency = &settings.idempotency;
    let (store, redis_client): (Arc<dyn IdempotencyStore>, _) = match idempotency.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryIdempotencyStore::new());
            IdempotencySweepJob::new(store.clone(), idempotency.sweep_interval_seconds).start();
            info!("Using in-process idempotency store");
            (store as Arc<dyn IdempotencyStore>, None)
        }
        StoreBackend::Redis => {
            let client = redis::Client::open(settings.redis.url.as_str())?;
            let store = RedisIdempotencyStore::new(client.clone(), idempotency.key_prefix.clone());
            store.ping().await?;
            info!("Redis idempotency store connected");
            (Arc::new(store) as Arc<dyn IdempotencyStore>, Some(client))
        }
    };

    let gate = Arc::new(IdempotencyGate::new(store, IdempotencyConfig::from(idempotency)));
    if !gate.config().serialize_same_key {
        warn!("Same-key serialization disabled; concurrent retries may create duplicates");
    }

    let state = AppState::new(products, items, gate)
        .with_metrics(metrics_handle)
        .with_health_checker(Arc::new(HealthChecker::new(pool, redis_client)));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.application.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
