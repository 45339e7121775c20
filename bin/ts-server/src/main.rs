//! Turnstile reservation server
//!
//! Seeds the seat counter, starts the single reservation worker, and
//! serves the HTTP API.
//!
//! Backends are selected at startup:
//! - `TURNSTILE_STORE`: `redis` (default) or `memory`
//! - `TURNSTILE_QUEUE`: `memory` (default, embedded) or `redis`

use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ts_api::{create_router, AppState};
use ts_common::{QueueConfig, StoreConfig};
use ts_queue::{InMemoryTaskQueue, RedisTaskQueue, TaskConsumer, TaskPublisher};
use ts_store::{MemorySeatStore, RedisSeatStore, SeatQuery, SeatStore};
use ts_worker::{
    AdmissionGate, LifecycleConfig, LifecycleManager, ReservationProcessor, ReservationService,
    TaskRegistry, WorkerRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting Turnstile reservation server");

    let server_config = load_server_config();
    let store_config = load_store_config();
    let queue_config = load_queue_config();

    // 1. Counter store, seeded with the starting inventory. This is the
    //    only write not performed by the worker.
    let store: Arc<dyn SeatStore> = match server_config.store_backend.as_str() {
        "memory" => {
            warn!("Using in-memory counter store; the count will not survive a restart");
            Arc::new(MemorySeatStore::new(&store_config.seats_key))
        }
        _ => Arc::new(
            RedisSeatStore::connect(&store_config.redis_url, &store_config.seats_key).await?,
        ),
    };
    store.write_seats(server_config.initial_seats).await?;
    info!(
        store = %store.identifier(),
        seats = server_config.initial_seats,
        "Seat counter seeded"
    );

    // 2. Task queue
    let (publisher, consumer): (Arc<dyn TaskPublisher>, Arc<dyn TaskConsumer>) =
        match server_config.queue_backend.as_str() {
            "redis" => {
                let queue = Arc::new(
                    RedisTaskQueue::connect(&store_config.redis_url, &queue_config).await?,
                );
                let recovered = queue.recover().await?;
                if recovered > 0 {
                    warn!(recovered = recovered, "Recovered in-flight tasks from a previous run");
                }
                (queue.clone(), queue)
            }
            _ => {
                let queue = Arc::new(InMemoryTaskQueue::new("reservations"));
                (queue.clone(), queue)
            }
        };

    // 3. Admission-control core
    let gate = Arc::new(AdmissionGate::new());
    let registry = Arc::new(TaskRegistry::new(server_config.registry_retention_secs));
    let query = SeatQuery::new(store.clone());
    let processor = Arc::new(ReservationProcessor::new(
        store,
        gate.clone(),
        registry.clone(),
    ));

    // The worker is registered exactly once, here. The /process endpoint
    // only reports on it.
    let runner = Arc::new(WorkerRunner::new(
        consumer,
        processor,
        registry.clone(),
    ));
    runner.start();

    let lifecycle = LifecycleManager::start(registry.clone(), LifecycleConfig::default());

    let reservations = Arc::new(ReservationService::new(
        publisher,
        gate.clone(),
        registry.clone(),
    ));

    // 4. HTTP API
    let state = AppState {
        query,
        reservations,
        registry,
        gate,
        runner: runner.clone(),
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", server_config.port);
    info!(port = server_config.port, "Starting HTTP API server");

    let listener = TcpListener::bind(&addr).await?;
    let server_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    info!("Turnstile started. Press Ctrl+C to shutdown.");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    lifecycle.shutdown().await;
    runner.shutdown().await;
    server_task.abort();

    info!("Turnstile shutdown complete");
    Ok(())
}

struct ServerConfig {
    port: u16,
    initial_seats: u64,
    store_backend: String,
    queue_backend: String,
    registry_retention_secs: u64,
}

/// Load server configuration from environment variables
fn load_server_config() -> ServerConfig {
    let port = std::env::var("TURNSTILE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1245);

    let initial_seats = std::env::var("TURNSTILE_INITIAL_SEATS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50);

    let store_backend = std::env::var("TURNSTILE_STORE")
        .unwrap_or_else(|_| "redis".to_string());

    let queue_backend = std::env::var("TURNSTILE_QUEUE")
        .unwrap_or_else(|_| "memory".to_string());

    let registry_retention_secs = std::env::var("TURNSTILE_REGISTRY_RETENTION_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);

    ServerConfig {
        port,
        initial_seats,
        store_backend,
        queue_backend,
        registry_retention_secs,
    }
}

/// Load counter store configuration from environment variables
fn load_store_config() -> StoreConfig {
    let defaults = StoreConfig::default();

    StoreConfig {
        redis_url: std::env::var("TURNSTILE_REDIS_URL").unwrap_or(defaults.redis_url),
        seats_key: std::env::var("TURNSTILE_SEATS_KEY").unwrap_or(defaults.seats_key),
    }
}

/// Load task queue configuration from environment variables
fn load_queue_config() -> QueueConfig {
    let defaults = QueueConfig::default();

    QueueConfig {
        key_prefix: std::env::var("TURNSTILE_QUEUE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
