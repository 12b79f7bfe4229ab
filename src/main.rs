use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use payment_router::app::config::Config;
use payment_router::handlers;
use payment_router::queue::payment_queue::PaymentQueue;
use payment_router::services::circuit_breaker::BreakerPair;
use payment_router::services::health_monitor::HealthMonitor;
use payment_router::services::router::ProcessorRouter;
use payment_router::services::store::{MemoryStore, Storage};
use payment_router::services::worker_pool::WorkerPool;
use payment_router::services::{PaymentProcessorClient, PaymentService};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    info!(
        port = config.server_port,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        "starting payment router"
    );

    let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
    let client = Arc::new(PaymentProcessorClient::new(&config));
    let breakers = Arc::new(BreakerPair::new(
        config.circuit_breaker_threshold,
        Duration::from_secs(config.circuit_breaker_timeout_secs),
        config.circuit_breaker_reset_threshold,
    ));
    let health = Arc::new(HealthMonitor::new());
    let processor_router = Arc::new(ProcessorRouter::new(health.clone(), breakers.clone()));
    let queue = Arc::new(PaymentQueue::new(config.queue_capacity));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.monitor_health {
        HealthMonitor::spawn(health, client.clone(), shutdown_rx.clone());
    }

    let pool = Arc::new(WorkerPool::new(
        queue.clone(),
        store.clone(),
        client.clone(),
        processor_router,
        breakers,
        config.workers,
    ));
    WorkerPool::spawn(pool, shutdown_rx);

    let service = Arc::new(PaymentService::new(queue, store, client));

    let app = Router::new()
        .route("/payments", post(handlers::payments::create_payment))
        .route(
            "/payments-summary",
            get(handlers::payments_summary::get_summary),
        )
        .route("/purge-payments", post(handlers::purge::purge_payments))
        .with_state(service);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server port");
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("server error");
}
