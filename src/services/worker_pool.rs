use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::models::payment::{PaymentRequest, ProcessorKind};
use crate::queue::payment_queue::{PaymentQueue, QueuedPayment};
use crate::services::circuit_breaker::BreakerPair;
use crate::services::payment_processor_client::{AttemptOutcome, PaymentProcessorClient};
use crate::services::router::ProcessorRouter;
use crate::services::store::{Reservation, Storage};
use crate::utils::money::amount_to_cents;

const MAX_REQUEUES: u32 = 5;
const REQUEUE_BACKOFF_MICROS: std::ops::RangeInclusive<u64> = 2_500..=3_500;
const STORE_RETRIES: u32 = 3;
const STORE_RETRY_JITTER_MICROS: std::ops::RangeInclusive<u64> = 50..=500;

pub struct WorkerPool {
    queue: Arc<PaymentQueue>,
    store: Arc<dyn Storage>,
    client: Arc<PaymentProcessorClient>,
    router: Arc<ProcessorRouter>,
    breakers: Arc<BreakerPair>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<PaymentQueue>,
        store: Arc<dyn Storage>,
        client: Arc<PaymentProcessorClient>,
        router: Arc<ProcessorRouter>,
        breakers: Arc<BreakerPair>,
        workers: usize,
    ) -> Self {
        Self {
            queue,
            store,
            client,
            router,
            breakers,
            workers,
        }
    }

    pub fn spawn(pool: Arc<WorkerPool>, shutdown: watch::Receiver<bool>) {
        info!(workers = pool.workers, "starting worker pool");
        for _ in 0..pool.workers {
            let pool = pool.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        item = pool.queue.dequeue() => match item {
                            Some(item) => pool.process(item).await,
                            None => break,
                        },
                        _ = shutdown.changed() => break,
                    }
                }
            });
        }
    }

    async fn process(&self, item: QueuedPayment) {
        let id = item.request.correlation_id.clone();

        match self.reserve_with_retry(&id).await {
            Some(Reservation::Duplicate) => {
                debug!(correlation_id = %id, "duplicate submission dropped");
                return;
            }
            Some(Reservation::Fresh) => {}
            None => {
                // Could not even claim the id; no upstream was contacted,
                // so the item can safely go around again.
                self.requeue(item).await;
                return;
            }
        }

        let plan = self.router.plan();
        for target in [plan.first, plan.second].into_iter().flatten() {
            match self.client.submit_payment(target, &item.request).await {
                AttemptOutcome::Accepted { requested_at } => {
                    self.breakers.get(target).on_success();
                    self.persist(target, &item.request, requested_at).await;
                    return;
                }
                AttemptOutcome::Rejected => {
                    // The upstream is alive, it just refuses this payment.
                    // Keep the claim so the id is never retried.
                    self.breakers.get(target).on_success();
                    return;
                }
                AttemptOutcome::Retryable => {
                    self.breakers.get(target).on_failure();
                }
            }
        }

        // Nothing succeeded and no record was written: the id must become
        // claimable again before the item goes back to the tail.
        self.store.release_correlation(&id);
        self.requeue(item).await;
    }

    async fn reserve_with_retry(&self, id: &str) -> Option<Reservation> {
        for attempt in 1..=STORE_RETRIES {
            match self.store.reserve_correlation(id) {
                Ok(reservation) => return Some(reservation),
                Err(e) if attempt < STORE_RETRIES => {
                    debug!(correlation_id = %id, error = %e, "store reservation retry");
                    tokio::time::sleep(jitter(STORE_RETRY_JITTER_MICROS)).await;
                }
                Err(e) => {
                    warn!(correlation_id = %id, error = %e, "store reservation failed");
                }
            }
        }
        None
    }

    async fn persist(
        &self,
        processor: ProcessorKind,
        request: &PaymentRequest,
        requested_at: chrono::DateTime<chrono::Utc>,
    ) {
        let amount_cents = amount_to_cents(request.amount);
        for attempt in 1..=STORE_RETRIES {
            match self.store.record_payment(
                processor,
                &request.correlation_id,
                amount_cents,
                requested_at,
            ) {
                Ok(()) => return,
                Err(e) if attempt < STORE_RETRIES => {
                    debug!(correlation_id = %request.correlation_id, error = %e, "store write retry");
                    tokio::time::sleep(jitter(STORE_RETRY_JITTER_MICROS)).await;
                }
                Err(e) => {
                    // The upstream accepted the payment. The claim stays so
                    // no second upstream call can happen for this id.
                    error!(
                        correlation_id = %request.correlation_id,
                        processor = %processor,
                        error = %e,
                        "accepted payment could not be persisted"
                    );
                }
            }
        }
    }

    async fn requeue(&self, mut item: QueuedPayment) {
        if item.attempts >= MAX_REQUEUES {
            warn!(
                correlation_id = %item.request.correlation_id,
                attempts = item.attempts,
                "dropping payment after repeated failures"
            );
            return;
        }
        item.attempts += 1;
        tokio::time::sleep(jitter(REQUEUE_BACKOFF_MICROS)).await;
        if self.queue.try_enqueue(item).is_err() {
            warn!("queue full, dropping retried payment");
        }
    }
}

fn jitter(range: std::ops::RangeInclusive<u64>) -> Duration {
    Duration::from_micros(rand::thread_rng().gen_range(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::Config;
    use crate::models::payment::ProcessorTotals;
    use crate::services::health_monitor::HealthMonitor;
    use crate::services::store::MemoryStore;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_upstream(
        script: Vec<StatusCode>,
        default_status: StatusCode,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));

        let app = Router::new().route(
            "/payments",
            post({
                let hits = hits.clone();
                let script = script.clone();
                move || {
                    let hits = hits.clone();
                    let script = script.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        script.lock().pop_front().unwrap_or(default_status)
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), hits)
    }

    struct Pipeline {
        queue: Arc<PaymentQueue>,
        store: Arc<MemoryStore>,
        _shutdown: watch::Sender<bool>,
    }

    fn start_pipeline(primary_url: &str, fallback_url: &str) -> Pipeline {
        let config = Config {
            server_port: 0,
            primary_processor_url: primary_url.to_string(),
            fallback_processor_url: fallback_url.to_string(),
            workers: 4,
            queue_capacity: 64,
            monitor_health: false,
            primary_timeout_ms: 500,
            fallback_timeout_ms: 500,
            circuit_breaker_threshold: 100,
            circuit_breaker_timeout_secs: 60,
            circuit_breaker_reset_threshold: 8,
        };

        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(PaymentProcessorClient::new(&config));
        let breakers = Arc::new(BreakerPair::new(
            config.circuit_breaker_threshold,
            Duration::from_secs(config.circuit_breaker_timeout_secs),
            config.circuit_breaker_reset_threshold,
        ));
        let health = Arc::new(HealthMonitor::new());
        let router = Arc::new(ProcessorRouter::new(health, breakers.clone()));
        let queue = Arc::new(PaymentQueue::new(config.queue_capacity));

        let pool = Arc::new(WorkerPool::new(
            queue.clone(),
            store.clone(),
            client,
            router,
            breakers,
            config.workers,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        WorkerPool::spawn(pool, shutdown_rx);

        Pipeline {
            queue,
            store,
            _shutdown: shutdown_tx,
        }
    }

    fn submit(pipeline: &Pipeline, id: &str, amount: f64) {
        pipeline
            .queue
            .try_enqueue(QueuedPayment::new(PaymentRequest {
                correlation_id: id.to_string(),
                amount,
            }))
            .unwrap();
    }

    fn totals(pipeline: &Pipeline, kind: ProcessorKind) -> ProcessorTotals {
        pipeline.store.summary(kind, None, None).unwrap()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5s");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_happy_path_persists_on_primary() {
        let (primary, primary_hits) = spawn_upstream(vec![], StatusCode::OK).await;
        let (fallback, fallback_hits) = spawn_upstream(vec![], StatusCode::OK).await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "a", 10.00);
        wait_until(|| totals(&pipeline, ProcessorKind::Primary).total_requests == 1).await;

        let primary_totals = totals(&pipeline, ProcessorKind::Primary);
        assert_eq!(primary_totals.total_amount, 10.00);
        assert_eq!(totals(&pipeline, ProcessorKind::Fallback).total_requests, 0);
        assert_eq!(primary_hits.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_submission_reaches_upstream_once() {
        let (primary, primary_hits) = spawn_upstream(vec![], StatusCode::OK).await;
        let (fallback, _) = spawn_upstream(vec![], StatusCode::OK).await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "dup", 10.00);
        submit(&pipeline, "dup", 10.00);
        wait_until(|| totals(&pipeline, ProcessorKind::Primary).total_requests == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(primary_hits.load(Ordering::SeqCst), 1);
        let primary_totals = totals(&pipeline, ProcessorKind::Primary);
        assert_eq!(primary_totals.total_requests, 1);
        assert_eq!(primary_totals.total_amount, 10.00);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_primary_transient_failure_falls_back() {
        let (primary, _) = spawn_upstream(vec![], StatusCode::SERVICE_UNAVAILABLE).await;
        let (fallback, _) = spawn_upstream(vec![], StatusCode::OK).await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "b", 7.50);
        wait_until(|| totals(&pipeline, ProcessorKind::Fallback).total_requests == 1).await;

        assert_eq!(totals(&pipeline, ProcessorKind::Primary).total_requests, 0);
        assert_eq!(
            totals(&pipeline, ProcessorKind::Fallback).total_amount,
            7.50
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_non_retryable_rejection_is_dropped_silently() {
        let (primary, primary_hits) =
            spawn_upstream(vec![StatusCode::UNPROCESSABLE_ENTITY], StatusCode::OK).await;
        let (fallback, fallback_hits) = spawn_upstream(vec![], StatusCode::OK).await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "c", 1.00);
        wait_until(|| primary_hits.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Not retried anywhere and nothing persisted.
        assert_eq!(primary_hits.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
        assert_eq!(totals(&pipeline, ProcessorKind::Primary).total_requests, 0);
        assert_eq!(totals(&pipeline, ProcessorKind::Fallback).total_requests, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_exhausted_retries_drop_the_item() {
        let (primary, primary_hits) =
            spawn_upstream(vec![], StatusCode::INTERNAL_SERVER_ERROR).await;
        let (fallback, fallback_hits) =
            spawn_upstream(vec![], StatusCode::INTERNAL_SERVER_ERROR).await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "d", 2.00);

        // Initial pass plus MAX_REQUEUES trips, two upstream calls each.
        let expected = (MAX_REQUEUES as usize) + 1;
        wait_until(|| primary_hits.load(Ordering::SeqCst) == expected).await;
        wait_until(|| fallback_hits.load(Ordering::SeqCst) == expected).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(primary_hits.load(Ordering::SeqCst), expected);
        assert_eq!(fallback_hits.load(Ordering::SeqCst), expected);
        assert_eq!(totals(&pipeline, ProcessorKind::Primary).total_requests, 0);
        assert_eq!(totals(&pipeline, ProcessorKind::Fallback).total_requests, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retryable_then_success_keeps_single_record() {
        let (primary, _) = spawn_upstream(
            vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::INTERNAL_SERVER_ERROR,
            ],
            StatusCode::OK,
        )
        .await;
        // Fallback also fails transiently, so the item must requeue once
        // and then land on the recovered primary.
        let (fallback, _) = spawn_upstream(
            vec![StatusCode::SERVICE_UNAVAILABLE],
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .await;
        let pipeline = start_pipeline(&primary, &fallback);

        submit(&pipeline, "e", 3.33);
        wait_until(|| totals(&pipeline, ProcessorKind::Primary).total_requests == 1).await;

        let primary_totals = totals(&pipeline, ProcessorKind::Primary);
        assert_eq!(primary_totals.total_amount, 3.33);
        assert_eq!(totals(&pipeline, ProcessorKind::Fallback).total_requests, 0);
    }
}
