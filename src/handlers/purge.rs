use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::error;

use crate::services::PaymentService;

pub async fn purge_payments(
    State(service): State<Arc<PaymentService>>,
    headers: HeaderMap,
) -> StatusCode {
    // The caller's admin token is passed through to the upstream purges.
    let token = headers
        .get("X-Rinha-Token")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("123");

    match service.purge(token).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "purge failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::Config;
    use crate::queue::payment_queue::PaymentQueue;
    use crate::services::store::MemoryStore;
    use crate::services::PaymentProcessorClient;
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;

    // Records the X-Rinha-Token each admin purge request carried.
    async fn spawn_admin_upstream() -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/admin/purge-payments",
            post({
                let seen = seen.clone();
                move |headers: HeaderMap| {
                    let seen = seen.clone();
                    async move {
                        let token = headers
                            .get("X-Rinha-Token")
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.lock().push(token);
                        StatusCode::OK
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn service_for(url: &str) -> Arc<PaymentService> {
        let config = Config {
            server_port: 0,
            primary_processor_url: url.to_string(),
            fallback_processor_url: url.to_string(),
            workers: 1,
            queue_capacity: 8,
            monitor_health: false,
            primary_timeout_ms: 500,
            fallback_timeout_ms: 500,
            circuit_breaker_threshold: 10,
            circuit_breaker_timeout_secs: 60,
            circuit_breaker_reset_threshold: 8,
        };
        let queue = Arc::new(PaymentQueue::new(config.queue_capacity));
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(PaymentProcessorClient::new(&config));
        Arc::new(PaymentService::new(queue, store, client))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_caller_token_reaches_upstream_purge() {
        let (url, seen) = spawn_admin_upstream().await;
        let service = service_for(&url);

        let mut headers = HeaderMap::new();
        headers.insert("X-Rinha-Token", "sekret".parse().unwrap());
        let status = purge_payments(State(service), headers).await;

        assert_eq!(status, StatusCode::OK);
        // Both upstream purges carry the caller's token.
        assert_eq!(
            seen.lock().clone(),
            vec!["sekret".to_string(), "sekret".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_token_defaults() {
        let (url, seen) = spawn_admin_upstream().await;
        let service = service_for(&url);

        let status = purge_payments(State(service), HeaderMap::new()).await;

        assert_eq!(status, StatusCode::OK);
        let tokens = seen.lock().clone();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|token| token == "123"));
    }
}
