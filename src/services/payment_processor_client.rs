use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::app::config::Config;
use crate::models::payment::{
    PaymentRequest, ProcessorKind, ProcessorPayload, ServiceHealthResponse,
};

const HEALTH_TIMEOUT: Duration = Duration::from_millis(500);
const POOL_MAX_IDLE_PER_HOST: usize = 500;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome {
    Accepted { requested_at: DateTime<Utc> },
    Rejected,
    Retryable,
}

#[derive(Debug, Clone, Copy)]
pub enum HealthProbe {
    Observed(ServiceHealthResponse),
    RateLimited,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Success,
    NonRetryable,
    Retryable,
}

fn classify_status(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Classification::Retryable
    } else {
        Classification::NonRetryable
    }
}

struct Upstream {
    base_url: String,
    client: Client,
}

impl Upstream {
    fn new(base_url: &str, timeout_ms: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

pub struct PaymentProcessorClient {
    primary: Upstream,
    fallback: Upstream,
}

impl PaymentProcessorClient {
    pub fn new(config: &Config) -> Self {
        Self {
            primary: Upstream::new(&config.primary_processor_url, config.primary_timeout_ms),
            fallback: Upstream::new(&config.fallback_processor_url, config.fallback_timeout_ms),
        }
    }

    fn upstream(&self, kind: ProcessorKind) -> &Upstream {
        match kind {
            ProcessorKind::Primary => &self.primary,
            ProcessorKind::Fallback => &self.fallback,
        }
    }

    pub async fn submit_payment(
        &self,
        kind: ProcessorKind,
        request: &PaymentRequest,
    ) -> AttemptOutcome {
        let upstream = self.upstream(kind);
        let requested_at = Utc::now();
        let payload = ProcessorPayload {
            correlation_id: request.correlation_id.clone(),
            amount: request.amount,
            requested_at: requested_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        };

        let result = upstream
            .client
            .post(format!("{}/payments", upstream.base_url))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) => match classify_status(response.status()) {
                Classification::Success => AttemptOutcome::Accepted { requested_at },
                Classification::NonRetryable => {
                    debug!(
                        processor = %kind,
                        correlation_id = %request.correlation_id,
                        status = %response.status(),
                        "upstream rejected payment"
                    );
                    AttemptOutcome::Rejected
                }
                Classification::Retryable => {
                    debug!(
                        processor = %kind,
                        correlation_id = %request.correlation_id,
                        status = %response.status(),
                        "upstream transient failure"
                    );
                    AttemptOutcome::Retryable
                }
            },
            Err(e) => {
                debug!(
                    processor = %kind,
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "upstream request failed"
                );
                AttemptOutcome::Retryable
            }
        }
    }

    pub async fn check_health(&self, kind: ProcessorKind) -> HealthProbe {
        let upstream = self.upstream(kind);
        let result = upstream
            .client
            .get(format!("{}/payments/service-health", upstream.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                HealthProbe::RateLimited
            }
            Ok(response) if response.status().is_success() => {
                match response.json::<ServiceHealthResponse>().await {
                    Ok(body) => HealthProbe::Observed(body),
                    Err(e) => {
                        warn!(processor = %kind, error = %e, "malformed health response");
                        HealthProbe::Unreachable
                    }
                }
            }
            Ok(response) => {
                warn!(processor = %kind, status = %response.status(), "health probe refused");
                HealthProbe::Unreachable
            }
            Err(_) => HealthProbe::Unreachable,
        }
    }

    pub async fn purge_payments(&self, kind: ProcessorKind, token: &str) -> bool {
        let upstream = self.upstream(kind);
        let result = upstream
            .client
            .post(format!("{}/admin/purge-payments", upstream.base_url))
            .header("X-Rinha-Token", token)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(processor = %kind, status = %response.status(), "upstream purge refused");
                false
            }
            Err(e) => {
                warn!(processor = %kind, error = %e, "upstream purge failed");
                false
            }
        }
    }
}
