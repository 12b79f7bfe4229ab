use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::models::payment::{HealthVerdict, ProcessorKind};
use crate::services::payment_processor_client::{HealthProbe, PaymentProcessorClient};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct HealthMonitor {
    verdicts: [RwLock<HealthVerdict>; 2],
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            verdicts: [
                RwLock::new(HealthVerdict::initial()),
                RwLock::new(HealthVerdict::initial()),
            ],
        }
    }

    pub fn verdict(&self, kind: ProcessorKind) -> HealthVerdict {
        *self.verdicts[kind.index()].read()
    }

    pub fn apply_probe(&self, kind: ProcessorKind, probe: HealthProbe) {
        match probe {
            HealthProbe::Observed(body) => {
                *self.verdicts[kind.index()].write() = HealthVerdict {
                    failing: body.failing,
                    min_response_time_ms: body.min_response_time,
                    observed_at: Utc::now(),
                };
            }
            HealthProbe::RateLimited => {}
            HealthProbe::Unreachable => {
                *self.verdicts[kind.index()].write() = HealthVerdict::unreachable();
            }
        }
    }

    pub fn spawn(
        monitor: Arc<HealthMonitor>,
        client: Arc<PaymentProcessorClient>,
        shutdown: watch::Receiver<bool>,
    ) {
        for kind in ProcessorKind::ALL {
            let monitor = monitor.clone();
            let client = client.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(POLL_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let probe = client.check_health(kind).await;
                            monitor.apply_probe(kind, probe);
                        }
                        _ = shutdown.changed() => {
                            debug!(processor = %kind, "health monitor stopping");
                            break;
                        }
                    }
                }
            });
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
