use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::models::payment::{PaymentRequest, PaymentsSummary, ProcessorKind, ProcessorTotals};
use crate::queue::payment_queue::{PaymentQueue, QueuedPayment};
use crate::services::payment_processor_client::PaymentProcessorClient;
use crate::services::store::{Storage, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("payment queue is full")]
    QueueFull,
}

pub struct PaymentService {
    queue: Arc<PaymentQueue>,
    store: Arc<dyn Storage>,
    processor_client: Arc<PaymentProcessorClient>,
}

impl PaymentService {
    pub fn new(
        queue: Arc<PaymentQueue>,
        store: Arc<dyn Storage>,
        processor_client: Arc<PaymentProcessorClient>,
    ) -> Self {
        Self {
            queue,
            store,
            processor_client,
        }
    }

    pub fn submit_payment(&self, request: PaymentRequest) -> Result<(), ServiceError> {
        self.queue
            .try_enqueue(QueuedPayment::new(request))
            .map_err(|_| ServiceError::QueueFull)
    }

    pub fn summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> PaymentsSummary {
        let totals = |kind: ProcessorKind| {
            self.store.summary(kind, from, to).unwrap_or_else(|e| {
                warn!(processor = %kind, error = %e, "summary read failed, reporting zeros");
                ProcessorTotals::default()
            })
        };
        PaymentsSummary {
            default: totals(ProcessorKind::Primary),
            fallback: totals(ProcessorKind::Fallback),
        }
    }

    pub async fn purge(&self, token: &str) -> Result<(), StoreError> {
        let (primary_ok, fallback_ok) = tokio::join!(
            self.processor_client
                .purge_payments(ProcessorKind::Primary, token),
            self.processor_client
                .purge_payments(ProcessorKind::Fallback, token),
        );
        if !primary_ok || !fallback_ok {
            warn!("upstream purge incomplete");
        }
        self.store.purge_all()
    }
}
