use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

use crate::models::payment::PaymentRequest;

#[derive(Debug, Clone)]
pub struct QueuedPayment {
    pub request: PaymentRequest,
    pub attempts: u32,
}

impl QueuedPayment {
    pub fn new(request: PaymentRequest) -> Self {
        Self {
            request,
            attempts: 0,
        }
    }
}

#[derive(Debug, Error)]
#[error("payment queue is full")]
pub struct QueueFull;

pub struct PaymentQueue {
    sender: mpsc::Sender<QueuedPayment>,
    receiver: Mutex<mpsc::Receiver<QueuedPayment>>,
}

impl PaymentQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn try_enqueue(&self, item: QueuedPayment) -> Result<(), QueueFull> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) | TrySendError::Closed(_) => QueueFull,
        })
    }

    pub async fn dequeue(&self) -> Option<QueuedPayment> {
        self.receiver.lock().await.recv().await
    }
}
