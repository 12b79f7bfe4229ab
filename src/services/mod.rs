pub mod circuit_breaker;
pub mod health_monitor;
pub mod payment_processor_client;
pub mod payment_service;
pub mod router;
pub mod store;
pub mod worker_pool;

pub use payment_processor_client::PaymentProcessorClient;
pub use payment_service::{PaymentService, ServiceError};
