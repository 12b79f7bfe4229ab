use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::models::payment::PaymentRequest;
use crate::services::{PaymentService, ServiceError};

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let request: PaymentRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "invalid payment request");
            return StatusCode::BAD_REQUEST;
        }
    };

    if request.correlation_id.is_empty() || !(request.amount > 0.0) || !request.amount.is_finite()
    {
        return StatusCode::BAD_REQUEST;
    }

    match service.submit_payment(request) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(ServiceError::QueueFull) => StatusCode::TOO_MANY_REQUESTS,
    }
}
