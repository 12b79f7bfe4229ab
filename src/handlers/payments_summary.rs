use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::payment::PaymentsSummary;
use crate::services::PaymentService;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    from: Option<String>,
    to: Option<String>,
}

pub async fn get_summary(
    State(service): State<Arc<PaymentService>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<PaymentsSummary>, StatusCode> {
    let from = parse_bound(query.from)?;
    let to = parse_bound(query.to)?;
    Ok(Json(service.summary(from, to)))
}

fn parse_bound(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StatusCode> {
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| StatusCode::BAD_REQUEST),
    }
}
