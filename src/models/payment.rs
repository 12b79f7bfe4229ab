use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    Primary,
    Fallback,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 2] = [ProcessorKind::Primary, ProcessorKind::Fallback];

    pub fn wire_name(&self) -> &'static str {
        match self {
            ProcessorKind::Primary => "default",
            ProcessorKind::Fallback => "fallback",
        }
    }

    pub fn other(&self) -> ProcessorKind {
        match self {
            ProcessorKind::Primary => ProcessorKind::Fallback,
            ProcessorKind::Fallback => ProcessorKind::Primary,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ProcessorKind::Primary => 0,
            ProcessorKind::Fallback => 1,
        }
    }
}

impl std::fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorPayload {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: f64,
    #[serde(rename = "requestedAt")]
    pub requested_at: String,
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub correlation_id: String,
    pub amount_cents: i64,
    pub processor: ProcessorKind,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ServiceHealthResponse {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthVerdict {
    pub failing: bool,
    pub min_response_time_ms: u64,
    pub observed_at: DateTime<Utc>,
}

impl HealthVerdict {
    pub fn initial() -> Self {
        Self {
            failing: false,
            min_response_time_ms: 0,
            observed_at: Utc::now(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            failing: true,
            min_response_time_ms: u64::MAX,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct ProcessorTotals {
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "totalAmount")]
    pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PaymentsSummary {
    pub default: ProcessorTotals,
    pub fallback: ProcessorTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_request_wire_format() {
        let req: PaymentRequest =
            serde_json::from_str(r#"{"correlationId":"abc-123","amount":19.9}"#).unwrap();
        assert_eq!(req.correlation_id, "abc-123");
        assert_eq!(req.amount, 19.9);
    }

    #[test]
    fn test_processor_payload_uses_camel_case() {
        let payload = ProcessorPayload {
            correlation_id: "abc".into(),
            amount: 1.0,
            requested_at: "2025-01-01T00:00:00.000000000Z".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("correlationId").is_some());
        assert!(json.get("requestedAt").is_some());
    }

    #[test]
    fn test_summary_wire_format() {
        let summary = PaymentsSummary {
            default: ProcessorTotals {
                total_requests: 2,
                total_amount: 30.5,
            },
            fallback: ProcessorTotals::default(),
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["default"]["totalRequests"], 2);
        assert_eq!(json["default"]["totalAmount"], 30.5);
        assert_eq!(json["fallback"]["totalRequests"], 0);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(ProcessorKind::Primary.wire_name(), "default");
        assert_eq!(ProcessorKind::Fallback.wire_name(), "fallback");
        assert_eq!(ProcessorKind::Primary.other(), ProcessorKind::Fallback);
    }
}
