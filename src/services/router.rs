use std::sync::Arc;

use crate::models::payment::ProcessorKind;
use crate::services::circuit_breaker::BreakerPair;
use crate::services::health_monitor::HealthMonitor;

const PRIMARY_LATENCY_BUDGET_MS: u64 = 300;
const FALLBACK_LATENCY_BUDGET_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub first: Option<ProcessorKind>,
    pub second: Option<ProcessorKind>,
}

pub struct ProcessorRouter {
    health: Arc<HealthMonitor>,
    breakers: Arc<BreakerPair>,
}

impl ProcessorRouter {
    pub fn new(health: Arc<HealthMonitor>, breakers: Arc<BreakerPair>) -> Self {
        Self { health, breakers }
    }

    pub fn plan(&self) -> RoutePlan {
        let primary = self.health.verdict(ProcessorKind::Primary);
        let fallback = self.health.verdict(ProcessorKind::Fallback);

        let preferred = if !primary.failing && primary.min_response_time_ms < PRIMARY_LATENCY_BUDGET_MS
        {
            ProcessorKind::Primary
        } else if !fallback.failing && fallback.min_response_time_ms < FALLBACK_LATENCY_BUDGET_MS {
            ProcessorKind::Fallback
        } else if primary.failing {
            // Best-effort: a failing primary goes last, whatever shape the
            // fallback is in.
            ProcessorKind::Fallback
        } else {
            ProcessorKind::Primary
        };
        let alternate = preferred.other();

        let first = self
            .breakers
            .get(preferred)
            .can_execute()
            .then_some(preferred);
        let second = self
            .breakers
            .get(alternate)
            .can_execute()
            .then_some(alternate);

        match (first, second) {
            // Preferred target is breaker-blocked: the alternate moves up.
            (None, Some(alternate)) => RoutePlan {
                first: Some(alternate),
                second: None,
            },
            (first, second) => RoutePlan { first, second },
        }
    }
}
