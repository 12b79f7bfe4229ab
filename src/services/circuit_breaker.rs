use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::models::payment::ProcessorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: RwLock<BreakerInner>,
    max_failures: u32,
    cooldown: Duration,
    reset_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, cooldown: Duration, reset_threshold: u32) -> Self {
        Self {
            inner: RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            }),
            max_failures,
            cooldown,
            reset_threshold,
        }
    }

    pub fn can_execute(&self) -> bool {
        let inner = self.inner.read();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => inner
                .opened_at
                .map(|at| at.elapsed() >= self.cooldown)
                .unwrap_or(true),
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {
                // A probe got through after cooldown; start proving recovery.
                inner.state = BreakerState::HalfOpen;
                inner.success_count = 1;
                info!("circuit breaker half-open after successful probe");
            }
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.reset_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    info!("circuit breaker closed after recovery");
                }
            }
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.write();
        inner.failure_count += 1;
        match inner.state {
            BreakerState::Closed => {
                if inner.failure_count >= self.max_failures {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        threshold = self.max_failures,
                        "circuit breaker opened after consecutive failures"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                warn!("circuit breaker reopened from half-open");
            }
            BreakerState::Open => {
                // A failed probe restarts the cooldown.
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.read().state
    }
}

pub struct BreakerPair {
    primary: CircuitBreaker,
    fallback: CircuitBreaker,
}

impl BreakerPair {
    pub fn new(max_failures: u32, cooldown: Duration, reset_threshold: u32) -> Self {
        Self {
            primary: CircuitBreaker::new(max_failures, cooldown, reset_threshold),
            fallback: CircuitBreaker::new(max_failures, cooldown, reset_threshold),
        }
    }

    pub fn get(&self, kind: ProcessorKind) -> &CircuitBreaker {
        match kind {
            ProcessorKind::Primary => &self.primary,
            ProcessorKind::Fallback => &self.fallback,
        }
    }
}
