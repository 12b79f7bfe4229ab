use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub primary_processor_url: String,
    pub fallback_processor_url: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub monitor_health: bool,
    pub primary_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_secs: u64,
    pub circuit_breaker_reset_threshold: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: parse_env("PORT", 9999),
            primary_processor_url: env::var("PAYMENT_PROCESSOR_URL_DEFAULT")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            fallback_processor_url: env::var("PAYMENT_PROCESSOR_URL_FALLBACK")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            workers: parse_env("WORKERS", 500),
            queue_capacity: parse_env("QUEUE_CAPACITY", 10_000),
            monitor_health: parse_env("MONITOR_HEALTH", true),
            primary_timeout_ms: parse_env("PROCESSOR_TIMEOUT_DEFAULT_MS", 200),
            fallback_timeout_ms: parse_env("PROCESSOR_TIMEOUT_FALLBACK_MS", 100),
            circuit_breaker_threshold: parse_env("CIRCUIT_BREAKER_THRESHOLD", 10),
            circuit_breaker_timeout_secs: parse_env("CIRCUIT_BREAKER_TIMEOUT", 60),
            circuit_breaker_reset_threshold: parse_env("CIRCUIT_BREAKER_RESET", 8),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
