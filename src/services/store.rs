use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::models::payment::{PaymentRecord, ProcessorKind, ProcessorTotals};
use crate::utils::money::cents_to_amount;

const CORRELATION_MARKER_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Fresh,
    Duplicate,
}

pub trait Storage: Send + Sync {
    fn reserve_correlation(&self, id: &str) -> Result<Reservation, StoreError>;

    fn release_correlation(&self, id: &str);

    fn record_payment(
        &self,
        processor: ProcessorKind,
        id: &str,
        amount_cents: i64,
        requested_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn summary(
        &self,
        processor: ProcessorKind,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ProcessorTotals, StoreError>;

    fn purge_all(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Ledger {
    total_requests: u64,
    total_amount_cents: i64,
    timeline: BTreeMap<i64, Vec<i64>>,
}

pub struct MemoryStore {
    records: DashMap<String, PaymentRecord>,
    markers: DashMap<String, Instant>,
    ledgers: [RwLock<Ledger>; 2],
    marker_ttl: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_marker_ttl(CORRELATION_MARKER_TTL)
    }

    pub fn with_marker_ttl(marker_ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            markers: DashMap::new(),
            ledgers: [RwLock::new(Ledger::default()), RwLock::new(Ledger::default())],
            marker_ttl,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn reserve_correlation(&self, id: &str) -> Result<Reservation, StoreError> {
        // A persisted record suppresses the id forever, even after the
        // marker's TTL has lapsed.
        if self.records.contains_key(id) {
            return Ok(Reservation::Duplicate);
        }

        let expires_at = Instant::now() + self.marker_ttl;
        match self.markers.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > Instant::now() {
                    Ok(Reservation::Duplicate)
                } else {
                    entry.insert(expires_at);
                    Ok(Reservation::Fresh)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(Reservation::Fresh)
            }
        }
    }

    fn release_correlation(&self, id: &str) {
        self.markers.remove(id);
    }

    fn record_payment(
        &self,
        processor: ProcessorKind,
        id: &str,
        amount_cents: i64,
        requested_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.records.entry(id.to_string()) {
            // Already persisted; the write is idempotent per correlation id.
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                // The entry guard is held across the ledger update, so the
                // record, index entry and counters land together or not at
                // all, and a racing writer for the same id waits here.
                let mut ledger = self.ledgers[processor.index()].write();
                ledger.total_requests += 1;
                ledger.total_amount_cents += amount_cents;
                ledger
                    .timeline
                    .entry(requested_at.timestamp_millis())
                    .or_default()
                    .push(amount_cents);
                drop(ledger);

                entry.insert(PaymentRecord {
                    correlation_id: id.to_string(),
                    amount_cents,
                    processor,
                    requested_at,
                });
                Ok(())
            }
        }
    }

    fn summary(
        &self,
        processor: ProcessorKind,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ProcessorTotals, StoreError> {
        let ledger = self.ledgers[processor.index()].read();

        // Without a window the counters are the authoritative O(1) answer.
        if from.is_none() && to.is_none() {
            return Ok(ProcessorTotals {
                total_requests: ledger.total_requests,
                total_amount: cents_to_amount(ledger.total_amount_cents),
            });
        }

        let lo = from.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
        let hi = to
            .map(|t| t.timestamp_millis())
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        if lo > hi {
            return Ok(ProcessorTotals::default());
        }

        let mut total_requests = 0u64;
        let mut total_cents = 0i64;
        for amounts in ledger.timeline.range(lo..=hi).map(|(_, v)| v) {
            total_requests += amounts.len() as u64;
            total_cents += amounts.iter().sum::<i64>();
        }

        Ok(ProcessorTotals {
            total_requests,
            total_amount: cents_to_amount(total_cents),
        })
    }

    fn purge_all(&self) -> Result<(), StoreError> {
        self.records.clear();
        self.markers.clear();
        for ledger in &self.ledgers {
            *ledger.write() = Ledger::default();
        }
        Ok(())
    }
}
