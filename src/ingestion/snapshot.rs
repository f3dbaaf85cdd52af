use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;
use crate::price_infra::anomaly::Rejection;
use crate::price_infra::MarketRecord;

/// Normalized, anomaly-filtered result of one fetch cycle. Never mutated after publication.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub source_id: String,
    pub records: Vec<MarketRecord>,
    pub rejected: Vec<Rejection>,
    pub created_at: DateTime<Utc>,
    pub fetch_latency_ms: u64,
    /// Zero-based failover cycle that produced the payload.
    pub cycle: u32,
}

impl Snapshot {
    pub fn record(&self, instrument_id: &str) -> Option<&MarketRecord> {
        self.records
            .iter()
            .find(|r| r.instrument_id.eq_ignore_ascii_case(instrument_id))
    }

    pub fn price(&self, instrument_id: &str) -> Option<f64> {
        self.record(instrument_id).map(|r| r.price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub source_id: String,
}

/// Bounded ring of published snapshots, oldest first.
pub struct SnapshotHistory {
    capacity: usize,
    entries: VecDeque<Arc<Snapshot>>,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        SnapshotHistory {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, snapshot: Arc<Snapshot>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.entries.back().cloned()
    }

    /// The newest `limit` snapshots, in publication order.
    pub fn recent(&self, limit: usize) -> Vec<Arc<Snapshot>> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn instrument_series(&self, instrument_id: &str, limit: usize) -> Vec<InstrumentPoint> {
        let points: Vec<InstrumentPoint> = self
            .entries
            .iter()
            .filter_map(|snapshot| {
                snapshot.record(instrument_id).map(|r| InstrumentPoint {
                    timestamp: r.timestamp,
                    price: r.price,
                    volume: r.volume,
                    source_id: r.source_id.clone(),
                })
            })
            .collect();
        let skip = points.len().saturating_sub(limit);
        points.into_iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
