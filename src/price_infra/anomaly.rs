use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use crate::config::ingestion::AnomalyConfig;
use crate::price_infra::{MarketRecord, PriceSample};

/// Cross-source price difference above which an instrument is reported.
pub const DISCREPANCY_THRESHOLD_PCT: f64 = 5.0;

/// Why a price was classified as implausible.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    Spike {
        instrument_id: String,
        price: f64,
        mean: f64,
        deviation_pct: f64,
    },
    InvalidPrice {
        instrument_id: String,
        price: f64,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Spike { instrument_id, price, mean, deviation_pct } => write!(
                f,
                "{} price deviates {:.2}% from recent mean (new: {:.8}, mean: {:.8})",
                instrument_id, deviation_pct, price, mean
            ),
            Rejection::InvalidPrice { instrument_id, price } => {
                write!(f, "{} price {} is not a positive finite number", instrument_id, price)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Rolling-mean spike detector, one ring of accepted prices per instrument.
///
/// The map entry guard is held for the whole validation, so concurrent calls for the same
/// instrument never interleave their ring updates.
pub struct AnomalyGuard {
    threshold_pct: f64,
    window: usize,
    history: DashMap<String, VecDeque<f64>>,
}

impl AnomalyGuard {
    pub fn new(config: &AnomalyConfig) -> Self {
        tracing::info!(
            threshold_pct = config.threshold_pct,
            window = config.window,
            "Anomaly guard initialized"
        );
        AnomalyGuard {
            threshold_pct: config.threshold_pct,
            window: config.window.max(1),
            history: DashMap::new(),
        }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Classify `price` against the instrument's recent accepted prices.
    ///
    /// Accepted prices enter the ring (evicting the oldest); rejected prices leave it untouched.
    pub fn validate(&self, instrument_id: &str, price: f64) -> Verdict {
        if !price.is_finite() || price <= 0.0 {
            return Verdict::Rejected(Rejection::InvalidPrice {
                instrument_id: instrument_id.to_string(),
                price,
            });
        }

        let mut ring = self
            .history
            .entry(instrument_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window));

        if ring.len() >= 2 {
            let mean = ring.iter().sum::<f64>() / ring.len() as f64;
            let deviation_pct = (price - mean).abs() / mean * 100.0;

            if deviation_pct > self.threshold_pct {
                return Verdict::Rejected(Rejection::Spike {
                    instrument_id: instrument_id.to_string(),
                    price,
                    mean,
                    deviation_pct,
                });
            }
        }

        if ring.len() == self.window {
            ring.pop_front();
        }
        ring.push_back(price);
        Verdict::Accepted
    }

    pub fn validate_sample(&self, sample: &PriceSample) -> Verdict {
        self.validate(&sample.instrument_id, sample.price)
    }

    /// Accepted prices for `instrument_id`, oldest first.
    pub fn history(&self, instrument_id: &str) -> Vec<f64> {
        self.history
            .get(instrument_id)
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn tracked(&self) -> usize {
        self.history.len()
    }

    pub fn forget(&self, instrument_id: &str) -> bool {
        self.history.remove(instrument_id).is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Discrepancy {
    pub instrument_id: String,
    pub primary_price: f64,
    pub secondary_price: f64,
    pub difference_pct: f64,
}

/// Result of checking two sources' snapshots against each other.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub compared_at: DateTime<Utc>,
    pub matched: usize,
    pub discrepancies: Vec<Discrepancy>,
    pub avg_difference_pct: f64,
    /// `100 - avg_difference_pct`, floored at zero. Zero when nothing matched.
    pub consistency_score: f64,
}

/// Compare prices for instruments present in both record sets.
///
/// The difference is taken relative to the `primary` price. Pairs where either price is not
/// positive still count as matched but contribute no difference.
pub fn compare_sources(primary: &[MarketRecord], secondary: &[MarketRecord]) -> ConsistencyReport {
    let lookup: HashMap<String, f64> = secondary
        .iter()
        .map(|r| (r.instrument_id.to_uppercase(), r.price))
        .collect();

    let mut seen = HashSet::new();
    let mut discrepancies = Vec::new();
    let mut total_diff = 0.0;

    for record in primary {
        let key = record.instrument_id.to_uppercase();
        let Some(&other) = lookup.get(&key) else {
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }
        if record.price <= 0.0 || other <= 0.0 {
            continue;
        }

        let difference_pct = (record.price - other).abs() / record.price * 100.0;
        total_diff += difference_pct;
        if difference_pct > DISCREPANCY_THRESHOLD_PCT {
            discrepancies.push(Discrepancy {
                instrument_id: key,
                primary_price: record.price,
                secondary_price: other,
                difference_pct,
            });
        }
    }

    let matched = seen.len();
    let (avg_difference_pct, consistency_score) = if matched == 0 {
        (0.0, 0.0)
    } else {
        let avg = total_diff / matched as f64;
        (avg, (100.0 - avg).max(0.0))
    };

    if !discrepancies.is_empty() {
        tracing::warn!(
            matched,
            discrepancies = discrepancies.len(),
            consistency_score,
            "Sources disagree on price"
        );
    }

    ConsistencyReport {
        compared_at: Utc::now(),
        matched,
        discrepancies,
        avg_difference_pct,
        consistency_score,
    }
}
