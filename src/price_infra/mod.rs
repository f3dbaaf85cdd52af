pub mod anomaly;
pub mod failover;
pub mod health;
pub mod normalizer;
pub mod providers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Undecoded provider response body.
pub type RawPayload = serde_json::Value;

/// Provider-independent record produced by the normalizer.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MarketRecord {
    pub instrument_id: String,
    pub name: String,
    pub price: f64,
    pub volume: f64,
    pub change_24h_pct: Option<f64>,
    pub market_cap: Option<f64>,
    pub rank: u32,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
}

impl MarketRecord {
    pub fn sample(&self) -> PriceSample {
        PriceSample {
            instrument_id: self.instrument_id.clone(),
            price: self.price,
            source_id: self.source_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PriceSample {
    pub instrument_id: String,
    pub price: f64,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
}
