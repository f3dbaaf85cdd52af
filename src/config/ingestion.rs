use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    /// Top-N instruments by volume kept by the normalizer.
    pub tracked_count: usize,
    /// When non-empty, only these instruments are kept.
    pub tracked_instruments: Vec<String>,
    pub subscriber_capacity: usize,
    pub status_log_interval_secs: u64,
}

impl IngestionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            poll_interval_ms: 5_000,
            history_capacity: 500,
            tracked_count: 50,
            tracked_instruments: Vec::new(),
            subscriber_capacity: 64,
            status_log_interval_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub threshold_pct: f64,
    pub window: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            threshold_pct: 50.0,
            window: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Full failover cycles before giving up.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Shared by the budget wait and the provider request of one attempt.
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 10_000,
            max_delay_ms: 60_000,
            attempt_timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub healthy_uptime_pct: f64,
    pub healthy_max_latency_ms: u64,
    pub degraded_uptime_pct: f64,
}

impl HealthConfig {
    pub fn healthy_max_latency(&self) -> Duration {
        Duration::from_millis(self.healthy_max_latency_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            healthy_uptime_pct: 95.0,
            healthy_max_latency_ms: 2_000,
            degraded_uptime_pct: 80.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    CoinGecko,
    BinanceRest,
}

/// One upstream REST provider. Order in the config list is failover priority.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub source_id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn coingecko() -> Self {
        ProviderConfig {
            source_id: "coingecko".to_string(),
            kind: ProviderKind::CoinGecko,
            base_url: "https://api.coingecko.com".to_string(),
            enabled: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn binance() -> Self {
        ProviderConfig {
            source_id: "binance".to_string(),
            kind: ProviderKind::BinanceRest,
            base_url: "https://api.binance.com".to_string(),
            enabled: true,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
