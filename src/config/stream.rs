use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub source_id: String,
    pub base_url: String,
    pub topics: Vec<String>,
    /// Binance stream suffix: `ticker`, `trade`, `aggTrade`, `kline_1m`, ...
    pub stream_type: String,
    /// Carry every topic on one combined connection.
    pub multiplex: bool,
    pub max_reconnect_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub connect_timeout_ms: u64,
}

impl StreamConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            enabled: true,
            source_id: "binance-ws".to_string(),
            base_url: "wss://stream.binance.com:9443".to_string(),
            topics: vec!["BTCUSDT".to_string()],
            stream_type: "ticker".to_string(),
            multiplex: true,
            max_reconnect_attempts: 10,
            backoff_base_ms: 1_000,  // 1, 2, 4, ... seconds
            backoff_max_ms: 60_000,
            connect_timeout_ms: 10_000,
        }
    }
}
