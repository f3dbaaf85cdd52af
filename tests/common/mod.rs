#![allow(dead_code)]

use async_trait::async_trait;
use feed_infra::error::{Error, Result};
use feed_infra::price_infra::providers::PriceProvider;
use feed_infra::price_infra::RawPayload;
use feed_infra::streaming::{StreamConnector, StreamTransport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider answering from a queue; the last entry repeats.
pub struct QueueProvider {
    id: String,
    endpoint: String,
    responses: Mutex<VecDeque<std::result::Result<Value, String>>>,
    calls: AtomicU32,
}

impl QueueProvider {
    pub fn new(id: &str, endpoint: &str, responses: Vec<std::result::Result<Value, String>>) -> Arc<Self> {
        Arc::new(QueueProvider {
            id: id.to_string(),
            endpoint: endpoint.to_string(),
            responses: Mutex::new(responses.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for QueueProvider {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self) -> Result<RawPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = {
            let mut responses = self.responses.lock();
            if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            }
        };
        let reason = match response {
            Some(Ok(value)) => return Ok(value),
            Some(Err(reason)) => reason,
            None => "no response queued".to_string(),
        };
        Err(Error::ProviderUnavailable {
            source_id: self.id.clone(),
            reason,
        })
    }
}

pub fn coingecko_markets(prices: &[(&str, f64, f64)]) -> Value {
    Value::Array(
        prices
            .iter()
            .enumerate()
            .map(|(i, (symbol, price, volume))| {
                json!({
                    "id": symbol.to_lowercase(),
                    "symbol": symbol.to_lowercase(),
                    "name": symbol,
                    "current_price": price,
                    "total_volume": volume,
                    "market_cap_rank": i + 1,
                    "price_change_percentage_24h": 0.5
                })
            })
            .collect(),
    )
}

pub fn binance_tickers(prices: &[(&str, f64, f64)]) -> Value {
    Value::Array(
        prices
            .iter()
            .map(|(symbol, price, quote_volume)| {
                json!({
                    "symbol": format!("{}USDT", symbol),
                    "lastPrice": price.to_string(),
                    "priceChangePercent": "1.0",
                    "quoteVolume": quote_volume.to_string()
                })
            })
            .collect(),
    )
}

pub enum Session {
    Refuse,
    /// Messages are delivered, then the connection closes (`true`) or idles (`false`).
    Serve(Vec<String>, bool),
}

pub struct ScriptedConnector {
    sessions: Mutex<VecDeque<Session>>,
    connects: AtomicU32,
    multiplex: bool,
}

impl ScriptedConnector {
    pub fn new(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(ScriptedConnector {
            sessions: Mutex::new(sessions.into()),
            connects: AtomicU32::new(0),
            multiplex: true,
        })
    }

    pub fn single_topic(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(ScriptedConnector {
            sessions: Mutex::new(sessions.into()),
            connects: AtomicU32::new(0),
            multiplex: false,
        })
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn StreamTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = self.sessions.lock().pop_front().unwrap_or(Session::Refuse);
        match session {
            Session::Refuse => Err(Error::ConnectionLost("connection refused".to_string())),
            Session::Serve(messages, close) => Ok(Box::new(ScriptedTransport {
                messages: messages.into(),
                close,
            })),
        }
    }

    fn supports_multiplex(&self) -> bool {
        self.multiplex
    }
}

struct ScriptedTransport {
    messages: VecDeque<String>,
    close: bool,
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn next_message(&mut self) -> Option<Result<String>> {
        match self.messages.pop_front() {
            Some(message) => Some(Ok(message)),
            None if self.close => None,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn ticker_message(symbol: &str, price: f64) -> String {
    json!({
        "stream": format!("{}@ticker", symbol.to_lowercase()),
        "data": { "e": "24hrTicker", "s": symbol, "c": price.to_string() }
    })
    .to_string()
}

/// Polls `cond` on the (paused) tokio clock.
pub async fn eventually(cond: impl Fn() -> bool) {
    for _ in 0..2_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
