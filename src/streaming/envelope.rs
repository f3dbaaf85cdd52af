use chrono::{DateTime, Utc};
use serde_json::Value;
use crate::error::{Error, Result};

/// One decoded push message, keyed by its upper-case topic.
#[derive(Debug, Clone)]
pub struct StreamEnvelope {
    pub topic: String,
    pub event_type: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl StreamEnvelope {
    pub fn price(&self) -> Option<f64> {
        latest_price(&self.payload)
    }
}

/// Accepts the combined form `{"stream": "btcusdt@ticker", "data": {..}}` and the single-event
/// form `{"e": "24hrTicker", "s": "BTCUSDT", ..}`.
pub fn parse_envelope(text: &str) -> Result<StreamEnvelope> {
    let value: Value = serde_json::from_str(text)?;

    let (topic, payload) = match (value.get("stream").and_then(Value::as_str), value.get("data")) {
        (Some(stream), Some(data)) => {
            let topic = stream.split('@').next().unwrap_or(stream).to_uppercase();
            (topic, data.clone())
        }
        _ => match value.get("s").and_then(Value::as_str) {
            Some(symbol) => (symbol.to_uppercase(), value.clone()),
            None => {
                return Err(Error::DeserializationError(
                    "message carries neither a stream name nor a symbol".to_string(),
                ))
            }
        },
    };

    if topic.is_empty() {
        return Err(Error::DeserializationError("empty stream topic".to_string()));
    }

    Ok(StreamEnvelope {
        topic,
        event_type: payload.get("e").and_then(Value::as_str).map(str::to_string),
        payload,
        received_at: Utc::now(),
    })
}

/// Last price of a ticker (`c`), trade (`p`) or kline (`k.c`) payload.
pub fn latest_price(payload: &Value) -> Option<f64> {
    ["c", "p"]
        .iter()
        .find_map(|key| payload.get(*key))
        .or_else(|| payload.get("k").and_then(|k| k.get("c")))
        .and_then(as_f64)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
