use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use crate::config::ingestion::ProviderKind;
use crate::error::{Error, Result};
use crate::price_infra::{MarketRecord, RawPayload};

/// Turns one provider's raw payload into normalized records.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, source_id: &str, payload: &RawPayload) -> Result<Vec<MarketRecord>>;
}

/// Understands the CoinGecko markets list and the Binance 24h ticker list.
pub struct StandardNormalizer {
    top_n: usize,
    sources: HashMap<String, ProviderKind>,
}

impl StandardNormalizer {
    pub fn new(top_n: usize) -> Self {
        let mut sources = HashMap::new();
        sources.insert("coingecko".to_string(), ProviderKind::CoinGecko);
        sources.insert("binance".to_string(), ProviderKind::BinanceRest);
        StandardNormalizer { top_n, sources }
    }

    pub fn with_source(mut self, source_id: &str, kind: ProviderKind) -> Self {
        self.sources.insert(source_id.to_string(), kind);
        self
    }

    fn coingecko(&self, source_id: &str, payload: &RawPayload) -> Result<Vec<MarketRecord>> {
        let coins: Vec<CoinGeckoMarket> = serde_json::from_value(payload.clone())?;
        let now = Utc::now();

        Ok(coins
            .into_iter()
            .filter_map(|coin| {
                let price = coin.current_price?;
                let symbol = coin.symbol.to_uppercase();
                Some(MarketRecord {
                    name: coin.name.unwrap_or_else(|| symbol.clone()),
                    instrument_id: symbol,
                    price,
                    volume: coin.total_volume.unwrap_or(0.0),
                    change_24h_pct: coin.price_change_percentage_24h,
                    market_cap: coin.market_cap,
                    rank: coin.market_cap_rank.unwrap_or(0),
                    source_id: source_id.to_string(),
                    timestamp: now,
                })
            })
            .take(self.top_n)
            .collect())
    }

    fn binance(&self, source_id: &str, payload: &RawPayload) -> Result<Vec<MarketRecord>> {
        let tickers: Vec<BinanceTicker24h> = serde_json::from_value(payload.clone())?;
        let now = Utc::now();

        let mut pairs: Vec<(String, f64, f64, Option<f64>)> = tickers
            .into_iter()
            .filter_map(|t| {
                let base = t.symbol.strip_suffix("USDT")?.to_string();
                let quote_volume: f64 = t.quote_volume.as_deref()?.parse().ok()?;
                let price: f64 = t.last_price.parse().ok()?;
                let change = t.price_change_percent.as_deref().and_then(|c| c.parse().ok());
                (quote_volume > 0.0).then_some((base, price, quote_volume, change))
            })
            .collect();

        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));
        pairs.truncate(self.top_n);

        Ok(pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (base, price, volume, change))| MarketRecord {
                name: base.clone(),
                instrument_id: base,
                price,
                volume,
                change_24h_pct: change,
                market_cap: None,
                rank: idx as u32 + 1,
                source_id: source_id.to_string(),
                timestamp: now,
            })
            .collect())
    }
}

impl Normalizer for StandardNormalizer {
    fn normalize(&self, source_id: &str, payload: &RawPayload) -> Result<Vec<MarketRecord>> {
        match self.sources.get(source_id) {
            Some(ProviderKind::CoinGecko) => self.coingecko(source_id, payload),
            Some(ProviderKind::BinanceRest) => self.binance(source_id, payload),
            None => Err(Error::UnknownSource(source_id.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct CoinGeckoMarket {
    symbol: String,
    name: Option<String>,
    current_price: Option<f64>,
    total_volume: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    price_change_percentage_24h: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    last_price: String,
    price_change_percent: Option<String>,
    quote_volume: Option<String>,
}
