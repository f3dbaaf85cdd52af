use async_trait::async_trait;
use crate::config::ingestion::ProviderConfig;
use crate::error::Result;
use crate::price_infra::providers::{get_json, http_client, PriceProvider};
use crate::price_infra::RawPayload;

/// Binance public 24h ticker statistics for every symbol.
pub struct BinanceRestProvider {
    source_id: String,
    url: String,
    client: reqwest::Client,
}

impl BinanceRestProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(BinanceRestProvider {
            source_id: config.source_id.clone(),
            url: format!("{}/api/v3/ticker/24hr", config.base_url.trim_end_matches('/')),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl PriceProvider for BinanceRestProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn endpoint(&self) -> &str {
        "ticker/24hr"
    }

    async fn fetch(&self) -> Result<RawPayload> {
        let payload = get_json(&self.source_id, self.client.get(&self.url)).await?;
        tracing::debug!(
            source = %self.source_id,
            records = payload.as_array().map(|a| a.len()).unwrap_or(0),
            "Binance 24h tickers fetched"
        );
        Ok(payload)
    }
}
