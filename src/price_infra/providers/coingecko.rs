use async_trait::async_trait;
use crate::config::ingestion::ProviderConfig;
use crate::error::Result;
use crate::price_infra::providers::{get_json, http_client, PriceProvider};
use crate::price_infra::RawPayload;

// CoinGecko caps page size at 250.
const MAX_PER_PAGE: usize = 250;

pub struct CoinGeckoProvider {
    source_id: String,
    url: String,
    per_page: usize,
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(config: &ProviderConfig, tracked_count: usize) -> Result<Self> {
        Ok(CoinGeckoProvider {
            source_id: config.source_id.clone(),
            url: format!("{}/api/v3/coins/markets", config.base_url.trim_end_matches('/')),
            per_page: tracked_count.clamp(1, MAX_PER_PAGE),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn endpoint(&self) -> &str {
        "coins/markets"
    }

    async fn fetch(&self) -> Result<RawPayload> {
        let per_page = self.per_page.to_string();
        let request = self.client.get(&self.url).query(&[
            ("vs_currency", "usd"),
            ("order", "volume_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("sparkline", "false"),
        ]);

        let payload = get_json(&self.source_id, request).await?;
        tracing::debug!(
            source = %self.source_id,
            records = payload.as_array().map(|a| a.len()).unwrap_or(0),
            "CoinGecko markets fetched"
        );
        Ok(payload)
    }
}
