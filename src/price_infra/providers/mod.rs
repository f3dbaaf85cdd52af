pub mod binance;
pub mod coingecko;

use async_trait::async_trait;
use std::sync::Arc;
use crate::config::ingestion::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;

pub use binance::BinanceRestProvider;
pub use coingecko::CoinGeckoProvider;

/// Request/response market-data endpoint of one upstream source.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn source_id(&self) -> &str;
    /// Key looked up in the request budget's weight table.
    fn endpoint(&self) -> &str;
    async fn fetch(&self) -> Result<RawPayload>;
}

/// Build providers in config order, which is also failover priority.
pub fn build_providers<'a>(
    configs: impl Iterator<Item = &'a ProviderConfig>,
    tracked_count: usize,
) -> Result<Vec<Arc<dyn PriceProvider>>> {
    let mut providers: Vec<Arc<dyn PriceProvider>> = Vec::new();

    for config in configs.filter(|c| c.enabled) {
        let provider: Arc<dyn PriceProvider> = match config.kind {
            ProviderKind::CoinGecko => Arc::new(CoinGeckoProvider::new(config, tracked_count)?),
            ProviderKind::BinanceRest => Arc::new(BinanceRestProvider::new(config)?),
        };
        tracing::info!(source = %config.source_id, kind = ?config.kind, "Provider configured");
        providers.push(provider);
    }

    if providers.is_empty() {
        return Err(Error::NoProviders);
    }
    Ok(providers)
}

pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("feed-infra/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::from)
}

pub(crate) async fn get_json(source_id: &str, request: reqwest::RequestBuilder) -> Result<RawPayload> {
    let unavailable = |reason: String| Error::ProviderUnavailable {
        source_id: source_id.to_string(),
        reason,
    };

    let response = request.send().await.map_err(|e| unavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unavailable(format!("HTTP status {}", status)));
    }

    response
        .json::<RawPayload>()
        .await
        .map_err(|e| unavailable(format!("invalid response body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_providers_keeps_order_and_skips_disabled() {
        let mut disabled = ProviderConfig::coingecko();
        disabled.source_id = "coingecko-backup".to_string();
        disabled.enabled = false;

        let configs = vec![ProviderConfig::coingecko(), disabled, ProviderConfig::binance()];
        let providers = build_providers(configs.iter(), 10).unwrap();

        let ids: Vec<_> = providers.iter().map(|p| p.source_id().to_string()).collect();
        assert_eq!(ids, vec!["coingecko", "binance"]);
        assert_eq!(providers[0].endpoint(), "coins/markets");
        assert_eq!(providers[1].endpoint(), "ticker/24hr");
    }

    #[test]
    fn test_build_providers_requires_one() {
        let mut only = ProviderConfig::binance();
        only.enabled = false;
        assert!(matches!(build_providers([only].iter(), 10), Err(Error::NoProviders)));
    }
}
