use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;
use crate::config::ingestion::RetryConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::observability::tracing::trace_fetch_cycle;
use crate::price_infra::health::SourceHealthTracker;
use crate::price_infra::providers::PriceProvider;
use crate::price_infra::RawPayload;
use crate::rate_limit::RequestBudget;
use crate::utils::helper::exponential_backoff;

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source_id: String,
    pub payload: RawPayload,
    pub latency: Duration,
    pub cycle: u32,
}

/// Tries providers in priority order, backing off between full cycles.
pub struct FailoverFetcher {
    providers: Vec<Arc<dyn PriceProvider>>,
    budget: Arc<RequestBudget>,
    health: Arc<SourceHealthTracker>,
    config: RetryConfig,
}

impl FailoverFetcher {
    pub fn new(
        providers: Vec<Arc<dyn PriceProvider>>,
        budget: Arc<RequestBudget>,
        health: Arc<SourceHealthTracker>,
        config: RetryConfig,
    ) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::NoProviders);
        }
        Ok(FailoverFetcher { providers, budget, health, config })
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.source_id().to_string()).collect()
    }

    pub fn health(&self) -> &Arc<SourceHealthTracker> {
        &self.health
    }

    pub fn budget(&self) -> &Arc<RequestBudget> {
        &self.budget
    }

    pub async fn fetch(&self) -> Result<FetchOutcome> {
        let cycles = self.config.max_retries.max(1);
        let mut last_error = String::from("no attempt made");

        for cycle in 0..cycles {
            let outcome = self
                .run_cycle(cycle, &mut last_error)
                .instrument(trace_fetch_cycle(cycle))
                .await?;
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }

            if cycle + 1 < cycles {
                let delay = exponential_backoff(self.config.base_delay(), cycle, self.config.max_delay());
                tracing::warn!(
                    cycle,
                    delay_ms = delay.as_millis() as u64,
                    last_error = %last_error,
                    "All providers failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        metrics::FETCH_CYCLES_EXHAUSTED.inc();
        tracing::error!(cycles, last_error = %last_error, "All providers exhausted");
        Err(Error::AllProvidersExhausted { cycles, last_error })
    }

    /// `Ok(None)` means every provider failed this cycle.
    async fn run_cycle(&self, cycle: u32, last_error: &mut String) -> Result<Option<FetchOutcome>> {
        for provider in &self.providers {
            match self.attempt(provider.as_ref()).await {
                Ok((payload, latency)) => {
                    tracing::info!(
                        source = %provider.source_id(),
                        cycle,
                        latency_ms = latency.as_millis() as u64,
                        "Fetch succeeded"
                    );
                    return Ok(Some(FetchOutcome {
                        source_id: provider.source_id().to_string(),
                        payload,
                        latency,
                        cycle,
                    }));
                }
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    tracing::warn!(source = %provider.source_id(), cycle, error = %e, "Provider attempt failed");
                    *last_error = format!("{}: {}", provider.source_id(), e);
                }
            }
        }
        Ok(None)
    }

    async fn attempt(&self, provider: &dyn PriceProvider) -> Result<(RawPayload, Duration)> {
        let attempt_timeout = self.config.attempt_timeout();
        let deadline = Instant::now() + attempt_timeout;
        let endpoint = provider.endpoint();

        let granted = timeout_at(deadline, self.budget.consume_weight(endpoint, None))
            .await
            .map_err(|_| Error::Timeout(attempt_timeout))??;
        if !granted {
            return Err(Error::BudgetUnavailable {
                endpoint: endpoint.to_string(),
                weight: self.budget.weight_for(endpoint),
            });
        }

        let started = Instant::now();
        let result = match timeout_at(deadline, provider.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(attempt_timeout)),
        };
        let latency = started.elapsed();

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::PROVIDER_ATTEMPTS
            .with_label_values(&[provider.source_id(), outcome])
            .inc();
        metrics::PROVIDER_LATENCY.observe(latency.as_secs_f64());
        self.health.record(provider.source_id(), result.is_ok(), latency);

        result.map(|payload| (payload, latency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use crate::config::budget::{BudgetConfig, WeightRule};
    use crate::config::ingestion::HealthConfig;

    struct MockProvider {
        pub id: String,
        pub endpoint: String,
        pub fail: bool,
        pub delay: Duration,
        pub calls: AtomicU32,
    }

    impl MockProvider {
        fn build(id: &str, fail: bool, delay: Duration) -> Arc<Self> {
            Arc::new(MockProvider {
                id: id.to_string(),
                endpoint: "coins/markets".to_string(),
                fail,
                delay,
                calls: AtomicU32::new(0),
            })
        }

        pub fn ok(id: &str) -> Arc<Self> {
            Self::build(id, false, Duration::ZERO)
        }

        pub fn failing(id: &str) -> Arc<Self> {
            Self::build(id, true, Duration::ZERO)
        }

        pub fn slow(id: &str, delay: Duration) -> Arc<Self> {
            Self::build(id, false, delay)
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceProvider for MockProvider {
        fn source_id(&self) -> &str {
            &self.id
        }

        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        async fn fetch(&self) -> Result<RawPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::ProviderUnavailable {
                    source_id: self.id.clone(),
                    reason: "HTTP 503".to_string(),
                });
            }
            Ok(json!([{ "symbol": "btc", "current_price": 100.0 }]))
        }
    }

    fn fetcher(providers: Vec<Arc<dyn PriceProvider>>, budget: BudgetConfig) -> FailoverFetcher {
        FailoverFetcher::new(
            providers,
            Arc::new(RequestBudget::new(&budget)),
            Arc::new(SourceHealthTracker::new(HealthConfig::default())),
            RetryConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_failure_falls_back() {
        let primary = MockProvider::failing("coingecko");
        let fallback = MockProvider::ok("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback.clone()], BudgetConfig::default());

        let outcome = fetcher.fetch().await.unwrap();
        assert_eq!(outcome.source_id, "binance");
        assert_eq!(outcome.cycle, 0);

        let primary_health = fetcher.health().status("coingecko").unwrap();
        assert_eq!(primary_health.total_attempts, 1);
        assert_eq!(primary_health.successful_attempts, 0);
        let fallback_health = fetcher.health().status("binance").unwrap();
        assert_eq!(fallback_health.successful_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_skips_fallback() {
        let primary = MockProvider::ok("coingecko");
        let fallback = MockProvider::ok("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback.clone()], BudgetConfig::default());

        assert_eq!(fetcher.fetch().await.unwrap().source_id, "coingecko");
        assert_eq!(fallback.calls(), 0);
        assert!(fetcher.health().status("binance").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_order_holds_every_fetch() {
        let primary = MockProvider::failing("coingecko");
        let fallback = MockProvider::ok("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback.clone()], BudgetConfig::default());
        let rounds = 5;

        for _ in 0..rounds {
            let outcome = fetcher.fetch().await.unwrap();
            assert_eq!(outcome.source_id, "binance");
            assert_eq!(outcome.cycle, 0);
        }

        assert_eq!(primary.calls(), rounds);
        assert_eq!(fallback.calls(), rounds);
        let primary_health = fetcher.health().status("coingecko").unwrap();
        assert_eq!(primary_health.total_attempts, rounds as u64);
        assert_eq!(primary_health.successful_attempts, 0);
        let fallback_health = fetcher.health().status("binance").unwrap();
        assert_eq!(fallback_health.total_attempts, rounds as u64);
        assert_eq!(fallback_health.successful_attempts, rounds as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_backoff_cycles() {
        let primary = MockProvider::failing("coingecko");
        let fallback = MockProvider::failing("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback.clone()], BudgetConfig::default());

        let start = Instant::now();
        let err = fetcher.fetch().await.unwrap_err();

        match err {
            Error::AllProvidersExhausted { cycles, last_error } => {
                assert_eq!(cycles, 3);
                assert!(last_error.starts_with("binance"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 3);
        // 10s after the first cycle, 20s after the second, none after the last.
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
        assert_eq!(fetcher.health().status("coingecko").unwrap().total_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let primary = MockProvider::slow("coingecko", Duration::from_secs(30));
        let fallback = MockProvider::ok("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback], BudgetConfig::default());

        let start = Instant::now();
        let outcome = fetcher.fetch().await.unwrap();
        assert_eq!(outcome.source_id, "binance");
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
        assert_eq!(fetcher.health().status("coingecko").unwrap().successful_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_error_is_terminal() {
        let budget = BudgetConfig {
            weight_limit: 2,
            endpoint_weights: vec![WeightRule::new("coins/markets", 5)],
            ..BudgetConfig::default()
        };
        let primary = MockProvider::ok("coingecko");
        let fallback = MockProvider::ok("binance");
        let fetcher = fetcher(vec![primary.clone(), fallback.clone()], budget);

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, Error::ExceedsCapacity { requested: 5, capacity: 2 }));
        assert_eq!(primary.calls() + fallback.calls(), 0);
        assert!(fetcher.health().all().is_empty());
    }

    #[test]
    fn test_requires_providers() {
        let result = FailoverFetcher::new(
            Vec::new(),
            Arc::new(RequestBudget::new(&BudgetConfig::default())),
            Arc::new(SourceHealthTracker::default()),
            RetryConfig::default(),
        );
        assert!(matches!(result, Err(Error::NoProviders)));
    }
}
