use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use crate::config::budget::BudgetConfig;
use crate::config::ingestion::{AnomalyConfig, HealthConfig, IngestionConfig, ProviderConfig, RetryConfig};
use crate::config::stream::StreamConfig;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    pub budget: BudgetConfig,
    pub anomaly: AnomalyConfig,
    pub retry: RetryConfig,
    pub health: HealthConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
    pub providers: Vec<ProviderConfig>,
}

impl AppConfig {
    /// Layered load: `config/default`, `config/{env}`, then `FEEDINFRA_*` variables
    /// (`__` separates nesting, e.g. `FEEDINFRA_INGESTION__POLL_INTERVAL_MS`).
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("FEEDINFRA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        app.apply_provider_defaults();
        app.validate()?;
        Ok(app)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut app: AppConfig = toml::from_str(text)?;
        app.apply_provider_defaults();
        app.validate()?;
        Ok(app)
    }

    fn apply_provider_defaults(&mut self) {
        if self.providers.is_empty() {
            self.providers = vec![ProviderConfig::coingecko(), ProviderConfig::binance()];
        }
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    pub fn validate(&self) -> Result<()> {
        let budget = &self.budget;
        if budget.weight_limit == 0 || budget.action_limit == 0 {
            return Err(Error::ConfigError("budget limits must be positive".into()));
        }
        if budget.weight_window_secs == 0 || budget.action_window_secs == 0 {
            return Err(Error::ConfigError("budget windows must be positive".into()));
        }
        if budget.daily_action_limit == 0 {
            return Err(Error::ConfigError("daily action limit must be positive".into()));
        }
        if let Some(rule) = budget.endpoint_weights.iter().find(|r| r.weight > budget.weight_limit) {
            return Err(Error::ConfigError(format!(
                "endpoint '{}' weight {} exceeds weight limit {}",
                rule.pattern, rule.weight, budget.weight_limit
            )));
        }

        if self.ingestion.poll_interval_ms == 0 {
            return Err(Error::ConfigError("poll interval must be positive".into()));
        }
        if self.ingestion.history_capacity == 0 || self.ingestion.subscriber_capacity == 0 {
            return Err(Error::ConfigError("history and subscriber capacities must be positive".into()));
        }

        // a mean needs two accepted prices before anything can be rejected
        if self.anomaly.window < 2 {
            return Err(Error::ConfigError("anomaly window must hold at least 2 samples".into()));
        }
        if !(self.anomaly.threshold_pct.is_finite() && self.anomaly.threshold_pct > 0.0) {
            return Err(Error::ConfigError("anomaly threshold must be a positive percentage".into()));
        }

        let health = &self.health;
        if !(0.0..=100.0).contains(&health.healthy_uptime_pct)
            || !(0.0..=100.0).contains(&health.degraded_uptime_pct)
            || health.degraded_uptime_pct > health.healthy_uptime_pct
        {
            return Err(Error::ConfigError("health thresholds must satisfy 0 <= degraded <= healthy <= 100".into()));
        }

        if self.retry.max_retries == 0 {
            return Err(Error::ConfigError("max_retries must be at least 1".into()));
        }

        if self.enabled_providers().next().is_none() {
            return Err(Error::ConfigError("at least one provider must be enabled".into()));
        }

        if self.stream.enabled {
            if self.stream.topics.is_empty() {
                return Err(Error::ConfigError("stream enabled without topics".into()));
            }
            if self.stream.max_reconnect_attempts == 0 {
                return Err(Error::ConfigError("max_reconnect_attempts must be at least 1".into()));
            }
        }

        Ok(())
    }
}
