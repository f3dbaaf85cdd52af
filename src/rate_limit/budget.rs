use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use crate::config::budget::{BudgetConfig, WeightRule};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::rate_limit::token_bucket::TokenBucket;

pub const DAILY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const ACTION_ENDPOINT: &str = "<action>";

/// Ordered endpoint → weight table.
#[derive(Clone, Debug)]
pub struct EndpointWeights {
    rules: Vec<WeightRule>,
    default_weight: u32,
}

impl EndpointWeights {
    pub fn new(rules: Vec<WeightRule>, default_weight: u32) -> Self {
        EndpointWeights { rules, default_weight }
    }

    /// Exact match, then the first rule whose pattern occurs in `endpoint`, then the default.
    pub fn resolve(&self, endpoint: &str) -> u32 {
        if let Some(rule) = self.rules.iter().find(|r| r.pattern == endpoint) {
            return rule.weight;
        }

        if let Some(rule) = self.rules.iter().find(|r| endpoint.contains(r.pattern.as_str())) {
            return rule.weight;
        }

        tracing::warn!(
            endpoint,
            default_weight = self.default_weight,
            "Unknown endpoint weight, using default"
        );
        self.default_weight
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionKind {
    Weight,
    Action,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsumptionRecord {
    pub kind: ConsumptionKind,
    pub endpoint: String,
    pub weight: u32,
    pub at: DateTime<Utc>,
    pub granted: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct BudgetStats {
    pub weight_available: f64,
    pub weight_capacity: u32,
    pub action_available: f64,
    pub action_capacity: u32,
    pub daily_actions: usize,
    pub daily_limit: usize,
    pub recent_requests: usize,
}

/// Rolling 24h action log. Entries are pruned eagerly so it never holds more than `limit`.
struct DailyCap {
    limit: usize,
    entries: VecDeque<Instant>,
}

impl DailyCap {
    fn new(limit: usize) -> Self {
        DailyCap {
            limit,
            entries: VecDeque::with_capacity(limit.min(4096)),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.entries.front() {
            if now.saturating_duration_since(front) > DAILY_WINDOW {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn check(&mut self, now: Instant) -> Result<()> {
        self.prune(now);
        if self.entries.len() >= self.limit {
            return Err(Error::BudgetExceeded { limit: self.limit });
        }
        Ok(())
    }
}

/// Multi-dimensional request budget: weight per window, actions per window, actions per 24h.
///
/// Constructed explicitly and shared by `Arc`; independent instances never interact.
pub struct RequestBudget {
    weights: EndpointWeights,
    weight_bucket: TokenBucket,
    action_bucket: TokenBucket,
    daily: Mutex<DailyCap>,
    history: Mutex<VecDeque<ConsumptionRecord>>,
    history_capacity: usize,
}

impl RequestBudget {
    pub fn new(config: &BudgetConfig) -> Self {
        tracing::info!(
            weight_limit = config.weight_limit,
            weight_window_secs = config.weight_window_secs,
            action_limit = config.action_limit,
            action_window_secs = config.action_window_secs,
            daily_action_limit = config.daily_action_limit,
            "Request budget initialized"
        );

        RequestBudget {
            weights: EndpointWeights::new(config.endpoint_weights.clone(), config.default_weight),
            weight_bucket: TokenBucket::from_window(config.weight_limit, config.weight_window()),
            action_bucket: TokenBucket::from_window(config.action_limit, config.action_window()),
            daily: Mutex::new(DailyCap::new(config.daily_action_limit)),
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity.min(4096))),
            history_capacity: config.history_capacity,
        }
    }

    pub fn weight_for(&self, endpoint: &str) -> u32 {
        self.weights.resolve(endpoint)
    }

    /// Consume the endpoint's weight, waiting for the refill if necessary.
    pub async fn consume_weight(&self, endpoint: &str, weight_override: Option<u32>) -> Result<bool> {
        let weight = weight_override.unwrap_or_else(|| self.weights.resolve(endpoint));
        let result = self.weight_bucket.consume(weight, true).await;
        self.finish(ConsumptionKind::Weight, endpoint, weight, result)
    }

    pub fn try_consume_weight(&self, endpoint: &str, weight_override: Option<u32>) -> Result<bool> {
        let weight = weight_override.unwrap_or_else(|| self.weights.resolve(endpoint));
        let result = self.weight_bucket.try_consume(weight);
        self.finish(ConsumptionKind::Weight, endpoint, weight, result)
    }

    /// Consume one action, waiting on the short-window bucket if necessary.
    ///
    /// Fails with [`Error::BudgetExceeded`] when the daily cap is reached. The short-window
    /// charge is not refunded if the cap fills up while waiting.
    pub async fn consume_action(&self) -> Result<bool> {
        let admitted = self.daily.lock().check(Instant::now());
        let result = match admitted {
            Err(e) => Err(e),
            Ok(()) => match self.action_bucket.consume(1, true).await {
                Ok(true) => self.commit_action(Instant::now()),
                other => other,
            },
        };
        self.finish(ConsumptionKind::Action, ACTION_ENDPOINT, 1, result)
    }

    pub fn try_consume_action(&self) -> Result<bool> {
        self.try_consume_action_at(Instant::now())
    }

    pub(crate) fn try_consume_action_at(&self, now: Instant) -> Result<bool> {
        let admitted = self.daily.lock().check(now);
        let result = match admitted {
            Err(e) => Err(e),
            Ok(()) => match self.action_bucket.try_consume_at(1, now) {
                Ok(true) => self.commit_action(now),
                other => other,
            },
        };
        self.finish(ConsumptionKind::Action, ACTION_ENDPOINT, 1, result)
    }

    fn commit_action(&self, now: Instant) -> Result<bool> {
        let mut daily = self.daily.lock();
        daily.check(now)?;
        daily.entries.push_back(now);
        tracing::debug!(daily_total = daily.entries.len(), "Action consumed");
        Ok(true)
    }

    fn finish(
        &self,
        kind: ConsumptionKind,
        endpoint: &str,
        weight: u32,
        result: Result<bool>,
    ) -> Result<bool> {
        let granted = matches!(result, Ok(true));

        {
            let mut history = self.history.lock();
            if self.history_capacity > 0 {
                if history.len() == self.history_capacity {
                    history.pop_front();
                }
                history.push_back(ConsumptionRecord {
                    kind,
                    endpoint: endpoint.to_string(),
                    weight,
                    at: Utc::now(),
                    granted,
                });
            }
        }

        match &result {
            Ok(true) => {}
            Ok(false) => metrics::BUDGET_DENIED.inc(),
            Err(Error::BudgetExceeded { limit }) => {
                metrics::BUDGET_HARD_LIMIT.inc();
                tracing::error!(limit, "Daily action limit reached");
            }
            Err(e) => tracing::error!(endpoint, weight, error = %e, "Budget consumption rejected"),
        }

        result
    }

    pub fn recent(&self, limit: usize) -> Vec<ConsumptionRecord> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> BudgetStats {
        let (daily_actions, daily_limit) = {
            let mut daily = self.daily.lock();
            daily.prune(Instant::now());
            (daily.entries.len(), daily.limit)
        };
        let recent_requests = self.history.lock().len();

        BudgetStats {
            weight_available: self.weight_bucket.available(),
            weight_capacity: self.weight_bucket.capacity(),
            action_available: self.action_bucket.available(),
            action_capacity: self.action_bucket.capacity(),
            daily_actions,
            daily_limit,
            recent_requests,
        }
    }
}
