use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `(pattern, weight)` rule of the endpoint weight table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeightRule {
    pub pattern: String,
    pub weight: u32,
}

impl WeightRule {
    pub fn new(pattern: &str, weight: u32) -> Self {
        WeightRule {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub weight_limit: u32,
    pub weight_window_secs: u64,
    pub action_limit: u32,
    pub action_window_secs: u64,
    pub daily_action_limit: usize,
    pub history_capacity: usize,
    pub default_weight: u32,
    /// Evaluated in order: exact matches first, then substring matches.
    pub endpoint_weights: Vec<WeightRule>,
}

impl BudgetConfig {
    pub fn weight_window(&self) -> Duration {
        Duration::from_secs(self.weight_window_secs)
    }

    pub fn action_window(&self) -> Duration {
        Duration::from_secs(self.action_window_secs)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            weight_limit: 1200,      // per minute
            weight_window_secs: 60,
            action_limit: 20,        // per 10 seconds
            action_window_secs: 10,
            daily_action_limit: 100_000,
            history_capacity: 1000,
            default_weight: 1,
            endpoint_weights: vec![
                WeightRule::new("ticker/price", 2),
                WeightRule::new("ticker/24hr", 40),
                WeightRule::new("depth", 10),
                WeightRule::new("klines", 2),
                WeightRule::new("account", 20),
                WeightRule::new("order/test", 1),
                WeightRule::new("order", 1),
                WeightRule::new("openOrders", 40),
                WeightRule::new("allOrders", 20),
                WeightRule::new("coins/markets", 1),
            ],
        }
    }
}
