use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use crate::config::ingestion::HealthConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct SourceHealth {
    total_attempts: u64,
    successful_attempts: u64,
    cumulative_latency: Duration,
    last_attempt: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub uptime_pct: f64,
    pub avg_latency_secs: f64,
    pub state: HealthState,
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Success-rate and latency bookkeeping per upstream source.
pub struct SourceHealthTracker {
    config: HealthConfig,
    sources: Mutex<HashMap<String, SourceHealth>>,
}

impl SourceHealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        SourceHealthTracker {
            config,
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, source_id: &str, success: bool, latency: Duration) {
        let status = {
            let mut sources = self.sources.lock();
            let health = sources.entry(source_id.to_string()).or_default();
            health.total_attempts += 1;
            if success {
                health.successful_attempts += 1;
            }
            health.cumulative_latency += latency;
            health.last_attempt = Some(Utc::now());
            self.derive(source_id, health)
        };

        tracing::debug!(
            source = %source_id,
            success,
            uptime_pct = status.uptime_pct,
            avg_latency_secs = status.avg_latency_secs,
            state = %status.state,
            "Source health updated"
        );
    }

    pub fn status(&self, source_id: &str) -> Option<SourceStatus> {
        let sources = self.sources.lock();
        sources.get(source_id).map(|h| self.derive(source_id, h))
    }

    /// Every known source, sorted by id.
    pub fn all(&self) -> Vec<SourceStatus> {
        let mut statuses: Vec<_> = {
            let sources = self.sources.lock();
            sources.iter().map(|(id, h)| self.derive(id, h)).collect()
        };
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    fn derive(&self, source_id: &str, health: &SourceHealth) -> SourceStatus {
        let (uptime_pct, avg_latency_secs) = if health.total_attempts == 0 {
            (0.0, 0.0)
        } else {
            let total = health.total_attempts as f64;
            (
                health.successful_attempts as f64 / total * 100.0,
                health.cumulative_latency.as_secs_f64() / total,
            )
        };

        let state = if uptime_pct >= self.config.healthy_uptime_pct
            && avg_latency_secs < self.config.healthy_max_latency().as_secs_f64()
        {
            HealthState::Healthy
        } else if uptime_pct >= self.config.degraded_uptime_pct {
            HealthState::Degraded
        } else {
            HealthState::Unhealthy
        };

        SourceStatus {
            source_id: source_id.to_string(),
            total_attempts: health.total_attempts,
            successful_attempts: health.successful_attempts,
            uptime_pct,
            avg_latency_secs,
            state,
            last_attempt: health.last_attempt,
        }
    }
}

impl Default for SourceHealthTracker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_unknown_source_has_no_status() {
        let tracker = SourceHealthTracker::default();
        assert!(tracker.status("nowhere").is_none());
        assert!(tracker.all().is_empty());
    }

    #[test]
    fn test_healthy_requires_uptime_and_latency() {
        let tracker = SourceHealthTracker::default();
        for _ in 0..20 {
            tracker.record("fast", true, ms(100));
            tracker.record("slow", true, ms(2500));
        }

        let fast = tracker.status("fast").unwrap();
        assert_eq!(fast.state, HealthState::Healthy);
        assert_eq!(fast.total_attempts, 20);
        assert!((fast.uptime_pct - 100.0).abs() < 1e-9);
        assert!((fast.avg_latency_secs - 0.1).abs() < 1e-9);

        // full uptime but too slow
        assert_eq!(tracker.status("slow").unwrap().state, HealthState::Degraded);
    }

    #[test]
    fn test_state_thresholds() {
        let tracker = SourceHealthTracker::default();

        // 9/10 = 90% → degraded
        for i in 0..10 {
            tracker.record("flaky", i != 0, ms(50));
        }
        assert_eq!(tracker.status("flaky").unwrap().state, HealthState::Degraded);

        // 1/2 = 50% → unhealthy
        tracker.record("broken", true, ms(50));
        tracker.record("broken", false, ms(50));
        assert_eq!(tracker.status("broken").unwrap().state, HealthState::Unhealthy);

        let ids: Vec<_> = tracker.all().into_iter().map(|s| s.source_id).collect();
        assert_eq!(ids, vec!["broken", "flaky"]);
    }

    #[test]
    fn test_custom_thresholds() {
        let tracker = SourceHealthTracker::new(HealthConfig {
            healthy_uptime_pct: 50.0,
            healthy_max_latency_ms: 10_000,
            degraded_uptime_pct: 10.0,
        });
        tracker.record("lenient", true, ms(5_000));
        tracker.record("lenient", false, ms(5_000));

        assert_eq!(tracker.status("lenient").unwrap().state, HealthState::Healthy);
    }
}
