use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Provider metrics
    pub static ref PROVIDER_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("provider_attempts_total", "Provider fetch attempts by source and outcome"),
        &["source", "outcome"]
    ).expect("valid metric definition");

    pub static ref PROVIDER_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "provider_latency_seconds",
            "Provider request latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).expect("valid metric definition");

    pub static ref FETCH_CYCLES_EXHAUSTED: IntCounter = IntCounter::new(
        "fetch_cycles_exhausted_total",
        "Fetches that failed on every provider after all retries"
    ).expect("valid metric definition");

    // Budget metrics
    pub static ref BUDGET_DENIED: IntCounter = IntCounter::new(
        "budget_denied_total",
        "Budget consumptions denied for lack of tokens"
    ).expect("valid metric definition");

    pub static ref BUDGET_HARD_LIMIT: IntCounter = IntCounter::new(
        "budget_hard_limit_total",
        "Actions refused by the daily hard cap"
    ).expect("valid metric definition");

    // Ingestion metrics
    pub static ref ANOMALIES_REJECTED: IntCounter = IntCounter::new(
        "anomalies_rejected_total",
        "Records rejected by the anomaly guard"
    ).expect("valid metric definition");

    pub static ref SNAPSHOTS_PUBLISHED: IntCounter = IntCounter::new(
        "snapshots_published_total",
        "Snapshots published to subscribers"
    ).expect("valid metric definition");

    pub static ref TICKS_FAILED: IntCounter = IntCounter::new(
        "ingest_ticks_failed_total",
        "Polling ticks that produced no snapshot"
    ).expect("valid metric definition");

    pub static ref HISTORY_SIZE: IntGauge = IntGauge::new(
        "snapshot_history_size",
        "Snapshots retained in the history ring"
    ).expect("valid metric definition");

    // Streaming metrics
    pub static ref STREAM_MESSAGES: IntCounter = IntCounter::new(
        "stream_messages_total",
        "Messages received over streaming connections"
    ).expect("valid metric definition");

    pub static ref STREAM_RECONNECTS: IntCounter = IntCounter::new(
        "stream_reconnects_total",
        "Successful streaming reconnections"
    ).expect("valid metric definition");

    pub static ref STREAM_CONNECTED: IntGauge = IntGauge::new(
        "stream_connections_active",
        "Streaming connections currently open"
    ).expect("valid metric definition");
}

static REGISTER: Once = Once::new();

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(PROVIDER_ATTEMPTS.clone()),
            Box::new(PROVIDER_LATENCY.clone()),
            Box::new(FETCH_CYCLES_EXHAUSTED.clone()),
            Box::new(BUDGET_DENIED.clone()),
            Box::new(BUDGET_HARD_LIMIT.clone()),
            Box::new(ANOMALIES_REJECTED.clone()),
            Box::new(SNAPSHOTS_PUBLISHED.clone()),
            Box::new(TICKS_FAILED.clone()),
            Box::new(HISTORY_SIZE.clone()),
            Box::new(STREAM_MESSAGES.clone()),
            Box::new(STREAM_RECONNECTS.clone()),
            Box::new(STREAM_CONNECTED.clone()),
        ];

        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!(error = %e, "Metric registration failed");
            }
        }
    });
}

/// Render the registry in the prometheus text exposition format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Metric encoding failed");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
