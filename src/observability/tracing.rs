use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use crate::config::loader::LoggingConfig;
use crate::error::{Error, Result};

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::ConfigError(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| Error::ConfigError(format!("tracing already initialized: {}", e)))
}

pub fn trace_fetch_cycle(cycle: u32) -> Span {
    tracing::info_span!(
        "fetch_cycle",
        cycle,
    )
}

pub fn trace_ingest_tick(tick: u64) -> Span {
    tracing::info_span!(
        "ingest_tick",
        tick,
    )
}

pub fn trace_stream_session(source_id: &str, url: &str) -> Span {
    tracing::info_span!(
        "stream_session",
        source = %source_id,
        url = %url,
    )
}
