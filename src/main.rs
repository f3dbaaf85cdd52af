use std::time::Duration;
use feed_infra::config::AppConfig;
use feed_infra::ingestion::IngestionOrchestrator;
use feed_infra::observability::metrics;
use feed_infra::observability::tracing::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("FEEDINFRA_ENV").unwrap_or_else(|_| feed_infra::DEFAULT_ENV.to_string());
    let config = AppConfig::load(&env)?;

    init_tracing(&config.logging)?;
    metrics::register_metrics();

    let orchestrator = IngestionOrchestrator::from_config(&config)?;
    for stream in orchestrator.streams() {
        stream.start();
    }
    orchestrator.start_continuous(None);

    tracing::info!(
        env = %env,
        providers = config.enabled_providers().count(),
        streams = orchestrator.streams().len(),
        "feed-infra started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut status_tick = tokio::time::interval(Duration::from_secs(
        config.ingestion.status_log_interval_secs.max(1),
    ));

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                tracing::info!("Shutdown requested");
                break;
            }
            _ = status_tick.tick() => log_status(&orchestrator),
        }
    }

    orchestrator.stop().await;
    for stream in orchestrator.streams() {
        stream.stop().await;
        if let Err(e) = stream.join().await {
            tracing::error!(source = %stream.source_id(), error = %e, "Stream ended with an error");
        }
    }

    tracing::debug!(metrics = %metrics::gather_metrics(), "Final metrics");
    tracing::info!("feed-infra stopped");
    Ok(())
}

fn log_status(orchestrator: &IngestionOrchestrator) {
    let status = orchestrator.status();
    tracing::info!(
        running = status.running,
        last_update = ?status.last_update,
        tracked = status.tracked_count,
        history = status.history_size,
        ticks_ok = status.ticks_ok,
        ticks_failed = status.ticks_failed,
        daily_actions = status.budget.daily_actions,
        weight_available = status.budget.weight_available,
        "Ingestion status"
    );

    for source in &status.sources {
        tracing::info!(
            source = %source.source_id,
            state = %source.state,
            uptime_pct = source.uptime_pct,
            avg_latency_secs = source.avg_latency_secs,
            "Source health"
        );
    }

    for stream in &status.stream {
        tracing::info!(
            source = %stream.source_id,
            phase = %stream.phase,
            messages = stream.messages_received,
            errors = stream.errors,
            reconnections = stream.reconnections,
            fatal = ?stream.fatal_error,
            "Stream status"
        );
    }
}
