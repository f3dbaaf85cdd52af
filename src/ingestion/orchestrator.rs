use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;
use tracing::Instrument;
use uuid::Uuid;
use crate::config::ingestion::{AnomalyConfig, IngestionConfig};
use crate::config::loader::AppConfig;
use crate::error::Result;
use crate::ingestion::snapshot::{InstrumentPoint, Snapshot, SnapshotHistory};
use crate::observability::metrics;
use crate::observability::tracing::trace_ingest_tick;
use crate::price_infra::anomaly::{AnomalyGuard, Verdict};
use crate::price_infra::failover::FailoverFetcher;
use crate::price_infra::health::{SourceHealthTracker, SourceStatus};
use crate::price_infra::normalizer::{Normalizer, StandardNormalizer};
use crate::price_infra::providers::build_providers;
use crate::price_infra::MarketRecord;
use crate::rate_limit::{BudgetStats, RequestBudget};
use crate::streaming::{StreamStats, StreamingClient, WsConnector};
use crate::utils::helper::run_isolated;
use crate::utils::shutdown::{ShutdownListener, ShutdownSignal};

pub type SnapshotCallback = Arc<dyn Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub running: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub tracked_count: usize,
    pub history_size: usize,
    pub sources: Vec<SourceStatus>,
    pub budget: BudgetStats,
    pub stream: Vec<StreamStats>,
    pub ticks_ok: u64,
    pub ticks_failed: u64,
}

struct Pipeline {
    fetcher: FailoverFetcher,
    normalizer: Arc<dyn Normalizer>,
    guard: AnomalyGuard,
    config: IngestionConfig,
    history: Mutex<SnapshotHistory>,
    callback: Mutex<Option<SnapshotCallback>>,
    publisher: broadcast::Sender<Arc<Snapshot>>,
    ticks_ok: AtomicU64,
    ticks_failed: AtomicU64,
}

#[derive(Default)]
struct Control {
    signal: Option<ShutdownSignal>,
    task: Option<JoinHandle<()>>,
}

/// Drives the poll → normalize → validate → publish cycle.
pub struct IngestionOrchestrator {
    pipeline: Arc<Pipeline>,
    streams: Vec<Arc<StreamingClient>>,
    control: Mutex<Control>,
}

impl IngestionOrchestrator {
    pub fn new(
        fetcher: FailoverFetcher,
        normalizer: Arc<dyn Normalizer>,
        anomaly: &AnomalyConfig,
        config: IngestionConfig,
    ) -> Self {
        let (publisher, _) = broadcast::channel(config.subscriber_capacity.max(1));
        IngestionOrchestrator {
            pipeline: Arc::new(Pipeline {
                fetcher,
                normalizer,
                guard: AnomalyGuard::new(anomaly),
                history: Mutex::new(SnapshotHistory::new(config.history_capacity)),
                config,
                callback: Mutex::new(None),
                publisher,
                ticks_ok: AtomicU64::new(0),
                ticks_failed: AtomicU64::new(0),
            }),
            streams: Vec::new(),
            control: Mutex::new(Control::default()),
        }
    }

    /// Wire the production components described by `app`.
    pub fn from_config(app: &AppConfig) -> Result<Self> {
        let budget = Arc::new(RequestBudget::new(&app.budget));
        let health = Arc::new(SourceHealthTracker::new(app.health.clone()));

        let providers = build_providers(app.enabled_providers(), app.ingestion.tracked_count)?;
        let normalizer = app
            .enabled_providers()
            .fold(StandardNormalizer::new(app.ingestion.tracked_count), |n, p| {
                n.with_source(&p.source_id, p.kind)
            });
        let fetcher = FailoverFetcher::new(providers, budget, health.clone(), app.retry.clone())?;

        let mut orchestrator = Self::new(fetcher, Arc::new(normalizer), &app.anomaly, app.ingestion.clone());
        if app.stream.enabled {
            for client in StreamingClient::from_config(app.stream.clone(), Arc::new(WsConnector), health, None)? {
                orchestrator = orchestrator.with_stream(Arc::new(client));
            }
        }
        Ok(orchestrator)
    }

    pub fn with_stream(mut self, client: Arc<StreamingClient>) -> Self {
        self.streams.push(client);
        self
    }

    pub fn streams(&self) -> &[Arc<StreamingClient>] {
        &self.streams
    }

    /// Run one full cycle outside the polling loop.
    pub async fn fetch_once(&self) -> Result<Arc<Snapshot>> {
        self.pipeline.tick().await
    }

    /// Start the polling loop. No-op while it is already running.
    pub fn start_continuous(&self, callback: Option<SnapshotCallback>) {
        let mut control = self.control.lock();
        if Self::loop_running(&control) {
            tracing::debug!("Ingestion loop already running");
            return;
        }

        *self.pipeline.callback.lock() = callback;

        let signal = ShutdownSignal::new();
        let listener = signal.listener();
        let pipeline = self.pipeline.clone();
        control.task = Some(tokio::spawn(async move { pipeline.run(listener).await }));
        control.signal = Some(signal);

        tracing::info!(
            poll_interval_ms = self.pipeline.config.poll_interval_ms,
            "Continuous ingestion started"
        );
    }

    /// Stop the loop, waiting at most one poll interval before aborting it.
    pub async fn stop(&self) {
        let (signal, task) = {
            let mut control = self.control.lock();
            (control.signal.take(), control.task.take())
        };

        let Some(signal) = signal else {
            return;
        };
        signal.trigger();

        if let Some(mut task) = task {
            let grace = self.pipeline.config.poll_interval();
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::warn!("Ingestion loop did not stop within one poll interval, aborting");
                task.abort();
            }
        }
        tracing::info!("Continuous ingestion stopped");
    }

    pub fn is_running(&self) -> bool {
        Self::loop_running(&self.control.lock())
    }

    fn loop_running(control: &Control) -> bool {
        let signalled = control.signal.as_ref().is_none_or(|s| s.is_triggered());
        let finished = control.task.as_ref().is_none_or(|t| t.is_finished());
        !signalled && !finished
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.pipeline.publisher.subscribe()
    }

    pub fn snapshot_stream(&self) -> BroadcastStream<Arc<Snapshot>> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.pipeline.history.lock().latest()
    }

    pub fn history(&self, limit: usize) -> Vec<Arc<Snapshot>> {
        self.pipeline.history.lock().recent(limit)
    }

    pub fn instrument_history(&self, instrument_id: &str, limit: usize) -> Vec<InstrumentPoint> {
        self.pipeline.history.lock().instrument_series(instrument_id, limit)
    }

    pub fn get_latest_stream_price(&self, topic: &str) -> Option<f64> {
        self.streams.iter().find_map(|s| s.latest_price(topic))
    }

    pub fn status(&self) -> SystemStatus {
        let (last_update, history_size, tracked_count) = {
            let history = self.pipeline.history.lock();
            let latest = history.latest();
            (
                latest.as_ref().map(|s| s.created_at),
                history.len(),
                latest.map(|s| s.records.len()).unwrap_or(0),
            )
        };

        SystemStatus {
            running: self.is_running(),
            last_update,
            tracked_count,
            history_size,
            sources: self.pipeline.fetcher.health().all(),
            budget: self.pipeline.fetcher.budget().stats(),
            stream: self.streams.iter().map(|s| s.stats()).collect(),
            ticks_ok: self.pipeline.ticks_ok.load(Ordering::Relaxed),
            ticks_failed: self.pipeline.ticks_failed.load(Ordering::Relaxed),
        }
    }
}

impl Pipeline {
    async fn run(self: Arc<Self>, mut listener: ShutdownListener) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = listener.wait() => break,
                _ = interval.tick() => {}
            }
            tick += 1;

            let outcome = tokio::select! {
                _ = listener.wait() => break,
                outcome = self.tick().instrument(trace_ingest_tick(tick)) => outcome,
            };

            if let Err(e) = outcome {
                tracing::error!(tick, error = %e, "Ingestion tick failed, keeping previous snapshot");
            }
        }

        tracing::debug!(ticks = tick, "Ingestion loop exited");
    }

    async fn tick(&self) -> Result<Arc<Snapshot>> {
        match self.ingest().await {
            Ok(snapshot) => {
                self.ticks_ok.fetch_add(1, Ordering::Relaxed);
                Ok(snapshot)
            }
            Err(e) => {
                self.ticks_failed.fetch_add(1, Ordering::Relaxed);
                metrics::TICKS_FAILED.inc();
                Err(e)
            }
        }
    }

    async fn ingest(&self) -> Result<Arc<Snapshot>> {
        let outcome = self.fetcher.fetch().await?;
        let records = self.normalizer.normalize(&outcome.source_id, &outcome.payload)?;
        let records = self.select_tracked(records);

        let mut accepted = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            match self.guard.validate_sample(&record.sample()) {
                Verdict::Accepted => accepted.push(record),
                Verdict::Rejected(rejection) => {
                    metrics::ANOMALIES_REJECTED.inc();
                    tracing::warn!(source = %outcome.source_id, %rejection, "Record rejected");
                    rejected.push(rejection);
                }
            }
        }

        let snapshot = Arc::new(Snapshot {
            id: Uuid::new_v4(),
            source_id: outcome.source_id,
            records: accepted,
            rejected,
            created_at: Utc::now(),
            fetch_latency_ms: outcome.latency.as_millis() as u64,
            cycle: outcome.cycle,
        });

        self.publish(&snapshot);
        Ok(snapshot)
    }

    /// Explicit instrument list when configured, otherwise the top N by volume.
    fn select_tracked(&self, mut records: Vec<MarketRecord>) -> Vec<MarketRecord> {
        let wanted = &self.config.tracked_instruments;
        if !wanted.is_empty() {
            records.retain(|r| wanted.iter().any(|w| w.eq_ignore_ascii_case(&r.instrument_id)));
            return records;
        }

        records.sort_by(|a, b| b.volume.total_cmp(&a.volume));
        records.truncate(self.config.tracked_count);
        records
    }

    fn publish(&self, snapshot: &Arc<Snapshot>) {
        let history_size = {
            let mut history = self.history.lock();
            history.push(snapshot.clone());
            history.len()
        };
        metrics::HISTORY_SIZE.set(history_size as i64);
        metrics::SNAPSHOTS_PUBLISHED.inc();

        // no subscribers is fine
        let _ = self.publisher.send(snapshot.clone());

        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            run_isolated("snapshot", || callback(snapshot.as_ref()));
        }

        tracing::info!(
            snapshot = %snapshot.id,
            source = %snapshot.source_id,
            records = snapshot.records.len(),
            rejected = snapshot.rejected.len(),
            latency_ms = snapshot.fetch_latency_ms,
            "Snapshot published"
        );
    }
}
