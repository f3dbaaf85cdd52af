use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::Instrument;
use crate::config::stream::StreamConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::observability::tracing::trace_stream_session;
use crate::price_infra::health::SourceHealthTracker;
use crate::streaming::envelope::{latest_price, parse_envelope, StreamEnvelope};
use crate::streaming::transport::{StreamConnector, StreamTransport};
use crate::utils::helper::{exponential_backoff, run_isolated};
use crate::utils::shutdown::{ShutdownListener, ShutdownSignal};

pub type StreamCallback = Arc<dyn Fn(&StreamEnvelope) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Stopped,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamPhase::Disconnected => "disconnected",
            StreamPhase::Connecting => "connecting",
            StreamPhase::Connected => "connected",
            StreamPhase::Reconnecting => "reconnecting",
            StreamPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub source_id: String,
    pub url: String,
    pub phase: StreamPhase,
    pub connected: bool,
    pub messages_received: u64,
    pub errors: u64,
    pub reconnections: u64,
    pub reconnect_attempts: u32,
    pub uptime_seconds: f64,
    pub messages_per_second: f64,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Why the reader gave up, if it did.
    pub fatal_error: Option<String>,
}

struct ConnectionState {
    phase: StreamPhase,
    latest: HashMap<String, Value>,
    messages_received: u64,
    errors: u64,
    reconnections: u64,
    /// Consecutive failed connection attempts.
    reconnect_attempts: u32,
    last_message_at: Option<DateTime<Utc>>,
    /// Set on every successful connect.
    connected_at: Option<Instant>,
    fatal: Option<String>,
}

impl ConnectionState {
    fn new() -> Self {
        ConnectionState {
            phase: StreamPhase::Disconnected,
            latest: HashMap::new(),
            messages_received: 0,
            errors: 0,
            reconnections: 0,
            reconnect_attempts: 0,
            last_message_at: None,
            connected_at: None,
            fatal: None,
        }
    }
}

enum ReadEnd {
    Stopped,
    Lost(String),
}

struct Session {
    config: StreamConfig,
    url: String,
    connector: Arc<dyn StreamConnector>,
    health: Arc<SourceHealthTracker>,
    callback: Option<StreamCallback>,
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct Control {
    signal: Option<ShutdownSignal>,
    task: Option<JoinHandle<Result<()>>>,
    /// Outcome of a reader that ended before anyone joined it.
    finished: Option<Result<()>>,
}

impl Control {
    /// Keep the result of a reader task that has already ended.
    fn reap(&mut self) {
        if !self.task.as_ref().is_some_and(|t| t.is_finished()) {
            return;
        }
        if let Some(task) = self.task.as_mut() {
            if let Some(result) = task.now_or_never() {
                self.task = None;
                self.finished = Some(flatten(result));
            }
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| Error::ConnectionLost(format!("stream reader task failed: {}", e)))?
}

/// Long-lived push subscription with bounded exponential-backoff reconnects.
pub struct StreamingClient {
    session: Arc<Session>,
    control: Mutex<Control>,
}

impl StreamingClient {
    pub fn new(
        config: StreamConfig,
        connector: Arc<dyn StreamConnector>,
        health: Arc<SourceHealthTracker>,
        callback: Option<StreamCallback>,
    ) -> Result<Self> {
        if config.topics.is_empty() {
            return Err(Error::ConfigError("stream needs at least one topic".to_string()));
        }
        if config.topics.len() > 1 && !(config.multiplex && connector.supports_multiplex()) {
            return Err(Error::ConfigError(format!(
                "{} topics need a multiplexing transport; use StreamingClient::per_topic",
                config.topics.len()
            )));
        }

        let url = stream_url(&config.base_url, &config.topics, &config.stream_type);
        Ok(StreamingClient {
            session: Arc::new(Session {
                config,
                url,
                connector,
                health,
                callback,
                state: Mutex::new(ConnectionState::new()),
            }),
            control: Mutex::new(Control::default()),
        })
    }

    /// One client per topic, for transports that cannot multiplex.
    pub fn per_topic(
        config: StreamConfig,
        connector: Arc<dyn StreamConnector>,
        health: Arc<SourceHealthTracker>,
        callback: Option<StreamCallback>,
    ) -> Result<Vec<Self>> {
        config
            .topics
            .iter()
            .map(|topic| {
                let single = StreamConfig {
                    topics: vec![topic.clone()],
                    ..config.clone()
                };
                Self::new(single, connector.clone(), health.clone(), callback.clone())
            })
            .collect()
    }

    /// A single multiplexed client when possible, otherwise one per topic.
    pub fn from_config(
        config: StreamConfig,
        connector: Arc<dyn StreamConnector>,
        health: Arc<SourceHealthTracker>,
        callback: Option<StreamCallback>,
    ) -> Result<Vec<Self>> {
        if config.multiplex && connector.supports_multiplex() {
            Ok(vec![Self::new(config, connector, health, callback)?])
        } else {
            Self::per_topic(config, connector, health, callback)
        }
    }

    pub fn url(&self) -> &str {
        &self.session.url
    }

    pub fn source_id(&self) -> &str {
        &self.session.config.source_id
    }

    pub fn topics(&self) -> &[String] {
        &self.session.config.topics
    }

    pub fn is_running(&self) -> bool {
        let control = self.control.lock();
        control.signal.as_ref().is_some_and(|s| !s.is_triggered()) && self.phase() != StreamPhase::Stopped
    }

    /// Spawn the reader task. No-op while it is already running.
    pub fn start(&self) {
        let mut control = self.control.lock();
        let running = control.signal.as_ref().is_some_and(|s| !s.is_triggered())
            && self.phase() != StreamPhase::Stopped;
        if running {
            tracing::debug!(source = %self.source_id(), "Stream already running");
            return;
        }
        control.reap();

        {
            let mut state = self.session.state.lock();
            state.phase = StreamPhase::Disconnected;
            state.reconnect_attempts = 0;
            state.connected_at = None;
            state.fatal = None;
        }

        let signal = ShutdownSignal::new();
        let listener = signal.listener();
        let session = self.session.clone();
        let span = trace_stream_session(&session.config.source_id, &session.url);

        control.task = Some(tokio::spawn(async move { session.run(listener).await }.instrument(span)));
        control.signal = Some(signal);
        tracing::info!(source = %self.source_id(), url = %self.url(), "Stream started");
    }

    /// Signal the reader, wait briefly for it to close the transport, then abort it.
    ///
    /// A reader that already failed keeps its error for [`StreamingClient::join`].
    pub async fn stop(&self) {
        let (signal, task) = {
            let mut control = self.control.lock();
            (control.signal.take(), control.task.take())
        };

        if let Some(signal) = &signal {
            signal.trigger();
        }

        if let Some(mut task) = task {
            let grace = self.session.config.connect_timeout();
            match timeout(grace, &mut task).await {
                Ok(joined) => {
                    if let Err(e) = flatten(joined) {
                        self.control.lock().finished = Some(Err(e));
                    }
                }
                Err(_) => {
                    tracing::warn!(source = %self.source_id(), "Stream reader did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        let was_running = {
            let mut state = self.session.state.lock();
            let was = state.phase != StreamPhase::Stopped;
            state.phase = StreamPhase::Stopped;
            was
        };
        if was_running {
            metrics::STREAM_CONNECTED.set(0);
            tracing::info!(source = %self.source_id(), "Stream stopped");
        }
    }

    /// Wait for the reader task to end.
    ///
    /// Yields [`Error::ReconnectExhausted`] once when the reconnect limit stopped the client.
    pub async fn join(&self) -> Result<()> {
        let task = {
            let mut control = self.control.lock();
            if let Some(result) = control.finished.take() {
                return result;
            }
            control.task.take()
        };
        match task {
            Some(task) => flatten(task.await),
            None => Ok(()),
        }
    }

    pub fn latest(&self, topic: &str) -> Option<Value> {
        self.session.state.lock().latest.get(&topic.to_uppercase()).cloned()
    }

    pub fn latest_price(&self, topic: &str) -> Option<f64> {
        let state = self.session.state.lock();
        state.latest.get(&topic.to_uppercase()).and_then(latest_price)
    }

    pub fn all_prices(&self) -> HashMap<String, f64> {
        let state = self.session.state.lock();
        state
            .latest
            .iter()
            .filter_map(|(topic, payload)| latest_price(payload).map(|p| (topic.clone(), p)))
            .collect()
    }

    pub fn phase(&self) -> StreamPhase {
        self.session.state.lock().phase
    }

    pub fn stats(&self) -> StreamStats {
        let state = self.session.state.lock();
        let uptime_seconds = state
            .connected_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let messages_per_second = if uptime_seconds > 0.0 {
            state.messages_received as f64 / uptime_seconds
        } else {
            0.0
        };

        StreamStats {
            source_id: self.session.config.source_id.clone(),
            url: self.session.url.clone(),
            phase: state.phase,
            connected: state.phase == StreamPhase::Connected,
            messages_received: state.messages_received,
            errors: state.errors,
            reconnections: state.reconnections,
            reconnect_attempts: state.reconnect_attempts,
            uptime_seconds,
            messages_per_second,
            last_message_at: state.last_message_at,
            fatal_error: state.fatal.clone(),
        }
    }
}

impl Session {
    async fn run(self: Arc<Self>, mut listener: ShutdownListener) -> Result<()> {
        let source_id = self.config.source_id.as_str();
        let connect_timeout = self.config.connect_timeout();
        let max_attempts = self.config.max_reconnect_attempts;
        let mut connected_before = false;

        let result = loop {
            if listener.is_shutdown() {
                break Ok(());
            }
            self.set_phase(StreamPhase::Connecting);

            let started = Instant::now();
            let attempt = tokio::select! {
                _ = listener.wait() => break Ok(()),
                attempt = timeout(connect_timeout, self.connector.connect(&self.url)) => {
                    attempt.unwrap_or_else(|_| Err(Error::Timeout(connect_timeout)))
                }
            };
            self.health.record(source_id, attempt.is_ok(), started.elapsed());

            let failures = match attempt {
                Ok(mut transport) => {
                    self.on_connected(connected_before);
                    connected_before = true;

                    let end = self.read_until_lost(transport.as_mut(), &mut listener).await;
                    if let Err(e) = transport.close().await {
                        tracing::debug!(source = %source_id, error = %e, "Transport close failed");
                    }
                    metrics::STREAM_CONNECTED.set(0);

                    match end {
                        ReadEnd::Stopped => break Ok(()),
                        ReadEnd::Lost(reason) => {
                            tracing::warn!(source = %source_id, reason = %reason, "Stream connection lost");
                        }
                    }
                    0
                }
                Err(e) => {
                    let failures = {
                        let mut state = self.state.lock();
                        state.reconnect_attempts += 1;
                        state.reconnect_attempts
                    };
                    tracing::warn!(
                        source = %source_id,
                        attempt = failures,
                        max_attempts,
                        error = %e,
                        "Stream connection attempt failed"
                    );
                    if failures >= max_attempts {
                        tracing::error!(source = %source_id, attempts = failures, "Reconnect attempts exhausted, stopping");
                        break Err(Error::ReconnectExhausted { attempts: failures });
                    }
                    failures
                }
            };

            self.set_phase(StreamPhase::Reconnecting);
            let delay = exponential_backoff(self.config.backoff_base(), failures, self.config.backoff_max());
            tracing::info!(source = %source_id, delay_ms = delay.as_millis() as u64, "Reconnecting");
            if !listener.sleep(delay).await {
                break Ok(());
            }
        };

        {
            let mut state = self.state.lock();
            state.phase = StreamPhase::Stopped;
            if let Err(e) = &result {
                state.fatal = Some(e.to_string());
            }
        }
        result
    }

    async fn read_until_lost(
        &self,
        transport: &mut dyn StreamTransport,
        listener: &mut ShutdownListener,
    ) -> ReadEnd {
        loop {
            let next = tokio::select! {
                _ = listener.wait() => return ReadEnd::Stopped,
                next = transport.next_message() => next,
            };

            match next {
                Some(Ok(text)) => self.handle_message(&text),
                Some(Err(e)) => return ReadEnd::Lost(e.to_string()),
                None => return ReadEnd::Lost("closed by peer".to_string()),
            }
        }
    }

    fn handle_message(&self, text: &str) {
        let envelope = match parse_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.state.lock().errors += 1;
                tracing::debug!(source = %self.config.source_id, error = %e, "Dropping undecodable message");
                return;
            }
        };

        {
            let mut state = self.state.lock();
            state.messages_received += 1;
            state.last_message_at = Some(envelope.received_at);
            state.latest.insert(envelope.topic.clone(), envelope.payload.clone());
        }
        metrics::STREAM_MESSAGES.inc();

        if let Some(callback) = &self.callback {
            run_isolated("stream_message", || callback(&envelope));
        }
    }

    fn on_connected(&self, reconnected: bool) {
        {
            let mut state = self.state.lock();
            state.phase = StreamPhase::Connected;
            state.reconnect_attempts = 0;
            state.connected_at = Some(Instant::now());
            if reconnected {
                state.reconnections += 1;
            }
        }
        if reconnected {
            metrics::STREAM_RECONNECTS.inc();
        }
        metrics::STREAM_CONNECTED.set(1);
        tracing::info!(source = %self.config.source_id, reconnected, "Stream connected");
    }

    fn set_phase(&self, phase: StreamPhase) {
        self.state.lock().phase = phase;
    }
}

/// `{base}/ws/{topic}@{stream}` for one topic, the combined endpoint for several.
pub fn stream_url(base_url: &str, topics: &[String], stream_type: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let streams: Vec<String> = topics
        .iter()
        .map(|t| format!("{}@{}", t.to_lowercase(), stream_type))
        .collect();

    match streams.as_slice() {
        [single] => format!("{}/ws/{}", base, single),
        _ => format!("{}/stream?streams={}", base, streams.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    enum Script {
        Fail,
        /// Deliver the messages, then either close or stay open.
        Serve(Vec<String>, bool),
    }

    struct MockConnector {
        scripts: Mutex<VecDeque<Script>>,
        connects: AtomicU32,
    }

    impl MockConnector {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(MockConnector {
                scripts: Mutex::new(scripts.into()),
                connects: AtomicU32::new(0),
            })
        }

        fn connects(&self) -> u32 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamConnector for MockConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn StreamTransport>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let script = self.scripts.lock().pop_front().unwrap_or(Script::Fail);
            match script {
                Script::Fail => Err(Error::ConnectionLost("refused".to_string())),
                Script::Serve(messages, close) => Ok(Box::new(MockTransport {
                    messages: messages.into(),
                    close,
                })),
            }
        }
    }

    struct MockTransport {
        messages: VecDeque<String>,
        close: bool,
    }

    #[async_trait]
    impl StreamTransport for MockTransport {
        async fn next_message(&mut self) -> Option<Result<String>> {
            match self.messages.pop_front() {
                Some(message) => Some(Ok(message)),
                None if self.close => None,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn ticker(symbol: &str, price: &str) -> String {
        format!(
            r#"{{"stream":"{}@ticker","data":{{"e":"24hrTicker","s":"{}","c":"{}"}}}}"#,
            symbol.to_lowercase(),
            symbol,
            price
        )
    }

    fn client(
        connector: Arc<MockConnector>,
        callback: Option<StreamCallback>,
    ) -> (StreamingClient, Arc<SourceHealthTracker>) {
        let health = Arc::new(SourceHealthTracker::default());
        let config = StreamConfig {
            topics: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            ..StreamConfig::default()
        };
        let client = StreamingClient::new(config, connector, health.clone(), callback).unwrap();
        (client, health)
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_stream_url() {
        let one = vec!["BTCUSDT".to_string()];
        let two = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        assert_eq!(
            stream_url("wss://stream.binance.com:9443/", &one, "ticker"),
            "wss://stream.binance.com:9443/ws/btcusdt@ticker"
        );
        assert_eq!(
            stream_url("wss://stream.binance.com:9443", &two, "trade"),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_bound() {
        let connector = MockConnector::new(Vec::new());
        let (client, health) = client(connector.clone(), None);

        client.start();
        let err = client.join().await.unwrap_err();

        assert!(matches!(err, Error::ReconnectExhausted { attempts: 10 }));
        assert_eq!(connector.connects(), 10);
        assert_eq!(client.phase(), StreamPhase::Stopped);
        assert_eq!(health.status("binance-ws").unwrap().total_attempts, 10);
        assert!(client.join().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_survives_stop() {
        let connector = MockConnector::new(Vec::new());
        let health = Arc::new(SourceHealthTracker::default());
        let config = StreamConfig {
            topics: vec!["BTCUSDT".to_string()],
            max_reconnect_attempts: 2,
            ..StreamConfig::default()
        };
        let client = StreamingClient::new(config, connector.clone(), health, None).unwrap();

        client.start();
        wait_until(|| client.phase() == StreamPhase::Stopped).await;
        client.stop().await;

        let stats = client.stats();
        assert!(!stats.connected);
        assert_eq!(stats.uptime_seconds, 0.0);
        assert!(stats.fatal_error.as_deref().is_some_and(|e| e.contains("after 2 failed")));
        assert!(matches!(client.join().await, Err(Error::ReconnectExhausted { attempts: 2 })));
        assert!(client.join().await.is_ok());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_previous_failure_for_join() {
        let connector = MockConnector::new(vec![Script::Fail, Script::Serve(Vec::new(), false)]);
        let health = Arc::new(SourceHealthTracker::default());
        let config = StreamConfig {
            topics: vec!["BTCUSDT".to_string()],
            max_reconnect_attempts: 1,
            ..StreamConfig::default()
        };
        let client = StreamingClient::new(config, connector, health, None).unwrap();

        client.start();
        wait_until(|| client.phase() == StreamPhase::Stopped).await;
        tokio::task::yield_now().await;
        client.start();
        wait_until(|| client.phase() == StreamPhase::Connected).await;

        assert!(client.stats().fatal_error.is_none());
        assert!(matches!(client.join().await, Err(Error::ReconnectExhausted { attempts: 1 })));
        assert!(client.is_running());
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_update_latest_and_skip_bad_json() {
        let connector = MockConnector::new(vec![Script::Serve(
            vec![
                ticker("BTCUSDT", "64000.5"),
                "{broken".to_string(),
                r#"{"e":"trade","s":"ETHUSDT","p":"3100"}"#.to_string(),
            ],
            false,
        )]);
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let callback: StreamCallback = Arc::new(move |_env: &StreamEnvelope| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let (client, _) = client(connector, Some(callback));

        client.start();
        wait_until(|| client.stats().messages_received == 2).await;

        let stats = client.stats();
        assert_eq!(stats.errors, 1);
        assert!(stats.connected);
        assert_eq!(client.latest_price("btcusdt"), Some(64000.5));
        assert_eq!(client.all_prices().len(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        client.stop().await;
        assert_eq!(client.phase(), StreamPhase::Stopped);
        // last known values survive stop
        assert_eq!(client.latest_price("ETHUSDT"), Some(3100.0));
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_panic_is_contained() {
        let connector = MockConnector::new(vec![Script::Serve(
            vec![ticker("BTCUSDT", "1.0"), ticker("BTCUSDT", "2.0")],
            false,
        )]);
        let callback: StreamCallback = Arc::new(|_env: &StreamEnvelope| -> anyhow::Result<()> {
            panic!("consumer bug")
        });
        let (client, _) = client(connector, Some(callback));

        client.start();
        wait_until(|| client.stats().messages_received == 2).await;
        assert_eq!(client.latest_price("BTCUSDT"), Some(2.0));
        assert!(client.is_running());
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_loss_and_resets_counter() {
        let connector = MockConnector::new(vec![
            Script::Serve(vec![ticker("BTCUSDT", "1.0")], true),
            Script::Fail,
            Script::Serve(vec![ticker("BTCUSDT", "3.0")], false),
        ]);
        let (client, health) = client(connector.clone(), None);
        let reconnects_before = metrics::STREAM_RECONNECTS.get();
        let started = Instant::now();

        client.start();
        wait_until(|| client.latest_price("BTCUSDT") == Some(3.0)).await;

        let stats = client.stats();
        assert_eq!(connector.connects(), 3);
        assert_eq!(stats.reconnections, 1);
        assert!(metrics::STREAM_RECONNECTS.get() >= reconnects_before + 1);
        // 1s after the loss plus 2s after the refused attempt
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(stats.uptime_seconds < 1.0);
        assert_eq!(stats.reconnect_attempts, 0);
        assert_eq!(health.status("binance-ws").unwrap().successful_attempts, 2);
        client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let connector = MockConnector::new(vec![Script::Serve(Vec::new(), false)]);
        let (client, _) = client(connector.clone(), None);

        client.start();
        client.start();
        wait_until(|| client.phase() == StreamPhase::Connected).await;
        assert_eq!(connector.connects(), 1);
        client.stop().await;
        assert!(!client.is_running());
    }

    #[test]
    fn test_multiple_topics_need_multiplexing() {
        let connector = MockConnector::new(Vec::new());
        let health = Arc::new(SourceHealthTracker::default());
        let config = StreamConfig {
            topics: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            multiplex: false,
            ..StreamConfig::default()
        };

        assert!(StreamingClient::new(config.clone(), connector.clone(), health.clone(), None).is_err());
        let clients = StreamingClient::per_topic(config, connector, health, None).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[1].url(), "wss://stream.binance.com:9443/ws/ethusdt@ticker");
    }
}
