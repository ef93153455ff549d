//! Reconnecting stream connection.
//!
//! Handles connection lifecycle and automatic reconnection at a fixed
//! interval. The reconnect budget is consecutive: a successful open resets
//! the attempt counter.

use crate::error::StreamResult;
use crate::event::{EventHandler, StreamEvent, StreamPayload};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL.
    pub url: String,
    /// Delay before each reconnect attempt.
    pub reconnect_interval_ms: u64,
    /// Consecutive failed connections tolerated before giving up.
    pub max_reconnect_attempts: u32,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_interval_ms: 3000,
            max_reconnect_attempts: 5,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Open,
    /// Closed, waiting out the reconnect interval.
    Reconnecting,
    /// Terminal: manual disconnect or reconnect budget exhausted.
    Closed,
}

/// WebSocket client with bounded auto-reconnect.
///
/// The client owns its socket exclusively. Events are delivered to the
/// handler from the client's background task; after [`StreamClient::disconnect`]
/// no further events are delivered.
pub struct StreamClient {
    config: StreamConfig,
    state: RwLock<StreamState>,
    reconnect_attempts: AtomicU32,
    manual_close: AtomicBool,
    handler: EventHandler,
    /// Outbound text frames, drained by the message loop.
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: TokioMutex<mpsc::UnboundedReceiver<String>>,
    /// Cancels the message loop and any pending reconnect delay.
    shutdown_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// Create a client. Nothing happens until [`StreamClient::connect`].
    pub fn new(config: StreamConfig, handler: EventHandler) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            config,
            state: RwLock::new(StreamState::Idle),
            reconnect_attempts: AtomicU32::new(0),
            manual_close: AtomicBool::new(false),
            handler,
            outbound_tx,
            outbound_rx: TokioMutex::new(outbound_rx),
            shutdown_token: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Start the connection task.
    ///
    /// Idempotent while the task is alive. A client that was manually
    /// disconnected never connects again.
    pub fn connect(self: &Arc<Self>) {
        if self.is_manual_close() {
            warn!(url = %self.config.url, "Stream client was disconnected, ignoring connect");
            return;
        }

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!(url = %self.config.url, "Stream already running");
            return;
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let client = Arc::clone(self);
        *task = Some(tokio::spawn(async move { client.run().await }));
    }

    /// Queue a payload. Strings are sent verbatim, other values serialized.
    ///
    /// Dropped with a warning when the socket is not open.
    pub fn send(&self, payload: &Value) {
        let text = match payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.send_text(text);
    }

    /// Queue a raw text frame. Dropped with a warning when not open.
    pub fn send_text(&self, text: impl Into<String>) {
        if !self.is_connected() {
            warn!(url = %self.config.url, "Stream is not connected, dropping outbound message");
            return;
        }

        if self.outbound_tx.send(text.into()).is_err() {
            warn!(url = %self.config.url, "Outbound queue closed");
        }
    }

    /// Close for good.
    ///
    /// The manual-close flag is set before the socket is closed so a close
    /// observed concurrently never schedules a reconnect.
    pub fn disconnect(&self) {
        self.manual_close.store(true, Ordering::SeqCst);
        self.shutdown_token.cancel();
        *self.state.write() = StreamState::Closed;
        info!(url = %self.config.url, "Stream disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.state() == StreamState::Open
    }

    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    pub fn is_manual_close(&self) -> bool {
        self.manual_close.load(Ordering::SeqCst)
    }

    /// Reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connection loop: connect, pump messages, reconnect until the budget
    /// is spent or the client is disconnected.
    async fn run(&self) {
        loop {
            if self.is_manual_close() {
                return;
            }

            self.set_state(StreamState::Connecting);
            let result = self.try_connect().await;

            if self.is_manual_close() {
                info!(url = %self.config.url, "Manual close, not reconnecting");
                return;
            }

            match result {
                Ok(()) => info!(url = %self.config.url, "Stream connection closed"),
                Err(e) => {
                    error!(url = %self.config.url, error = %e, "Stream connection error");
                    self.emit(StreamEvent::Error(e.to_string()));
                }
            }

            let attempts = self.reconnect_attempts.load(Ordering::SeqCst);
            let reconnecting = attempts < self.config.max_reconnect_attempts;

            if !reconnecting {
                self.set_state(StreamState::Closed);
                self.emit(StreamEvent::Closed {
                    reconnecting: false,
                });
                error!(
                    url = %self.config.url,
                    attempts,
                    "Max reconnection attempts reached"
                );
                return;
            }

            self.set_state(StreamState::Reconnecting);
            self.emit(StreamEvent::Closed { reconnecting: true });

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = Duration::from_millis(self.config.reconnect_interval_ms);
            warn!(
                url = %self.config.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            // Cancellation-aware sleep
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!(url = %self.config.url, "Disconnected during backoff");
                    return;
                }
            }
        }
    }

    async fn try_connect(&self) -> StreamResult<()> {
        info!(url = %self.config.url, "Connecting to stream");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = connect => result?,
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(StreamState::Open);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        info!(url = %self.config.url, "Stream connected");
        self.emit(StreamEvent::Opened);

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send Close frame");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.emit(StreamEvent::Message(StreamPayload::parse(text)));
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            self.emit(StreamEvent::Message(StreamPayload::from_binary(bytes)));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(url = %self.config.url, code, %reason, "Stream closed by server");
                            return Ok(());
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            warn!(url = %self.config.url, "Stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text)).await?;
                    }
                }
            }
        }
    }

    fn set_state(&self, state: StreamState) {
        // Checked under the lock: disconnect() sets the flag before taking it,
        // so once disconnected the state stays Closed
        let mut current = self.state.write();
        if self.is_manual_close() && state != StreamState::Closed {
            return;
        }
        *current = state;
    }

    fn emit(&self, event: StreamEvent) {
        if self.is_manual_close() {
            return;
        }
        (self.handler)(event);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    type Recorded = Arc<Mutex<Vec<StreamEvent>>>;

    fn recording_handler() -> (EventHandler, Recorded) {
        let events: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: EventHandler = Arc::new(move |event| sink.lock().push(event));
        (handler, events)
    }

    /// URL of a port nothing listens on.
    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}")
    }

    /// Accept WebSocket handshakes forever, holding each socket open.
    async fn accepting_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    fn closed_events(events: &Recorded) -> Vec<bool> {
        events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Closed { reconnecting } => Some(*reconnecting),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.reconnect_interval_ms, 3000);
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_send_when_not_connected_is_noop() {
        let (handler, events) = recording_handler();
        let client = StreamClient::new(StreamConfig::new("ws://127.0.0.1:1"), handler);

        client.send(&serde_json::json!({"op": "subscribe"}));
        client.send_text("ping");

        assert_eq!(client.state(), StreamState::Idle);
        assert!(!client.is_connected());
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_suppresses_connect() {
        let (handler, events) = recording_handler();
        let client = StreamClient::new(StreamConfig::new(refused_url().await), handler);

        client.disconnect();
        client.connect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.state(), StreamState::Closed);
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (handler, events) = recording_handler();
        let config = StreamConfig {
            url: refused_url().await,
            reconnect_interval_ms: 10,
            max_reconnect_attempts: 2,
        };
        let client = StreamClient::new(config, handler);
        client.connect();

        let gave_up = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if closed_events(&events).last() == Some(&false) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(gave_up.is_ok(), "client should give up");

        // Nothing more is scheduled
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(closed_events(&events), vec![true, true, false]);
        assert_eq!(client.state(), StreamState::Closed);
        assert_eq!(client.reconnect_attempts(), 2);

        let errors = events
            .lock()
            .iter()
            .filter(|e| matches!(e, StreamEvent::Error(_)))
            .count();
        assert_eq!(errors, 3);
    }

    #[tokio::test]
    async fn test_disconnect_during_backoff_stops_reconnecting() {
        let (handler, events) = recording_handler();
        let config = StreamConfig {
            url: refused_url().await,
            reconnect_interval_ms: 200,
            max_reconnect_attempts: 5,
        };
        let client = StreamClient::new(config, handler);
        client.connect();

        // Wait for the first failure, then disconnect inside the backoff window
        tokio::time::timeout(Duration::from_secs(5), async {
            while closed_events(&events).is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        client.disconnect();

        let seen = events.lock().len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(events.lock().len(), seen);
        assert_eq!(client.state(), StreamState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_racing_open_leaves_client_closed() {
        let url = accepting_url().await;

        for i in 0..20u64 {
            let (handler, _events) = recording_handler();
            let client = StreamClient::new(StreamConfig::new(url.clone()), handler);
            client.connect();

            // Land the disconnect at varying points around the handshake
            tokio::time::sleep(Duration::from_micros(i * 250)).await;
            client.disconnect();

            let task = client.task.lock().take();
            if let Some(task) = task {
                tokio::time::timeout(Duration::from_secs(5), task)
                    .await
                    .unwrap()
                    .unwrap();
            }

            assert_eq!(client.state(), StreamState::Closed, "iteration {i}");
            assert!(!client.is_connected());
        }
    }
}
