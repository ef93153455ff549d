//! Subscription manager.
//!
//! Maps widget id to its live feed. Callbacks are never invoked while the
//! subscription map is locked, and feeds are stopped outside the lock.

use crate::feed::{Feed, FetchWorker, UpdateSink};
use crate::source::FeedSource;
use finboard_core::{FeedConfig, FeedError, FeedMode, FeedUpdate};
use finboard_stream::{EventHandler, StreamClient, StreamConfig, StreamEvent};
use finboard_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives every update of one widget.
pub type UpdateCallback = Arc<dyn Fn(FeedUpdate) + Send + Sync>;

/// Subscription layer configuration (`[realtime]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Delay before re-subscribing a stream whose client gave up.
    #[serde(default = "default_stream_retry_delay_ms")]
    pub stream_retry_delay_ms: u64,
    /// Poll interval used when a widget specifies none.
    #[serde(default = "default_update_interval_secs")]
    pub default_update_interval_secs: u64,
}

fn default_stream_retry_delay_ms() -> u64 {
    3000
}

fn default_update_interval_secs() -> u64 {
    30
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            stream_retry_delay_ms: default_stream_retry_delay_ms(),
            default_update_interval_secs: default_update_interval_secs(),
        }
    }
}

impl RealtimeConfig {
    pub fn stream_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stream_retry_delay_ms)
    }
}

struct Subscription {
    config: FeedConfig,
    on_update: UpdateCallback,
    sink: UpdateSink,
    feed: Feed,
    /// Distinguishes this subscription from later ones for the same id.
    generation: u64,
}

impl Subscription {
    fn stop(self) {
        self.sink.close();
        self.feed.stop();
    }
}

struct Inner {
    source: Arc<dyn FeedSource>,
    config: RealtimeConfig,
    /// Template for stream clients; the URL is set per feed.
    stream: StreamConfig,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    next_generation: AtomicU64,
}

/// Owns one feed per widget id.
///
/// Must be used from within a tokio runtime. Clones share state.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

impl SubscriptionManager {
    pub fn new(source: Arc<dyn FeedSource>, config: RealtimeConfig, stream: StreamConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                stream,
                subscriptions: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start the feed for `config.widget_id`, replacing any existing one.
    pub fn subscribe(&self, config: FeedConfig, on_update: UpdateCallback) {
        self.inner.subscribe(config, on_update);
    }

    /// Stop a feed. Unknown ids are ignored.
    pub fn unsubscribe(&self, widget_id: &str) {
        let removed = self.inner.subscriptions.lock().remove(widget_id);
        if let Some(subscription) = removed {
            subscription.stop();
            info!(widget_id, "Unsubscribed");
        }
        self.inner.record_active();
    }

    /// Run one out-of-band fetch for `widget_id`.
    ///
    /// Callers wanting fresh data clear the URL's cache first. Returns false
    /// for unknown ids and for stream feeds without an HTTP URL.
    pub fn manual_refresh(&self, widget_id: &str) -> bool {
        let subscriptions = self.inner.subscriptions.lock();
        match subscriptions.get(widget_id) {
            Some(subscription) => subscription.feed.refresh(),
            None => {
                debug!(widget_id, "Refresh for unknown widget");
                false
            }
        }
    }

    /// Stop every feed.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<Subscription> = {
            let mut subscriptions = self.inner.subscriptions.lock();
            subscriptions.drain().map(|(_, s)| s).collect()
        };
        let count = drained.len();
        for subscription in drained {
            subscription.stop();
        }
        self.inner.record_active();
        info!(count, "Unsubscribed all feeds");
    }

    pub fn is_subscribed(&self, widget_id: &str) -> bool {
        self.inner.subscriptions.lock().contains_key(widget_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    pub fn subscribed_ids(&self) -> Vec<String> {
        self.inner.subscriptions.lock().keys().cloned().collect()
    }

    /// Feed config of an active subscription.
    pub fn config_of(&self, widget_id: &str) -> Option<FeedConfig> {
        self.inner
            .subscriptions
            .lock()
            .get(widget_id)
            .map(|s| s.config.clone())
    }
}

impl Inner {
    fn subscribe(self: &Arc<Self>, mut config: FeedConfig, on_update: UpdateCallback) {
        if config.update_interval_secs == 0 {
            config.update_interval_secs = self.config.default_update_interval_secs;
        }

        let widget_id = config.widget_id.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let sink = UpdateSink::new(&widget_id, on_update.clone());

        let (feed, client) = match config.mode() {
            FeedMode::Poll { url, interval } => {
                info!(%widget_id, url, interval_secs = interval.as_secs(), "Subscribing poll feed");
                let worker =
                    FetchWorker::spawn(self.source.clone(), url.to_string(), Some(interval), sink.clone());
                (Feed::Poll { worker }, None)
            }
            FeedMode::Stream { ws_url } => {
                info!(%widget_id, ws_url, "Subscribing stream feed");
                let client = StreamClient::new(
                    StreamConfig {
                        url: ws_url.to_string(),
                        ..self.stream.clone()
                    },
                    self.stream_handler(&widget_id, generation, sink.clone()),
                );
                let refresh = (!config.api_url.is_empty()).then(|| {
                    FetchWorker::spawn(self.source.clone(), config.api_url.clone(), None, sink.clone())
                });
                let feed = Feed::Stream {
                    client: client.clone(),
                    refresh,
                    retry: None,
                };
                (feed, Some(client))
            }
        };

        let replaced = self.subscriptions.lock().insert(
            widget_id.clone(),
            Subscription {
                config,
                on_update,
                sink,
                feed,
                generation,
            },
        );
        if let Some(old) = replaced {
            debug!(%widget_id, "Replacing existing feed");
            old.stop();
        }

        // Connect only once registered so a fast give-up finds the entry
        if let Some(client) = client {
            client.connect();
        }
        self.record_active();
    }

    fn stream_handler(
        self: &Arc<Self>,
        widget_id: &str,
        generation: u64,
        sink: UpdateSink,
    ) -> EventHandler {
        let inner = Arc::downgrade(self);
        let widget_id = widget_id.to_string();
        let open = AtomicBool::new(false);

        Arc::new(move |event| match event {
            StreamEvent::Opened => {
                if !open.swap(true, Ordering::SeqCst) {
                    Metrics::stream_opened();
                }
            }
            StreamEvent::Message(payload) => sink.deliver(FeedUpdate::data(payload.into_value())),
            StreamEvent::Error(detail) => {
                debug!(%widget_id, %detail, "Stream error");
                sink.deliver(FeedUpdate::error(FeedError::WebSocket.to_string()));
            }
            StreamEvent::Closed { reconnecting } => {
                if open.swap(false, Ordering::SeqCst) {
                    Metrics::stream_closed();
                }
                if reconnecting {
                    Metrics::stream_reconnect("client");
                } else {
                    schedule_stream_retry(&inner, &widget_id, generation);
                }
            }
        })
    }

    /// Re-subscribe a stream feed whose client gave up, if it is still the
    /// current subscription for its id.
    fn restart_stream(self: &Arc<Self>, widget_id: &str, generation: u64) {
        let current = {
            let mut subscriptions = self.subscriptions.lock();
            match subscriptions.get_mut(widget_id) {
                Some(s) if s.generation == generation => {
                    // Detach this task's own handle so replacement does not abort it
                    if let Feed::Stream { retry, .. } = &mut s.feed {
                        retry.take();
                    }
                    Some((s.config.clone(), s.on_update.clone()))
                }
                _ => None,
            }
        };

        if let Some((config, on_update)) = current {
            info!(widget_id, "Re-subscribing stream feed");
            Metrics::stream_reconnect("resubscribe");
            self.subscribe(config, on_update);
        }
    }

    fn record_active(&self) {
        Metrics::set_active_subscriptions(self.subscriptions.lock().len());
    }
}

fn schedule_stream_retry(inner: &Weak<Inner>, widget_id: &str, generation: u64) {
    let Some(strong) = inner.upgrade() else {
        return;
    };
    let delay = strong.config.stream_retry_delay();
    warn!(
        widget_id,
        delay_ms = delay.as_millis() as u64,
        "Stream gave up, scheduling re-subscribe"
    );

    let weak = inner.clone();
    let id = widget_id.to_string();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = weak.upgrade() {
            inner.restart_stream(&id, generation);
        }
    });

    let mut subscriptions = strong.subscriptions.lock();
    match subscriptions.get_mut(widget_id) {
        Some(Subscription {
            feed: Feed::Stream { retry, .. },
            generation: current,
            ..
        }) if *current == generation => {
            if let Some(previous) = retry.replace(handle) {
                previous.abort();
            }
        }
        _ => handle.abort(),
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, subscription) in self.subscriptions.get_mut().drain() {
            subscription.stop();
        }
    }
}
