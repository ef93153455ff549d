//! Live feed handles.

use crate::manager::UpdateCallback;
use crate::source::FeedSource;
use finboard_core::FeedUpdate;
use finboard_stream::StreamClient;
use finboard_telemetry::Metrics;
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Delivers updates for one subscription until closed.
#[derive(Clone)]
pub(crate) struct UpdateSink {
    widget_id: Arc<str>,
    callback: UpdateCallback,
    live: Arc<AtomicBool>,
}

impl UpdateSink {
    pub(crate) fn new(widget_id: &str, callback: UpdateCallback) -> Self {
        Self {
            widget_id: Arc::from(widget_id),
            callback,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn deliver(&self, update: FeedUpdate) {
        if !self.live.load(Ordering::SeqCst) {
            trace!(widget_id = %self.widget_id, "Dropping update for closed feed");
            return;
        }
        Metrics::widget_update(update.is_error());
        (self.callback)(update);
    }

    pub(crate) fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Task running fetches for one feed.
///
/// Owns every in-flight fetch, so stopping the worker cancels them too.
pub(crate) struct FetchWorker {
    handle: JoinHandle<()>,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl FetchWorker {
    /// Spawn a worker for `url`. With an interval it fetches on every tick,
    /// the first one immediately; without one it only serves refreshes.
    pub(crate) fn spawn(
        source: Arc<dyn FeedSource>,
        url: String,
        interval: Option<Duration>,
        sink: UpdateSink,
    ) -> Self {
        let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut ticker = interval.map(|period| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            });
            // Fetches may overlap when one outlives the interval
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    () = next_tick(&mut ticker) => {
                        in_flight.spawn(fetch_once(source.clone(), url.clone(), sink.clone()));
                    }
                    request = refresh_rx.recv() => match request {
                        Some(()) => {
                            debug!(%url, "Manual refresh");
                            in_flight.spawn(fetch_once(source.clone(), url.clone(), sink.clone()));
                        }
                        None => break,
                    },
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
        });

        Self { handle, refresh_tx }
    }

    /// Queue one out-of-band fetch.
    pub(crate) fn refresh(&self) {
        let _ = self.refresh_tx.send(());
    }

    /// Stop the timer and abort in-flight fetches.
    pub(crate) fn stop(self) {
        self.handle.abort();
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn fetch_once(source: Arc<dyn FeedSource>, url: String, sink: UpdateSink) {
    let result = source.fetch(&url).await;
    sink.deliver(FeedUpdate::from(result));
}

/// One widget's live feed.
pub(crate) enum Feed {
    Poll {
        worker: FetchWorker,
    },
    Stream {
        client: Arc<StreamClient>,
        /// Serves manual refresh against the HTTP URL, if one is set.
        refresh: Option<FetchWorker>,
        /// Pending re-subscribe after the client gave up.
        retry: Option<JoinHandle<()>>,
    },
}

impl Feed {
    /// Request an out-of-band fetch. False when the feed cannot fetch.
    pub(crate) fn refresh(&self) -> bool {
        match self {
            Self::Poll { worker } => {
                worker.refresh();
                true
            }
            Self::Stream { refresh, .. } => match refresh {
                Some(worker) => {
                    worker.refresh();
                    true
                }
                None => false,
            },
        }
    }

    pub(crate) fn stop(self) {
        match self {
            Self::Poll { worker } => worker.stop(),
            Self::Stream {
                client,
                refresh,
                retry,
            } => {
                if client.is_connected() {
                    Metrics::stream_closed();
                }
                client.disconnect();
                if let Some(worker) = refresh {
                    worker.stop();
                }
                if let Some(retry) = retry {
                    retry.abort();
                }
            }
        }
    }
}
