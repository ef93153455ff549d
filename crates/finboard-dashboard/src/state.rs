//! Dashboard state management.
//!
//! `DashboardState` owns the ordered widget list and each widget's latest
//! feed state. Every structural mutation is persisted and mirrored into the
//! subscription manager; feed updates are applied last-write-wins.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use finboard_core::{
    AdaptedResponse, FeedResult, FeedUpdate, NewWidget, WidgetPatch, WidgetRecord,
};
use finboard_http::ApiClient;
use finboard_persistence::WidgetStore;
use finboard_realtime::{SubscriptionManager, UpdateCallback};

use crate::broadcast::Broadcaster;
use crate::error::{DashboardError, DashboardResult};
use crate::types::{DashboardMessage, DashboardSnapshot, WidgetView};

/// A widget and its latest feed state.
#[derive(Debug, Clone)]
struct WidgetEntry {
    record: WidgetRecord,
    data: Option<Value>,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl WidgetEntry {
    fn new(record: WidgetRecord) -> Self {
        Self {
            record,
            data: None,
            error: None,
            last_updated: None,
        }
    }

    fn view(&self) -> WidgetView {
        WidgetView::new(
            self.record.clone(),
            self.data.clone(),
            self.error.clone(),
            self.last_updated,
        )
    }
}

struct Inner {
    widgets: RwLock<Vec<WidgetEntry>>,
    store: WidgetStore,
    manager: SubscriptionManager,
    api: ApiClient,
    broadcaster: Broadcaster,
}

/// Shared dashboard state. Clones share the same widgets.
#[derive(Clone)]
pub struct DashboardState {
    inner: Arc<Inner>,
}

impl DashboardState {
    /// Create the state, loading persisted widgets. Feeds are not started
    /// until [`DashboardState::subscribe_all`].
    pub fn new(store: WidgetStore, manager: SubscriptionManager, api: ApiClient) -> Self {
        let widgets = store.load().into_iter().map(WidgetEntry::new).collect();
        Self {
            inner: Arc::new(Inner {
                widgets: RwLock::new(widgets),
                store,
                manager,
                api,
                broadcaster: Broadcaster::new(),
            }),
        }
    }

    /// Start a feed for every widget.
    pub fn subscribe_all(&self) {
        let records: Vec<WidgetRecord> = self
            .inner
            .widgets
            .read()
            .iter()
            .map(|e| e.record.clone())
            .collect();

        info!(count = records.len(), "Starting widget feeds");
        for record in &records {
            self.subscribe(record);
        }
    }

    /// Add a widget, persist it and start its feed.
    pub fn add_widget(&self, new: NewWidget) -> DashboardResult<WidgetRecord> {
        validate(&new)?;

        let record = WidgetRecord::from_new(new);
        self.inner
            .widgets
            .write()
            .push(WidgetEntry::new(record.clone()));

        info!(widget_id = %record.id, title = %record.title, "Widget added");
        self.persist();
        self.subscribe(&record);
        self.publish_snapshot();
        Ok(record)
    }

    /// Remove a widget and stop its feed. Returns false for unknown ids.
    pub fn remove_widget(&self, widget_id: &str) -> bool {
        let removed = {
            let mut widgets = self.inner.widgets.write();
            let before = widgets.len();
            widgets.retain(|e| e.record.id != widget_id);
            widgets.len() != before
        };
        if !removed {
            return false;
        }

        self.inner.manager.unsubscribe(widget_id);
        info!(widget_id, "Widget removed");
        self.persist();
        self.inner.broadcaster.publish(&DashboardMessage::Removed {
            timestamp_ms: Utc::now().timestamp_millis(),
            widget_id: widget_id.to_string(),
        });
        true
    }

    /// Patch a widget. The feed is restarted when its source changed.
    pub fn update_widget(
        &self,
        widget_id: &str,
        patch: WidgetPatch,
    ) -> DashboardResult<WidgetRecord> {
        let (record, feed_changed) = {
            let mut widgets = self.inner.widgets.write();
            let entry = widgets
                .iter_mut()
                .find(|e| e.record.id == widget_id)
                .ok_or_else(|| DashboardError::WidgetNotFound(widget_id.to_string()))?;
            let feed_changed = patch.apply(&mut entry.record);
            (entry.record.clone(), feed_changed)
        };

        if feed_changed {
            debug!(widget_id, "Feed source changed, re-subscribing");
            self.inner.manager.unsubscribe(widget_id);
            self.subscribe(&record);
        }
        self.persist();
        self.publish_snapshot();
        Ok(record)
    }

    /// Move the widget at `from` to position `to`.
    pub fn reorder(&self, from: usize, to: usize) -> DashboardResult<()> {
        {
            let mut widgets = self.inner.widgets.write();
            let len = widgets.len();
            for index in [from, to] {
                if index >= len {
                    return Err(DashboardError::InvalidIndex { index, len });
                }
            }
            let entry = widgets.remove(from);
            widgets.insert(to, entry);
        }

        self.persist();
        self.publish_snapshot();
        Ok(())
    }

    /// Record a feed update for a widget. Updates for removed widgets are
    /// dropped.
    pub fn apply_update(&self, widget_id: &str, update: FeedUpdate) {
        let view = {
            let mut widgets = self.inner.widgets.write();
            let Some(entry) = widgets.iter_mut().find(|e| e.record.id == widget_id) else {
                debug!(widget_id, "Update for unknown widget dropped");
                return;
            };
            entry.data = update.data;
            entry.error = update.error;
            entry.last_updated = Some(update.received_at);
            entry.view()
        };

        self.inner.broadcaster.publish(&DashboardMessage::Update {
            timestamp_ms: Utc::now().timestamp_millis(),
            widget: Box::new(view),
        });
    }

    /// Clear the widget's cached payload and fetch it again.
    pub fn refresh_widget(&self, widget_id: &str) -> DashboardResult<()> {
        let api_url = self
            .record(widget_id)
            .map(|r| r.api_url)
            .ok_or_else(|| DashboardError::WidgetNotFound(widget_id.to_string()))?;

        self.inner.api.clear_cache_for_url(&api_url);
        if !self.inner.manager.manual_refresh(widget_id) {
            warn!(widget_id, "Widget feed cannot be refreshed");
        }
        Ok(())
    }

    /// Fetch a URL uncached to validate it before it is saved.
    pub async fn test_connection(&self, url: &str) -> FeedResult<AdaptedResponse> {
        self.inner.api.test_connection(url).await
    }

    /// Remove every widget.
    pub fn reset(&self) {
        self.inner.manager.unsubscribe_all();
        self.inner.widgets.write().clear();
        info!("Dashboard reset");
        self.persist();
        self.publish_snapshot();
    }

    /// Stop every feed, keeping the widget list.
    pub fn shutdown(&self) {
        self.inner.manager.unsubscribe_all();
    }

    pub fn record(&self, widget_id: &str) -> Option<WidgetRecord> {
        self.inner
            .widgets
            .read()
            .iter()
            .find(|e| e.record.id == widget_id)
            .map(|e| e.record.clone())
    }

    pub fn widget_view(&self, widget_id: &str) -> Option<WidgetView> {
        self.inner
            .widgets
            .read()
            .iter()
            .find(|e| e.record.id == widget_id)
            .map(WidgetEntry::view)
    }

    pub fn widget_count(&self) -> usize {
        self.inner.widgets.read().len()
    }

    pub fn collect_snapshot(&self) -> DashboardSnapshot {
        let widgets = self
            .inner
            .widgets
            .read()
            .iter()
            .map(WidgetEntry::view)
            .collect();

        DashboardSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            widgets,
            active_subscriptions: self.inner.manager.active_count(),
        }
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.inner.broadcaster.subscribe()
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.inner.manager
    }

    fn subscribe(&self, record: &WidgetRecord) {
        self.inner
            .manager
            .subscribe(record.feed_config(), self.update_callback(&record.id));
    }

    fn update_callback(&self, widget_id: &str) -> UpdateCallback {
        // Weak: the manager inside `inner` owns this callback
        let state: Weak<Inner> = Arc::downgrade(&self.inner);
        let widget_id = widget_id.to_string();
        Arc::new(move |update| {
            if let Some(inner) = state.upgrade() {
                DashboardState { inner }.apply_update(&widget_id, update);
            }
        })
    }

    fn persist(&self) {
        let records: Vec<WidgetRecord> = self
            .inner
            .widgets
            .read()
            .iter()
            .map(|e| e.record.clone())
            .collect();

        if let Err(e) = self.inner.store.save(&records) {
            warn!(error = %e, path = %self.inner.store.path().display(), "Failed to persist widgets");
        }
    }

    fn publish_snapshot(&self) {
        self.inner
            .broadcaster
            .publish(&DashboardMessage::Snapshot(self.collect_snapshot()));
    }
}

fn validate(new: &NewWidget) -> DashboardResult<()> {
    if new.title.trim().is_empty() {
        return Err(DashboardError::InvalidWidget("title is required".to_string()));
    }
    let has_stream = new.use_websocket && new.ws_url.as_deref().is_some_and(|u| !u.is_empty());
    if new.api_url.trim().is_empty() && !has_stream {
        return Err(DashboardError::InvalidWidget(
            "an API URL or a WebSocket URL is required".to_string(),
        ));
    }
    Ok(())
}
