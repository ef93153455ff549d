//! Widget records and feed configuration.
//!
//! A `WidgetRecord` is what gets persisted; a `FeedConfig` is the subset the
//! subscription layer needs to keep the widget's data live.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Poll interval used when a widget does not specify one.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
/// Lower bound for poll intervals.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 1;

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

/// How a widget renders its selected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Card,
    Table,
    Chart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Candle,
}

/// Widget definition as entered by the user, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWidget {
    pub title: String,
    pub api_url: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(rename = "type", default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub selected_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    #[serde(rename = "useWebSocket", default)]
    pub use_websocket: bool,
}

/// Persisted widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    pub id: String,
    pub title: String,
    pub api_url: String,
    /// Poll interval in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(rename = "type", default)]
    pub display_mode: DisplayMode,
    /// Field paths chosen in the field picker.
    #[serde(default)]
    pub selected_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    #[serde(rename = "useWebSocket", default)]
    pub use_websocket: bool,
}

impl WidgetRecord {
    /// Assign a fresh id to a user-entered widget.
    pub fn from_new(new: NewWidget) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            api_url: new.api_url,
            refresh_interval: new.refresh_interval,
            display_mode: new.display_mode,
            selected_fields: new.selected_fields,
            chart_type: new.chart_type,
            ws_url: new.ws_url,
            use_websocket: new.use_websocket,
        }
    }

    /// Feed settings for the subscription layer.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            widget_id: self.id.clone(),
            api_url: self.api_url.clone(),
            ws_url: self.ws_url.clone(),
            use_websocket: self.use_websocket,
            update_interval_secs: self.refresh_interval,
        }
    }
}

/// Partial update for an existing widget. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPatch {
    pub title: Option<String>,
    pub api_url: Option<String>,
    pub refresh_interval: Option<u64>,
    #[serde(rename = "type")]
    pub display_mode: Option<DisplayMode>,
    pub selected_fields: Option<Vec<String>>,
    pub chart_type: Option<ChartType>,
    pub ws_url: Option<String>,
    #[serde(rename = "useWebSocket")]
    pub use_websocket: Option<bool>,
}

impl WidgetPatch {
    /// Apply the patch. Returns `true` when the widget's feed must be restarted.
    pub fn apply(self, record: &mut WidgetRecord) -> bool {
        let before = record.feed_config();

        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(api_url) = self.api_url {
            record.api_url = api_url;
        }
        if let Some(interval) = self.refresh_interval {
            record.refresh_interval = interval;
        }
        if let Some(mode) = self.display_mode {
            record.display_mode = mode;
        }
        if let Some(fields) = self.selected_fields {
            record.selected_fields = fields;
        }
        if let Some(chart_type) = self.chart_type {
            record.chart_type = Some(chart_type);
        }
        if let Some(ws_url) = self.ws_url {
            record.ws_url = Some(ws_url);
        }
        if let Some(use_websocket) = self.use_websocket {
            record.use_websocket = use_websocket;
        }

        before != record.feed_config()
    }
}

/// Everything the subscription layer needs to run one widget's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub widget_id: String,
    /// HTTP endpoint, also used for manual refresh in stream mode.
    pub api_url: String,
    pub ws_url: Option<String>,
    pub use_websocket: bool,
    pub update_interval_secs: u64,
}

/// Resolved feed kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode<'a> {
    Poll { url: &'a str, interval: Duration },
    Stream { ws_url: &'a str },
}

impl FeedConfig {
    /// Poll `api_url` every `interval_secs`.
    pub fn poll(
        widget_id: impl Into<String>,
        api_url: impl Into<String>,
        interval_secs: u64,
    ) -> Self {
        Self {
            widget_id: widget_id.into(),
            api_url: api_url.into(),
            ws_url: None,
            use_websocket: false,
            update_interval_secs: interval_secs,
        }
    }

    /// Stream from `ws_url`, keeping `api_url` for manual refresh.
    pub fn stream(
        widget_id: impl Into<String>,
        api_url: impl Into<String>,
        ws_url: impl Into<String>,
    ) -> Self {
        Self {
            widget_id: widget_id.into(),
            api_url: api_url.into(),
            ws_url: Some(ws_url.into()),
            use_websocket: true,
            update_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }

    /// Stream mode requires both the flag and a non-empty socket URL.
    pub fn mode(&self) -> FeedMode<'_> {
        match self.ws_url.as_deref() {
            Some(ws_url) if self.use_websocket && !ws_url.is_empty() => FeedMode::Stream { ws_url },
            _ => FeedMode::Poll {
                url: &self.api_url,
                interval: self.update_interval(),
            },
        }
    }

    /// Poll interval, clamped to at least one second.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }
}
