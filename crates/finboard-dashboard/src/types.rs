//! Dashboard API types.
//!
//! These types are used for JSON serialization in REST and WebSocket APIs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use finboard_core::format::format_value;
use finboard_core::{extract_field_values, JsonField, WidgetRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full dashboard state (sent on connect and via REST).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Timestamp when snapshot was taken (Unix milliseconds).
    pub timestamp_ms: i64,
    /// Widgets in display order.
    pub widgets: Vec<WidgetView>,
    pub active_subscriptions: usize,
}

/// A widget together with its latest feed state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    #[serde(flatten)]
    pub widget: WidgetRecord,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Selected field path → raw value. Empty until data arrives.
    pub values: Map<String, Value>,
    /// Selected field path → display string.
    pub display: BTreeMap<String, String>,
}

impl WidgetView {
    pub fn new(
        widget: WidgetRecord,
        data: Option<Value>,
        error: Option<String>,
        last_updated: Option<DateTime<Utc>>,
    ) -> Self {
        let values = data
            .as_ref()
            .map(|d| extract_field_values(d, &widget.selected_fields))
            .unwrap_or_default();
        let display = values
            .iter()
            .map(|(path, value)| (path.clone(), format_value(value)))
            .collect();

        Self {
            widget,
            data,
            error,
            last_updated,
            values,
            display,
        }
    }
}

/// WebSocket message pushed to renderers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DashboardMessage {
    /// Full state, sent on connect and after structural changes.
    Snapshot(DashboardSnapshot),
    /// One widget received data or an error.
    Update {
        timestamp_ms: i64,
        widget: Box<WidgetView>,
    },
    /// A widget was removed.
    Removed { timestamp_ms: i64, widget_id: String },
}

/// Move the widget at `from` to position `to`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestConnectionRequest {
    pub url: String,
}

/// Result of probing an API URL before saving a widget.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Discovered fields for the field picker.
    pub fields: Vec<JsonField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use finboard_core::{DisplayMode, NewWidget};
    use serde_json::json;

    fn record() -> WidgetRecord {
        WidgetRecord::from_new(NewWidget {
            title: "BTC".to_string(),
            api_url: "https://x/y".to_string(),
            refresh_interval: 5,
            display_mode: DisplayMode::Card,
            selected_fields: vec!["price".to_string(), "missing".to_string()],
            chart_type: None,
            ws_url: None,
            use_websocket: false,
        })
    }

    #[test]
    fn test_view_extracts_selected_fields() {
        let view = WidgetView::new(record(), Some(json!({"price": 1500})), None, Some(Utc::now()));
        assert_eq!(view.values["price"], json!(1500));
        assert_eq!(view.values["missing"], Value::Null);
        assert_eq!(view.display["price"], "1.50K");
        assert_eq!(view.display["missing"], "N/A");
    }

    #[test]
    fn test_view_without_data() {
        let view = WidgetView::new(record(), None, Some("boom".to_string()), None);
        assert!(view.values.is_empty());
        assert!(view.display.is_empty());
    }

    #[test]
    fn test_message_serialization() {
        let view = WidgetView::new(record(), Some(json!({"price": 42})), None, None);
        let msg = DashboardMessage::Update {
            timestamp_ms: 1,
            widget: Box::new(view),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["timestampMs"], 1);
        assert_eq!(json["widget"]["title"], "BTC");
        assert_eq!(json["widget"]["apiUrl"], "https://x/y");
        assert_eq!(json["widget"]["display"]["price"], "42.00");
    }

    #[test]
    fn test_message_fields_are_camel_case() {
        let removed = serde_json::to_value(DashboardMessage::Removed {
            timestamp_ms: 7,
            widget_id: "w1".to_string(),
        })
        .unwrap();
        assert_eq!(removed, json!({"type": "removed", "timestampMs": 7, "widgetId": "w1"}));

        let snapshot = serde_json::to_value(DashboardMessage::Snapshot(DashboardSnapshot {
            timestamp_ms: 7,
            widgets: Vec::new(),
            active_subscriptions: 0,
        }))
        .unwrap();
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["timestampMs"], 7);
        assert_eq!(snapshot["activeSubscriptions"], 0);
    }
}
