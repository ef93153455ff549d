//! Core domain types for the finboard realtime dashboard.
//!
//! This crate provides the types shared by every layer of the system:
//! - `WidgetRecord`, `FeedConfig`: persisted widgets and their live feed settings
//! - `FeedUpdate`: the `(data, error, timestamp)` triple pushed to renderers
//! - `FeedError`: the uniform failure taxonomy for HTTP and stream feeds
//! - `flatten_json` and friends: field discovery for the field picker
//! - value formatting helpers for card/table display

pub mod adapter;
pub mod error;
pub mod format;
pub mod json_explorer;
pub mod types;
pub mod widget;

pub use adapter::{adapt_api_response, extract_field_values, AdaptedResponse};
pub use error::{FeedError, FeedResult};
pub use json_explorer::{filter_fields, flatten_json, value_by_path, ROOT_PATH};
pub use types::{FeedUpdate, FieldType, JsonField};
pub use widget::{
    ChartType, DisplayMode, FeedConfig, FeedMode, NewWidget, WidgetPatch, WidgetRecord,
    DEFAULT_REFRESH_INTERVAL_SECS, MIN_REFRESH_INTERVAL_SECS,
};
