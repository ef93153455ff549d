//! Common data types for widget feeds.
//!
//! Contains the update triple delivered to renderers and the field
//! descriptors produced by JSON flattening.

use crate::adapter::AdaptedResponse;
use crate::error::FeedResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tick of a widget feed.
///
/// Exactly one of `data` / `error` is set for updates produced by a feed.
/// Renderers must still tolerate both being absent (initial loading state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedUpdate {
    /// Latest payload.
    pub data: Option<Value>,
    /// Human-readable failure message.
    pub error: Option<String>,
    /// When this update was produced.
    pub received_at: DateTime<Utc>,
}

impl FeedUpdate {
    /// Successful update carrying a payload.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            received_at: Utc::now(),
        }
    }

    /// Failed update carrying an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            received_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<FeedResult<AdaptedResponse>> for FeedUpdate {
    fn from(result: FeedResult<AdaptedResponse>) -> Self {
        match result {
            Ok(adapted) => Self::data(adapted.data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Inferred type of a flattened JSON node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl FieldType {
    /// Infer the type of a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// An addressable field discovered in a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonField {
    /// Address such as `a.b`, `c[0]` or `c[0].d`.
    pub path: String,
    /// Sample value at this path.
    pub value: Value,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_array: bool,
    /// Label shown in the field picker.
    pub display_name: String,
}

impl JsonField {
    pub fn new(path: impl Into<String>, display_name: impl Into<String>, value: &Value) -> Self {
        let field_type = FieldType::of(value);
        Self {
            path: path.into(),
            value: value.clone(),
            field_type,
            is_array: field_type == FieldType::Array,
            display_name: display_name.into(),
        }
    }
}
