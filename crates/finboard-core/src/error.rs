//! Feed error taxonomy.
//!
//! Every failure a widget can observe is one of these variants. The
//! `Display` output is the human-readable message rendered inline on the
//! widget, so it must stay stable.

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Payload was not a JSON object or array.
    #[error("Invalid response format")]
    InvalidResponseShape,

    /// No response reached us (connect, DNS, TLS or timeout failure).
    #[error("Network error. Please check your connection and API URL.")]
    Network { detail: String },

    /// Upstream answered with a non-success status other than 429.
    #[error("API error: {status} {status_text}")]
    Http { status: u16, status_text: String },

    /// Local fixed-window limiter denied the request.
    #[error("Rate limit exceeded. Try again after {}", retry_hint(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Upstream answered 429.
    #[error("Rate limit exceeded. Please try again later.")]
    UpstreamRateLimited,

    /// Stream transport error.
    #[error("WebSocket connection error")]
    WebSocket,

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    /// Whether this failure came from a rate limit, local or upstream.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::UpstreamRateLimited)
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidResponseShape => "invalid_shape",
            Self::Network { .. } => "network",
            Self::Http { .. } => "http",
            Self::RateLimited { .. } => "rate_limited",
            Self::UpstreamRateLimited => "upstream_rate_limited",
            Self::WebSocket => "websocket",
            Self::Other(_) => "other",
        }
    }
}

fn retry_hint(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(t) => t.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "some time".to_string(),
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
