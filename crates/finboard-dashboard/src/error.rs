//! Dashboard error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Widget not found: {0}")]
    WidgetNotFound(String),

    #[error("Invalid widget: {0}")]
    InvalidWidget(String),

    #[error("Index {index} out of range for {len} widgets")]
    InvalidIndex { index: usize, len: usize },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
