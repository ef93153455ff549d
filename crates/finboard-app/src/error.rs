//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] finboard_core::FeedError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] finboard_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] finboard_persistence::PersistenceError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] finboard_dashboard::DashboardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
