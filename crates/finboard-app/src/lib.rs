//! finboard realtime dashboard backend.
//!
//! Wires the components together:
//! - HTTP fetcher with shared response cache and rate limiter
//! - Subscription manager keeping one live feed per widget
//! - Persisted widget list
//! - Dashboard server for renderers

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, StreamSettings};
pub use error::{AppError, AppResult};
