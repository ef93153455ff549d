//! Widget persistence for finboard.
//!
//! The widget list is stored as one JSON document,
//! `{"state": {"widgets": [...]}}`, rewritten atomically on every change.

pub mod error;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use store::{PersistenceConfig, WidgetStore, STORE_NAME};
