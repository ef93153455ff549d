//! finboard-dashboard - widget state and the boundary server.
//!
//! `DashboardState` owns the widget list and each widget's latest
//! `(data, error, last_updated)`; it keeps the subscription layer and the
//! persisted list in step with every mutation.
//!
//! The axum server exposes it to renderers:
//!
//! ```text
//! GET    /api/snapshot               → all widgets with live data
//! GET    /ws                         → snapshot, then pushed updates
//! POST   /api/widgets                → add widget
//! DELETE /api/widgets                → reset dashboard
//! PATCH  /api/widgets/{id}           → update widget
//! DELETE /api/widgets/{id}           → remove widget
//! POST   /api/widgets/{id}/refresh   → clear cache and refetch
//! POST   /api/widgets/reorder        → move a widget
//! POST   /api/test-connection        → validate an API URL
//! GET    /metrics                    → Prometheus metrics
//! ```
//!
//! The server binds loopback unless `bind_address` says otherwise. Basic
//! auth guards every route when credentials are configured, and only
//! `allowed_origins` may call the API cross-origin.

mod broadcast;
mod config;
mod error;
mod server;
mod state;
mod types;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::{create_router, run_server, AppState};
pub use state::DashboardState;
pub use types::{
    DashboardMessage, DashboardSnapshot, ReorderRequest, TestConnectionRequest,
    TestConnectionResponse, WidgetView,
};
