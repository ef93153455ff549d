//! Application wiring and lifecycle.

use crate::config::AppConfig;
use crate::error::AppResult;
use finboard_dashboard::{run_server, DashboardState};
use finboard_http::{ApiClient, RateLimiter, ResponseCache};
use finboard_persistence::WidgetStore;
use finboard_realtime::SubscriptionManager;
use finboard_stream::StreamConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Owns the shared components and runs them until shutdown.
pub struct Application {
    config: AppConfig,
    state: DashboardState,
    shutdown: CancellationToken,
}

impl Application {
    /// Build every component and load persisted widgets. Must be called
    /// within a tokio runtime.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let cache = Arc::new(ResponseCache::new());
        let limiter = Arc::new(RateLimiter::new());
        let api = ApiClient::new(config.http.clone(), cache, limiter)?;

        let manager = SubscriptionManager::new(
            Arc::new(api.clone()),
            config.realtime.clone(),
            StreamConfig::from(&config.stream),
        );
        let store = WidgetStore::from_config(&config.persistence);
        let state = DashboardState::new(store, manager, api);

        Ok(Self {
            config,
            state,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Token that stops [`Application::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start all widget feeds and the dashboard server, then wait for
    /// Ctrl-C or the shutdown token.
    pub async fn run(self) -> AppResult<()> {
        info!(
            widgets = self.state.widget_count(),
            dashboard = self.config.dashboard.enabled,
            "Starting application"
        );
        self.state.subscribe_all();

        let server = self.config.dashboard.enabled.then(|| {
            let state = self.state.clone();
            let config = self.config.dashboard.clone();
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = run_server(state, config, token).await {
                    error!(error = %e, "Dashboard server failed");
                }
            })
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
            () = self.shutdown.cancelled() => info!("Shutdown requested"),
        }

        info!(
            active_subscriptions = self.state.manager().active_count(),
            "Shutting down"
        );
        self.state.shutdown();
        self.shutdown.cancel();

        if let Some(server) = server {
            let _ = server.await;
        }
        Ok(())
    }
}
