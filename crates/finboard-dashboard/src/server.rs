//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use finboard_core::{NewWidget, WidgetPatch, WidgetRecord};
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;
use crate::types::{
    DashboardMessage, DashboardSnapshot, ReorderRequest, TestConnectionRequest,
    TestConnectionResponse,
};

/// Caps concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot, released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    dashboard_state: DashboardState,
    config: Arc<DashboardConfig>,
    connection_limiter: Arc<ConnectionLimiter>,
}

impl AppState {
    pub fn new(dashboard_state: DashboardState, config: &DashboardConfig) -> Self {
        Self {
            dashboard_state,
            config: Arc::new(config.clone()),
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::WidgetNotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::InvalidWidget(_) | DashboardError::InvalidIndex { .. } => {
                StatusCode::BAD_REQUEST
            }
            DashboardError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/widgets", post(add_widget).delete(reset_dashboard))
        .route("/api/widgets/reorder", post(reorder_widgets))
        .route(
            "/api/widgets/{id}",
            patch(update_widget).delete(remove_widget),
        )
        .route("/api/widgets/{id}/refresh", post(refresh_widget))
        .route("/api/test-connection", post(test_connection))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins only. With none configured, browsers
/// refuse every cross-origin call that needs a preflight.
fn cors_layer(config: &DashboardConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.config.auth_enabled() && !check_basic_auth(request.headers(), &state.config) {
        return unauthorized_response();
    }
    next.run(request).await
}

/// Check basic authentication.
fn check_basic_auth(headers: &HeaderMap, config: &DashboardConfig) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Basic "))
    else {
        return false;
    };

    match BASE64.decode(encoded.trim()) {
        Ok(decoded) => decoded == format!("{}:{}", config.username, config.password).as_bytes(),
        Err(_) => false,
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"finboard\"")],
        "Unauthorized",
    )
        .into_response()
}

async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard_state.collect_snapshot())
}

async fn add_widget(
    State(state): State<AppState>,
    Json(new): Json<NewWidget>,
) -> Result<(StatusCode, Json<WidgetRecord>), DashboardError> {
    let record = state.dashboard_state.add_widget(new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<WidgetPatch>,
) -> Result<Json<WidgetRecord>, DashboardError> {
    state.dashboard_state.update_widget(&id, patch).map(Json)
}

async fn remove_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, DashboardError> {
    if state.dashboard_state.remove_widget(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DashboardError::WidgetNotFound(id))
    }
}

async fn reset_dashboard(State(state): State<AppState>) -> StatusCode {
    state.dashboard_state.reset();
    StatusCode::NO_CONTENT
}

async fn refresh_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, DashboardError> {
    state.dashboard_state.refresh_widget(&id)?;
    Ok(StatusCode::ACCEPTED)
}

async fn reorder_widgets(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> Result<StatusCode, DashboardError> {
    state.dashboard_state.reorder(request.from, request.to)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Probe a URL. Upstream failures are reported in the body, not the status.
async fn test_connection(
    State(state): State<AppState>,
    Json(request): Json<TestConnectionRequest>,
) -> Json<TestConnectionResponse> {
    let response = match state.dashboard_state.test_connection(&request.url).await {
        Ok(adapted) => TestConnectionResponse {
            success: true,
            data: Some(adapted.data),
            fields: adapted.fields,
            error: None,
        },
        Err(e) => TestConnectionResponse {
            success: false,
            data: None,
            fields: Vec::new(),
            error: Some(e.to_string()),
        },
    };
    Json(response)
}

async fn get_metrics() -> Response {
    match finboard_telemetry::encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Send a snapshot, then forward every pushed message until either side closes.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no update falls in between
    let mut broadcast_rx = state.dashboard_state.subscribe_messages();

    if let Some(json) = snapshot_json(&state) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!("Failed to send initial snapshot, client disconnected");
            return;
        }
    }

    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Skipped updates are covered by a fresh snapshot
                        warn!(skipped = n, "WebSocket client lagged, resending snapshot");
                        if let Some(json) = snapshot_json(&state) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("Failed to send snapshot, client disconnected");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    info!("WebSocket connection closed");
}

fn snapshot_json(state: &AppState) -> Option<String> {
    let snapshot = DashboardMessage::Snapshot(state.dashboard_state.collect_snapshot());
    match serde_json::to_string(&snapshot) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize snapshot");
            None
        }
    }
}

/// Run the dashboard HTTP server until `shutdown` is cancelled.
pub async fn run_server(
    dashboard_state: DashboardState,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let app = create_router(AppState::new(dashboard_state, &config));

    let addr = config.socket_addr();
    if !addr.ip().is_loopback() && !config.auth_enabled() {
        warn!(%addr, "Dashboard exposed beyond loopback without authentication");
    }
    info!(%addr, "Starting dashboard server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Dashboard server stopped");
    Ok(())
}
