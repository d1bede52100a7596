//! HTTP API handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::engine::snapshot::{NetworkHealthView, StatsView};
use crate::engine::Engine;
use crate::strategy::{Strategy, StrategyAction};

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The engine.
    pub engine: Arc<Engine>,
    /// Prometheus render handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

/// Body of `POST /start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Scan without trading. Defaults to the configured mode.
    pub dry_run: Option<bool>,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false.
    pub success: bool,
    /// What went wrong.
    pub error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
    /// Scheduler running.
    pub is_running: bool,
    /// Scan-only mode.
    pub is_dry_run: bool,
    /// Per-network connectivity.
    pub networks: Vec<NetworkHealthView>,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    /// At least one network connected.
    pub ready: bool,
    /// Connected network ids.
    pub connected: Vec<String>,
}

/// Strategy toggle response.
#[derive(Debug, Serialize)]
pub struct StrategyResponse {
    /// Always true.
    pub success: bool,
    /// Strategy name.
    pub strategy: String,
    /// Flag after the toggle.
    pub enabled: bool,
    /// Whether the strategy does anything yet.
    pub implemented: bool,
}

/// Reset response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    /// Always true.
    pub success: bool,
    /// Running flag, unchanged by a reset.
    pub is_running: bool,
    /// Counters after the reset.
    pub stats: StatsView,
}

/// Health check handler - always returns 200.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.engine;
    Json(HealthResponse {
        status: "ok",
        is_running: engine.is_running(),
        is_dry_run: engine.is_dry_run(),
        networks: engine.health().await,
    })
}

/// Readiness check handler - returns 200 if any network is connected, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let connected = state.engine.connected_networks().await;
    let response = ReadyResponse {
        ready: !connected.is_empty(),
        connected,
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Full engine snapshot.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.snapshot().await)
}

/// Start the scheduler. 400 if already running.
pub async fn start(
    State(state): State<AppState>,
    body: Option<Json<StartRequest>>,
) -> Response {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state.engine.start(request.dry_run).await;

    if outcome.success {
        (StatusCode::OK, Json(outcome)).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(outcome)).into_response()
    }
}

/// Stop the scheduler and return final stats.
pub async fn stop(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.stop().await)
}

/// Toggle a strategy by name.
pub async fn strategy(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> Response {
    let Ok(strategy) = Strategy::from_str(&name) else {
        return bad_request(format!("unknown strategy: {name}"));
    };
    let Ok(action) = StrategyAction::from_str(&action) else {
        return bad_request(format!("unknown action: {action} (expected enable or disable)"));
    };

    let status = state.engine.set_strategy(strategy, action).await;
    Json(StrategyResponse {
        success: true,
        strategy: status.name,
        enabled: status.enabled,
        implemented: status.implemented,
    })
    .into_response()
}

/// Clear counters, trade log and recent opportunities.
pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.reset().await;
    let snapshot = state.engine.snapshot().await;
    Json(ResetResponse {
        success: true,
        is_running: snapshot.is_running,
        stats: snapshot.stats,
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
