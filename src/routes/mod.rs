// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::hub::TelemetryHub;
use crate::models::{ActuatorCommand, VariableMap};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: TelemetryHub,
    pub(crate) commands_tx: mpsc::Sender<ActuatorCommand>,
    pub(crate) variables: Arc<VariableMap>,
    pub(crate) config: Arc<AppConfig>,
}

pub fn app(
    hub: TelemetryHub,
    commands_tx: mpsc::Sender<ActuatorCommand>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        hub,
        commands_tx,
        variables: Arc::new(config.variable_map()),
        config: Arc::new(config),
    };
    Router::new()
        .route("/", get(|| async { "growdash telemetry hub" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/telemetry", get(http::list_telemetry)) // GET /api/telemetry
        .route("/api/devices", get(http::list_devices)) // GET /api/devices
        .route(
            "/api/devices/{device_id}/telemetry",
            get(http::device_telemetry),
        )
        .route(
            "/api/devices/{device_id}/variables/{variable}",
            get(http::device_variable),
        )
        .route(
            "/api/devices/{device_id}/variables/{variable}/mode",
            post(http::set_mode),
        )
        .route("/api/series/align", post(http::align_series)) // POST /api/series/align
        .route("/ws/telemetry", get(ws::ws_telemetry)) // WS /ws/telemetry
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
