// HTTP handlers: version, live state queries, mode commands, series alignment

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AppState;
use crate::aligner::{self, BucketOrder};
use crate::error::ApiError;
use crate::models::{
    ActuatorCommand, AlignedRow, ControlMode, DeviceControlState, DeviceStatus, TelemetryEntry,
    TelemetryValue,
};
use crate::topics;
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/telemetry — every reconciled entry, in first-seen order.
pub(super) async fn list_telemetry(State(state): State<AppState>) -> Json<Vec<TelemetryEntry>> {
    Json(state.hub.entries().await)
}

/// GET /api/devices — online/offline for every device seen this session.
pub(super) async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    Json(state.hub.device_statuses(state.hub.now_ms()).await)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTelemetryResponse {
    pub device_id: String,
    pub status: DeviceStatus,
    pub entries: Vec<TelemetryEntry>,
}

/// GET /api/devices/{device_id}/telemetry
pub(super) async fn device_telemetry(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceTelemetryResponse>, ApiError> {
    let status = state
        .hub
        .device_status(&device_id, state.hub.now_ms())
        .await
        .ok_or_else(|| ApiError::NotFound(format!("device {}", device_id)))?;
    let entries = state.hub.device_entries(&device_id).await;
    Ok(Json(DeviceTelemetryResponse {
        device_id,
        status,
        entries,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableResponse {
    pub device_id: String,
    pub variable: String,
    pub value: TelemetryValue,
    pub control: DeviceControlState,
}

/// GET /api/devices/{device_id}/variables/{variable} — latest value plus its control-mode reading.
pub(super) async fn device_variable(
    State(state): State<AppState>,
    Path((device_id, variable)): Path<(String, String)>,
) -> Result<Json<VariableResponse>, ApiError> {
    let control = state
        .hub
        .control_state(&device_id, &variable)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("{}/{}", device_id, variable)))?;
    Ok(Json(VariableResponse {
        device_id,
        variable,
        value: control.raw,
        control,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct ModeRequest {
    mode: String,
}

/// POST /api/devices/{device_id}/variables/{variable}/mode — queue `{"value": code}` on actdata.
pub(super) async fn set_mode(
    State(state): State<AppState>,
    Path((device_id, variable)): Path<(String, String)>,
    Json(req): Json<ModeRequest>,
) -> Result<(StatusCode, Json<ActuatorCommand>), ApiError> {
    let mode: ControlMode = req.mode.parse().map_err(ApiError::InvalidInput)?;
    let topic = topics::actdata_topic(&state.config.mqtt.user_id, &device_id, &variable);
    let command = ActuatorCommand::new(topic, mode);
    state
        .commands_tx
        .send(command.clone())
        .await
        .map_err(|_| ApiError::Unavailable("command publisher stopped".into()))?;
    tracing::debug!(device_id = %device_id, variable = %variable, mode = %mode, "command queued");
    Ok((StatusCode::ACCEPTED, Json(command)))
}

#[derive(Debug, Deserialize)]
pub(super) struct AlignQuery {
    tolerance_ms: Option<i64>,
    order: Option<BucketOrder>,
}

/// POST /api/series/align — body is an array of per-variable point arrays.
pub(super) async fn align_series(
    State(state): State<AppState>,
    Query(query): Query<AlignQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Vec<AlignedRow>>, ApiError> {
    let mut options = state.config.alignment.options();
    if let Some(t) = query.tolerance_ms {
        options.tolerance_ms = t;
    }
    if let Some(o) = query.order {
        options.order = o;
    }
    let rows = aligner::align_json(&body, &options, &state.variables)?;
    Ok(Json(rows))
}
