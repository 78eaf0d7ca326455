// WebSocket handler: reconciled snapshot on connect, then live telemetry events

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::hub::TelemetryHub;
use crate::models::TelemetryEvent;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_telemetry(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        // Subscribe before reading the snapshot so no update falls in between.
        let mut rx = hub.subscribe();
        if let Err(e) = stream_telemetry(socket, &hub, &mut rx).await {
            tracing::info!("Telemetry stream error: {}", e);
        }
    })
}

async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}

/// Full state as one message; sent on connect and again after the client lagged.
async fn snapshot_json(hub: &TelemetryHub) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::json!({
        "type": "snapshot",
        "entries": hub.entries().await,
        "devices": hub.device_statuses(hub.now_ms()).await,
    }))
}

async fn stream_telemetry(
    mut socket: WebSocket,
    hub: &TelemetryHub,
    rx: &mut broadcast::Receiver<TelemetryEvent>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to telemetry stream");

    if !send_text(&mut socket, snapshot_json(hub).await?).await {
        return Ok(());
    }

    let mut ping_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + WS_PING_INTERVAL, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_text(&mut socket, serde_json::to_string(&event)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Skipped deltas are lost; resync the client with the full state.
                        tracing::warn!("WebSocket /ws/telemetry client lagged, skipped {} events; resending snapshot", n);
                        if !send_text(&mut socket, snapshot_json(hub).await?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}
