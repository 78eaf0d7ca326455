// Telemetry hub: owns the reconciler for one session.
// A single reconcile task applies inbound messages (the only writer); HTTP/WS handlers read.
// The liveness task re-evaluates device online/offline on a fixed tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

use crate::models::{
    DeviceControlState, DeviceStatus, TelemetryEntry, TelemetryEvent, TelemetryMessage,
    TelemetryValue,
};
use crate::reconciler::{IngestOutcome, StreamReconciler};

/// Session clock in epoch ms: anchored to the wall clock once, then advanced by tokio's
/// monotonic clock.
#[derive(Debug, Clone, Copy)]
struct SessionClock {
    epoch_ms: i64,
    started: Instant,
}

impl SessionClock {
    fn start() -> Self {
        Self {
            epoch_ms: chrono::Utc::now().timestamp_millis(),
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub ingest_capacity: usize,
    pub broadcast_capacity: usize,
    pub stale_after_ms: i64,
}

#[derive(Debug, Default)]
pub struct HubStats {
    pub messages_applied: AtomicU64,
    pub messages_dropped: AtomicU64,
}

#[derive(Clone)]
pub struct TelemetryHub {
    reconciler: Arc<RwLock<StreamReconciler>>,
    events_tx: broadcast::Sender<TelemetryEvent>,
    ingest_tx: mpsc::Sender<TelemetryMessage>,
    stats: Arc<HubStats>,
    stale_after_ms: i64,
    clock: SessionClock,
}

impl TelemetryHub {
    /// Returns the hub and the receiving end of its ingest channel (hand it to `spawn_reconciler`).
    pub fn new(config: HubConfig) -> (Self, mpsc::Receiver<TelemetryMessage>) {
        let (ingest_tx, ingest_rx) = mpsc::channel(config.ingest_capacity);
        let (events_tx, _) = broadcast::channel(config.broadcast_capacity);
        let hub = Self {
            reconciler: Arc::new(RwLock::new(StreamReconciler::new())),
            events_tx,
            ingest_tx,
            stats: Arc::new(HubStats::default()),
            stale_after_ms: config.stale_after_ms,
            clock: SessionClock::start(),
        };
        (hub, ingest_rx)
    }

    pub fn ingest_sender(&self) -> mpsc::Sender<TelemetryMessage> {
        self.ingest_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events_tx.subscribe()
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    pub fn stale_after_ms(&self) -> i64 {
        self.stale_after_ms
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Apply one message and broadcast the entry if it changed.
    pub async fn apply(&self, msg: TelemetryMessage, now_ms: i64) -> IngestOutcome {
        let topic = msg.topic.clone();
        let mut reconciler = self.reconciler.write().await;
        let outcome = reconciler.ingest(msg, now_ms);
        match outcome {
            IngestOutcome::Dropped => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(topic = %topic, "telemetry message without value dropped");
            }
            _ => {
                self.stats.messages_applied.fetch_add(1, Ordering::Relaxed);
            }
        }
        if outcome.changed()
            && let Some(entry) = reconciler.get(&topic)
        {
            // No receivers just means no WS client is connected.
            let _ = self.events_tx.send(TelemetryEvent::Entry {
                entry: entry.clone(),
            });
        }
        outcome
    }

    pub async fn entries(&self) -> Vec<TelemetryEntry> {
        self.reconciler.read().await.entries().to_vec()
    }

    pub async fn device_entries(&self, device_id: &str) -> Vec<TelemetryEntry> {
        self.reconciler
            .read()
            .await
            .query_by_device(device_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn value(&self, device_id: &str, variable: &str) -> Option<TelemetryValue> {
        self.reconciler
            .read()
            .await
            .query_by_device_and_variable(device_id, variable)
            .copied()
    }

    pub async fn control_state(
        &self,
        device_id: &str,
        variable: &str,
    ) -> Option<DeviceControlState> {
        self.reconciler
            .read()
            .await
            .control_state(device_id, variable)
    }

    pub async fn device_status(&self, device_id: &str, now_ms: i64) -> Option<DeviceStatus> {
        self.reconciler
            .read()
            .await
            .device_status(device_id, now_ms, self.stale_after_ms)
    }

    pub async fn device_statuses(&self, now_ms: i64) -> Vec<DeviceStatus> {
        self.reconciler
            .read()
            .await
            .device_statuses(now_ms, self.stale_after_ms)
    }

    /// One liveness pass: returns (and broadcasts) statuses that are new or flipped since `previous`.
    pub async fn check_liveness(
        &self,
        now_ms: i64,
        previous: &mut HashMap<String, bool>,
    ) -> Vec<DeviceStatus> {
        let mut changed = Vec::new();
        for status in self.device_statuses(now_ms).await {
            if previous.insert(status.device_id.clone(), status.online) != Some(status.online) {
                changed.push(status);
            }
        }
        for status in &changed {
            tracing::info!(
                device_id = %status.device_id,
                online = status.online,
                "device liveness changed"
            );
            let _ = self.events_tx.send(TelemetryEvent::Status {
                status: status.clone(),
            });
        }
        changed
    }

    pub async fn entry_and_device_counts(&self) -> (usize, usize) {
        let r = self.reconciler.read().await;
        (r.len(), r.device_count())
    }

    /// Session teardown: forget every entry and device.
    pub async fn reset(&self) {
        self.reconciler.write().await.clear();
    }
}

/// Spawns the single writer: drains the ingest channel into the reconciler until shutdown
/// or until every sender is gone.
pub fn spawn_reconciler(
    hub: TelemetryHub,
    mut ingest_rx: mpsc::Receiver<TelemetryMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = ingest_rx.recv() => {
                    match msg {
                        Some(msg) => {
                            hub.apply(msg, hub.now_ms()).await;
                        }
                        None => break,
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Reconciler shutting down");
                    break;
                }
            }
        }
    })
}

/// Liveness and stats-log timing.
pub struct LivenessConfig {
    pub interval_secs: u64,
    /// How often to log hub stats at INFO level.
    pub stats_log_interval_secs: u64,
}

pub fn spawn_liveness(
    hub: TelemetryHub,
    config: LivenessConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "liveness",
        interval_secs = config.interval_secs
    );
    let task = async move {
        let mut tick = interval(Duration::from_secs(config.interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut previous: HashMap<String, bool> = HashMap::new();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    hub.check_liveness(hub.now_ms(), &mut previous).await;
                }
                _ = stats_log_tick.tick() => {
                    let (entries, devices) = hub.entry_and_device_counts().await;
                    let online = previous.values().filter(|o| **o).count();
                    tracing::info!(
                        entries,
                        devices,
                        devices_online = online,
                        messages_applied = hub.stats().messages_applied.load(Ordering::Relaxed),
                        messages_dropped = hub.stats().messages_dropped.load(Ordering::Relaxed),
                        ws_clients = hub.events_tx.receiver_count(),
                        "hub stats"
                    );
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Liveness task shutting down");
                    break;
                }
            }
        }
    };
    tokio::spawn(task.instrument(span))
}
