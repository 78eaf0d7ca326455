// Thin MQTT v5 adapter: feeds decoded sdata messages into the hub's ingest channel
// and publishes actuator commands.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use rumqttc::Transport;
use rumqttc::v5 as mqtt5;

use crate::config::MqttConfig;
use crate::error::AppError;
use crate::models::{ActuatorCommand, TelemetryMessage};
use crate::topics;

pub type MqttOptions = mqtt5::MqttOptions;
pub type AsyncClient = mqtt5::AsyncClient;
pub type EventLoop = mqtt5::EventLoop;
pub type V5Publish = mqtt5::mqttbytes::v5::Publish;

/// Delay before polling again after a connection error (the event loop reconnects on poll).
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub fn build_options(cfg: &MqttConfig) -> MqttOptions {
    let client_id = format!("growdash-{}", Uuid::new_v4());
    let mut opts = MqttOptions::new(client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    opts.set_clean_start(true);
    if let (Some(u), Some(p)) = (&cfg.username, &cfg.password) {
        opts.set_credentials(u.clone(), p.clone());
    }
    if cfg.port == 8883 {
        opts.set_transport(Transport::tls_with_default_config());
    }
    opts
}

pub fn new(options: MqttOptions) -> (AsyncClient, EventLoop) {
    mqtt5::AsyncClient::new(options, 50)
}

pub fn qos(v: u8) -> mqtt5::mqttbytes::QoS {
    match v {
        2 => mqtt5::mqttbytes::QoS::ExactlyOnce,
        0 => mqtt5::mqttbytes::QoS::AtMostOnce,
        _ => mqtt5::mqttbytes::QoS::AtLeastOnce,
    }
}

/// Event-loop activity the ingest task reacts to.
#[derive(Debug)]
pub enum IngestEvent {
    /// Broker accepted a (re)connect. With a clean start it holds no subscriptions.
    Connected,
    Publish(V5Publish),
}

/// Keep only what ingest needs; pings, acks and outgoing notices are `None`.
pub fn ingest_event(event: mqtt5::Event) -> Option<IngestEvent> {
    match event {
        mqtt5::Event::Incoming(mqtt5::Incoming::ConnAck(_)) => Some(IngestEvent::Connected),
        mqtt5::Event::Incoming(mqtt5::Incoming::Publish(p)) => Some(IngestEvent::Publish(p)),
        _ => None,
    }
}

pub async fn next_event(eventloop: &mut EventLoop) -> Result<IngestEvent, AppError> {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if let Some(event) = ingest_event(event) {
                    return Ok(event);
                }
            }
            Err(e) => return Err(AppError::Mqtt(e.to_string())),
        }
    }
}

/// Queue a subscribe for `filter` without waiting on the event loop (the caller is the one polling it).
pub fn subscribe(client: &AsyncClient, filter: &str, qos_level: u8) -> Result<(), AppError> {
    client
        .try_subscribe(filter, qos(qos_level))
        .map_err(|e| AppError::Mqtt(format!("subscribe {}: {}", filter, e)))
}

/// Decode one publish into a telemetry message. `Ok(None)` for topics the hub ignores.
pub fn decode_publish(publish: &V5Publish) -> Result<Option<TelemetryMessage>, AppError> {
    let topic = std::str::from_utf8(&publish.topic)
        .map_err(|e| AppError::Mqtt(format!("non-utf8 topic: {}", e)))?;
    topics::decode_sdata(topic, publish.payload.as_ref())
}

/// Subscription the ingest task (re)issues after every ConnAck.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub filter: String,
    pub qos: u8,
}

/// Polls the event loop and forwards every decoded sdata message to `ingest_tx`.
/// Subscribes on each ConnAck, so the filter survives reconnects with a clean session.
/// Bad topics/payloads are logged and skipped; connection errors back off and retry.
pub fn spawn_ingest(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscription: Subscription,
    ingest_tx: mpsc::Sender<TelemetryMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("MQTT ingest shutting down");
                    break;
                }
                res = next_event(&mut eventloop) => {
                    match res {
                        Ok(IngestEvent::Connected) => {
                            match subscribe(&client, &subscription.filter, subscription.qos) {
                                Ok(()) => tracing::info!(filter = %subscription.filter, "subscribed to device state topics"),
                                Err(e) => tracing::warn!(error = %e, operation = "subscribe", "resubscribe failed"),
                            }
                        }
                        Ok(IngestEvent::Publish(publish)) => match decode_publish(&publish) {
                            Ok(Some(msg)) => {
                                if ingest_tx.send(msg).await.is_err() {
                                    tracing::debug!("ingest channel closed");
                                    break;
                                }
                            }
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::warn!(error = %e, operation = "decode_publish", "skipping message");
                            }
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "mqtt error; reconnecting after short delay");
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }
            }
        }
    })
}

/// Publishes queued actuator commands until the sending side is dropped.
pub fn spawn_command_publisher(
    client: AsyncClient,
    mut commands_rx: mpsc::Receiver<ActuatorCommand>,
    qos_level: u8,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(cmd) = commands_rx.recv().await {
            let payload = match cmd.payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, topic = %cmd.topic, "command encode failed");
                    continue;
                }
            };
            match client
                .publish(cmd.topic.clone(), qos(qos_level), false, payload)
                .await
            {
                Ok(()) => tracing::info!(
                    topic = %cmd.topic,
                    mode = %cmd.mode,
                    value = cmd.value,
                    "command published"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    topic = %cmd.topic,
                    operation = "publish_command",
                    "command publish failed"
                ),
            }
        }
        tracing::debug!("Command publisher shutting down");
    })
}
