use anyhow::Result;
use growdash::*;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        user_id = %app_config.mqtt.user_id,
        broker = %format!("{}:{}", app_config.mqtt.host, app_config.mqtt.port),
        "loaded config"
    );

    let (hub, ingest_rx) = hub::TelemetryHub::new(hub::HubConfig {
        ingest_capacity: app_config.realtime.ingest_capacity,
        broadcast_capacity: app_config.realtime.broadcast_capacity,
        stale_after_ms: (app_config.realtime.stale_after_secs as i64) * 1000,
    });

    let (client, eventloop) = mqtt::new(mqtt::build_options(&app_config.mqtt));
    let subscription = mqtt::Subscription {
        filter: topics::sdata_filter(&app_config.mqtt.user_id),
        qos: app_config.mqtt.qos,
    };

    let (reconciler_shutdown_tx, reconciler_shutdown_rx) = oneshot::channel();
    let (liveness_shutdown_tx, liveness_shutdown_rx) = oneshot::channel();
    let (ingest_shutdown_tx, ingest_shutdown_rx) = oneshot::channel();

    let reconciler_handle = hub::spawn_reconciler(hub.clone(), ingest_rx, reconciler_shutdown_rx);
    let liveness_handle = hub::spawn_liveness(
        hub.clone(),
        hub::LivenessConfig {
            interval_secs: app_config.realtime.liveness_interval_secs,
            stats_log_interval_secs: app_config.realtime.stats_log_interval_secs,
        },
        liveness_shutdown_rx,
    );
    let ingest_handle = mqtt::spawn_ingest(
        eventloop,
        client.clone(),
        subscription,
        hub.ingest_sender(),
        ingest_shutdown_rx,
    );

    let (commands_tx, commands_rx) = mpsc::channel(app_config.realtime.ingest_capacity);
    let publisher_handle =
        mqtt::spawn_command_publisher(client.clone(), commands_rx, app_config.mqtt.qos);

    let app = routes::app(hub.clone(), commands_tx, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = ingest_shutdown_tx.send(());
            let _ = ingest_handle.await;
            let _ = reconciler_shutdown_tx.send(());
            let _ = liveness_shutdown_tx.send(());
            let _ = reconciler_handle.await;
            let _ = liveness_handle.await;
            if let Err(e) = client.disconnect().await {
                tracing::debug!(error = %e, "mqtt disconnect");
            }
            publisher_handle.abort();
            hub.reset().await;
        }
    }

    Ok(())
}
