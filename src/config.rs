use serde::Deserialize;
use std::collections::BTreeMap;

use crate::aligner::{AlignOptions, BucketOrder, DEFAULT_MAX_ROWS, DEFAULT_TOLERANCE_MS};
use crate::models::{TIME_COLUMN, VariableMap};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mqtt: MqttConfig,
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    /// Firmware channel code -> short name (e.g. `OHFEn7XH3K = "temp"`).
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// First topic segment; scopes subscriptions and commands to one account.
    pub user_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_qos")]
    pub qos: u8,
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_qos() -> u8 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Buffer between the MQTT event loop and the reconcile task.
    pub ingest_capacity: usize,
    /// Max number of events kept for /ws/telemetry (slow clients may lag).
    pub broadcast_capacity: usize,
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
    /// A device with no message for this long is reported offline.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_liveness_interval_secs() -> u64 {
    5
}

fn default_stale_after_secs() -> u64 {
    30
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlignmentConfig {
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: i64,
    #[serde(default)]
    pub order: BucketOrder,
    /// Cap on rows per alignment, synthesized rows included.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_tolerance_ms() -> i64 {
    DEFAULT_TOLERANCE_MS
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: default_tolerance_ms(),
            order: BucketOrder::default(),
            max_rows: default_max_rows(),
        }
    }
}

impl AlignmentConfig {
    pub fn options(&self) -> AlignOptions {
        AlignOptions {
            tolerance_ms: self.tolerance_ms,
            order: self.order,
            max_rows: self.max_rows,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn variable_map(&self) -> VariableMap {
        VariableMap::with_codes(&self.variables)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.mqtt.host.is_empty(), "mqtt.host must be non-empty");
        anyhow::ensure!(
            self.mqtt.port > 0,
            "mqtt.port must be between 1 and 65535, got {}",
            self.mqtt.port
        );
        anyhow::ensure!(
            !self.mqtt.user_id.is_empty() && !self.mqtt.user_id.contains(['/', '+', '#']),
            "mqtt.user_id must be a non-empty single topic segment, got {:?}",
            self.mqtt.user_id
        );
        anyhow::ensure!(
            self.mqtt.qos <= 2,
            "mqtt.qos must be 0, 1 or 2, got {}",
            self.mqtt.qos
        );
        anyhow::ensure!(
            self.mqtt.keep_alive_secs > 0,
            "mqtt.keep_alive_secs must be > 0, got {}",
            self.mqtt.keep_alive_secs
        );
        anyhow::ensure!(
            self.realtime.ingest_capacity > 0,
            "realtime.ingest_capacity must be > 0, got {}",
            self.realtime.ingest_capacity
        );
        anyhow::ensure!(
            self.realtime.broadcast_capacity > 0,
            "realtime.broadcast_capacity must be > 0, got {}",
            self.realtime.broadcast_capacity
        );
        anyhow::ensure!(
            self.realtime.liveness_interval_secs > 0,
            "realtime.liveness_interval_secs must be > 0, got {}",
            self.realtime.liveness_interval_secs
        );
        anyhow::ensure!(
            self.realtime.stale_after_secs > 0,
            "realtime.stale_after_secs must be > 0, got {}",
            self.realtime.stale_after_secs
        );
        anyhow::ensure!(
            self.realtime.stats_log_interval_secs > 0,
            "realtime.stats_log_interval_secs must be > 0, got {}",
            self.realtime.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.alignment.tolerance_ms > 0,
            "alignment.tolerance_ms must be > 0, got {}",
            self.alignment.tolerance_ms
        );
        anyhow::ensure!(
            self.alignment.max_rows > 0,
            "alignment.max_rows must be > 0, got {}",
            self.alignment.max_rows
        );
        for (code, name) in &self.variables {
            anyhow::ensure!(
                !code.is_empty() && !name.is_empty(),
                "variables entries must have non-empty code and name, got {:?} = {:?}",
                code,
                name
            );
            anyhow::ensure!(
                name != TIME_COLUMN,
                "variables entry {:?} must not map to the reserved name {:?}",
                code,
                TIME_COLUMN
            );
        }
        Ok(())
    }
}
