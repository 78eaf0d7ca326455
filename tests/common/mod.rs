// Shared test helpers

#![allow(dead_code)]

use growdash::config::AppConfig;
use growdash::models::{SeriesPoint, TelemetryMessage, TelemetryValue, Variable};

pub const USER: &str = "u1";

pub const TEST_CONFIG: &str = r#"
[server]
port = 8080
host = "0.0.0.0"

[mqtt]
host = "localhost"
port = 1883
user_id = "u1"

[realtime]
ingest_capacity = 64
broadcast_capacity = 16
"#;

pub fn test_app_config() -> AppConfig {
    AppConfig::load_from_str(TEST_CONFIG).unwrap()
}

pub fn topic(device_id: &str, variable: &str) -> String {
    format!("{}/{}/{}/sdata", USER, device_id, variable)
}

pub fn msg(device_id: &str, variable: &str, value: Option<TelemetryValue>) -> TelemetryMessage {
    TelemetryMessage::new(device_id, variable, value, topic(device_id, variable))
}

pub fn int(device_id: &str, variable: &str, v: i64) -> TelemetryMessage {
    msg(device_id, variable, Some(TelemetryValue::Int(v)))
}

pub fn point(time: i64, variable: Variable, value: f64) -> SeriesPoint {
    SeriesPoint::new(time, variable, value)
}
