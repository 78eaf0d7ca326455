// Real-time telemetry models: raw values, reconciled entries, device liveness, stream events

use serde::{Deserialize, Serialize};

/// Payload value as published by the firmware. Stored as received; no coercion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl TelemetryValue {
    /// Numeric view used by charts (`true` = 1.0, `false` = 0.0).
    pub fn as_f64(&self) -> f64 {
        match *self {
            TelemetryValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            TelemetryValue::Int(i) => i as f64,
            TelemetryValue::Float(f) => f,
        }
    }

    /// Integral view: ints as-is, floats only when they carry no fraction. Bools are not integers.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            TelemetryValue::Bool(_) => None,
            TelemetryValue::Int(i) => Some(i),
            TelemetryValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
            TelemetryValue::Float(_) => None,
        }
    }
}

/// Body of an `sdata` publish: `{"value": ...}`. A null or missing value is kept as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdataPayload {
    #[serde(default)]
    pub value: Option<TelemetryValue>,
}

/// One inbound real-time update, after topic parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    pub device_id: String,
    pub variable: String,
    pub value: Option<TelemetryValue>,
    pub topic: String,
}

impl TelemetryMessage {
    pub fn new(
        device_id: impl Into<String>,
        variable: impl Into<String>,
        value: Option<TelemetryValue>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            variable: variable.into(),
            value,
            topic: topic.into(),
        }
    }
}

/// Latest known value for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEntry {
    pub device_id: String,
    pub variable: String,
    pub value: TelemetryValue,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: String,
    pub online: bool,
    /// Epoch ms of the last accepted message from this device.
    pub last_seen_ms: i64,
}

/// What `/ws/telemetry` clients receive after the initial snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TelemetryEvent {
    Entry { entry: TelemetryEntry },
    Status { status: DeviceStatus },
}
