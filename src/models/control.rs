// Actuator control modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{SdataPayload, TelemetryValue};

/// UI-level category of an actuator's coded mode; serializes lowercase (e.g. "timers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Off,
    On,
    Timers,
    Cycles,
}

impl ControlMode {
    pub const ALL: [ControlMode; 4] = [
        ControlMode::Off,
        ControlMode::On,
        ControlMode::Timers,
        ControlMode::Cycles,
    ];

    /// Map a firmware code: `false|0` off, `true|1` on, `2|3` timers, `4|5` cycles. Anything else is unmapped.
    pub fn from_value(value: &TelemetryValue) -> Option<Self> {
        if let TelemetryValue::Bool(b) = value {
            return Some(if *b { ControlMode::On } else { ControlMode::Off });
        }
        match value.as_integer()? {
            0 => Some(ControlMode::Off),
            1 => Some(ControlMode::On),
            2 | 3 => Some(ControlMode::Timers),
            4 | 5 => Some(ControlMode::Cycles),
            _ => None,
        }
    }

    /// Code published on `actdata` when the user selects this mode.
    pub fn code(self) -> i64 {
        match self {
            ControlMode::Off => 0,
            ControlMode::On => 1,
            ControlMode::Timers => 3,
            ControlMode::Cycles => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Off => "off",
            ControlMode::On => "on",
            ControlMode::Timers => "timers",
            ControlMode::Cycles => "cycles",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(ControlMode::Off),
            "on" => Ok(ControlMode::On),
            "timers" => Ok(ControlMode::Timers),
            "cycles" => Ok(ControlMode::Cycles),
            other => Err(format!("unknown control mode: {}", other)),
        }
    }
}

/// Actuator state as shown in the UI: mapped category (None when unmapped) plus the raw value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceControlState {
    pub mode: Option<ControlMode>,
    pub raw: TelemetryValue,
}

impl DeviceControlState {
    pub fn from_value(raw: TelemetryValue) -> Self {
        Self {
            mode: ControlMode::from_value(&raw),
            raw,
        }
    }
}

/// Mode change requested by a user, addressed to `{userId}/{deviceId}/{variable}/actdata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub topic: String,
    pub mode: ControlMode,
    pub value: i64,
}

impl ActuatorCommand {
    pub fn new(topic: impl Into<String>, mode: ControlMode) -> Self {
        Self {
            topic: topic.into(),
            mode,
            value: mode.code(),
        }
    }

    /// Wire body: `{"value": <code>}`.
    pub fn payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&SdataPayload {
            value: Some(TelemetryValue::Int(self.value)),
        })
    }
}
