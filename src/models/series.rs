// Historical series models: input points and aligned chart rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{TelemetryValue, Variable, VariableMap};

/// One historical sample for one variable. `time` is epoch ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub time: i64,
    pub variable: Variable,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(time: i64, variable: Variable, value: f64) -> Self {
        Self {
            time,
            variable,
            value,
        }
    }
}

/// Timestamp as the history endpoint sends it: epoch ms or an RFC 3339 string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesTime {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
}

impl SeriesTime {
    pub fn to_millis(&self) -> Result<i64, String> {
        match self {
            SeriesTime::Millis(ms) => Ok(*ms),
            SeriesTime::FractionalMillis(ms) if ms.is_finite() => Ok(*ms as i64),
            SeriesTime::FractionalMillis(ms) => Err(format!("non-finite time {}", ms)),
            SeriesTime::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| format!("invalid time {:?}: {}", s, e)),
        }
    }
}

/// A point as received from the history endpoint, before the channel code is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeriesPoint {
    pub time: SeriesTime,
    pub value: TelemetryValue,
    pub variable: String,
}

impl RawSeriesPoint {
    pub fn resolve(&self, variables: &VariableMap) -> Result<SeriesPoint, String> {
        let variable = variables.resolve(&self.variable);
        if variable.is_reserved() {
            return Err(format!(
                "variable {:?} collides with the row time column",
                self.variable
            ));
        }
        Ok(SeriesPoint {
            time: self.time.to_millis()?,
            variable,
            value: self.value.as_f64(),
        })
    }
}

/// One row of the merged chart dataset; serializes flat, e.g. `{"time":1000,"temp":20.0,"light":1.0}`.
/// No field may be named `time` (see `Variable::is_reserved`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    pub time: i64,
    #[serde(flatten)]
    pub fields: BTreeMap<Variable, f64>,
}

impl AlignedRow {
    pub fn new(time: i64) -> Self {
        Self {
            time,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, variable: &Variable) -> Option<f64> {
        self.fields.get(variable).copied()
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.fields.insert(variable, value);
    }
}
