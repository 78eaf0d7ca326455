// Sensor/actuator channel names

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Firmware channel code that reports air temperature.
pub const TEMP_CODE: &str = "OHFEn7XH3K";

/// Column name taken by the row timestamp in aligned output.
pub const TIME_COLUMN: &str = "time";

/// Semantic channel. Unknown codes pass through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    Temp,
    Hum,
    SoilHum,
    Light,
    Other(String),
}

impl Variable {
    /// Parse a semantic short name (`temp`, `hum`, `soilhum`, `light`); anything else is `Other`.
    pub fn from_name(s: &str) -> Self {
        match s {
            "temp" => Variable::Temp,
            "hum" => Variable::Hum,
            "soilhum" => Variable::SoilHum,
            "light" => Variable::Light,
            other => Variable::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Variable::Temp => "temp",
            Variable::Hum => "hum",
            Variable::SoilHum => "soilhum",
            Variable::Light => "light",
            Variable::Other(s) => s,
        }
    }

    /// True for names that cannot be a column next to `time` in an aligned row.
    pub fn is_reserved(&self) -> bool {
        self.as_str() == TIME_COLUMN
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Variable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Variable::from_name(&s))
    }
}

/// Raw channel code -> semantic variable. Total: unmapped codes resolve to `Variable::Other(code)`.
#[derive(Debug, Clone)]
pub struct VariableMap {
    codes: HashMap<String, Variable>,
}

impl Default for VariableMap {
    fn default() -> Self {
        let mut codes = HashMap::new();
        codes.insert(TEMP_CODE.to_string(), Variable::Temp);
        Self { codes }
    }
}

impl VariableMap {
    /// Built-in codes plus `extra` (code -> short name); `extra` wins on conflict.
    pub fn with_codes(extra: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (code, name) in extra {
            map.codes.insert(code.clone(), Variable::from_name(name));
        }
        map
    }

    pub fn resolve(&self, code: &str) -> Variable {
        match self.codes.get(code) {
            Some(v) => v.clone(),
            None => Variable::from_name(code),
        }
    }
}
