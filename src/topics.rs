// Topic layout: {userId}/{deviceId}/{variable}/{kind}

use crate::error::{AppError, TopicError};
use crate::models::{SdataPayload, TelemetryMessage};

pub const SDATA: &str = "sdata";
pub const NOTIF: &str = "notif";
pub const ACTDATA: &str = "actdata";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicKind {
    /// Sensor/actuator state reported by the device.
    Sdata,
    Notif,
    /// Command sent to the device.
    Actdata,
    Other(String),
}

impl TopicKind {
    fn parse(s: &str) -> Self {
        match s {
            SDATA => TopicKind::Sdata,
            NOTIF => TopicKind::Notif,
            ACTDATA => TopicKind::Actdata,
            other => TopicKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic<'a> {
    pub user_id: &'a str,
    pub device_id: &'a str,
    pub variable: &'a str,
    pub kind: TopicKind,
}

pub fn parse(topic: &str) -> Result<Topic<'_>, TopicError> {
    let parts: Vec<&str> = topic.split('/').collect();
    let [user_id, device_id, variable, kind] = parts[..] else {
        return Err(TopicError::Malformed(topic.to_string()));
    };
    for (segment, value) in [
        ("user", user_id),
        ("device", device_id),
        ("variable", variable),
        ("kind", kind),
    ] {
        if value.is_empty() {
            return Err(TopicError::EmptySegment {
                topic: topic.to_string(),
                segment,
            });
        }
    }
    Ok(Topic {
        user_id,
        device_id,
        variable,
        kind: TopicKind::parse(kind),
    })
}

/// Subscription filter for every device/variable state topic of a user.
pub fn sdata_filter(user_id: &str) -> String {
    format!("{}/+/+/{}", user_id, SDATA)
}

pub fn sdata_topic(user_id: &str, device_id: &str, variable: &str) -> String {
    format!("{}/{}/{}/{}", user_id, device_id, variable, SDATA)
}

pub fn actdata_topic(user_id: &str, device_id: &str, variable: &str) -> String {
    format!("{}/{}/{}/{}", user_id, device_id, variable, ACTDATA)
}

/// Decode an inbound publish. `Ok(None)` for topics that are not `sdata` (notifications etc.).
pub fn decode_sdata(topic: &str, payload: &[u8]) -> Result<Option<TelemetryMessage>, AppError> {
    let parsed = parse(topic)?;
    if parsed.kind != TopicKind::Sdata {
        return Ok(None);
    }
    let body: SdataPayload = serde_json::from_slice(payload)?;
    Ok(Some(TelemetryMessage::new(
        parsed.device_id,
        parsed.variable,
        body.value,
        topic,
    )))
}
