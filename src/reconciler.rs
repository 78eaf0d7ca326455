// Latest-value-per-topic projection of the telemetry stream.
// Entries keep first-seen order; repeats update the value in place.

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    DeviceControlState, DeviceStatus, TelemetryEntry, TelemetryMessage, TelemetryValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First message on this topic; appended.
    Inserted,
    /// Known topic, new value written in place.
    Updated,
    /// Known topic, same value as before.
    Unchanged,
    /// Message had no value; nothing touched.
    Dropped,
}

impl IngestOutcome {
    pub fn changed(self) -> bool {
        matches!(self, IngestOutcome::Inserted | IngestOutcome::Updated)
    }
}

#[derive(Debug, Default)]
pub struct StreamReconciler {
    entries: Vec<TelemetryEntry>,
    by_topic: HashMap<String, usize>,
    /// device_id -> epoch ms of last accepted message
    last_seen: BTreeMap<String, i64>,
}

impl StreamReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one message. Recency is arrival order: whatever arrives last wins.
    pub fn ingest(&mut self, msg: TelemetryMessage, now_ms: i64) -> IngestOutcome {
        let Some(value) = msg.value else {
            return IngestOutcome::Dropped;
        };
        self.last_seen.insert(msg.device_id.clone(), now_ms);

        if let Some(&idx) = self.by_topic.get(&msg.topic) {
            let entry = &mut self.entries[idx];
            if entry.value == value {
                return IngestOutcome::Unchanged;
            }
            entry.value = value;
            return IngestOutcome::Updated;
        }

        self.by_topic.insert(msg.topic.clone(), self.entries.len());
        self.entries.push(TelemetryEntry {
            device_id: msg.device_id,
            variable: msg.variable,
            value,
            topic: msg.topic,
        });
        IngestOutcome::Inserted
    }

    pub fn entries(&self) -> &[TelemetryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, topic: &str) -> Option<&TelemetryEntry> {
        self.by_topic.get(topic).map(|&idx| &self.entries[idx])
    }

    pub fn query_by_device_and_variable(
        &self,
        device_id: &str,
        variable: &str,
    ) -> Option<&TelemetryValue> {
        self.entries
            .iter()
            .find(|e| e.device_id == device_id && e.variable == variable)
            .map(|e| &e.value)
    }

    pub fn query_by_device(&self, device_id: &str) -> Vec<&TelemetryEntry> {
        self.entries
            .iter()
            .filter(|e| e.device_id == device_id)
            .collect()
    }

    pub fn control_state(&self, device_id: &str, variable: &str) -> Option<DeviceControlState> {
        self.query_by_device_and_variable(device_id, variable)
            .map(|v| DeviceControlState::from_value(*v))
    }

    pub fn last_seen(&self, device_id: &str) -> Option<i64> {
        self.last_seen.get(device_id).copied()
    }

    pub fn device_count(&self) -> usize {
        self.last_seen.len()
    }

    /// Online iff the device produced an accepted message within `stale_after_ms` of `now_ms`.
    pub fn device_status(
        &self,
        device_id: &str,
        now_ms: i64,
        stale_after_ms: i64,
    ) -> Option<DeviceStatus> {
        self.last_seen
            .get_key_value(device_id)
            .map(|(id, &seen)| status(id, seen, now_ms, stale_after_ms))
    }

    /// All known devices, ordered by id.
    pub fn device_statuses(&self, now_ms: i64, stale_after_ms: i64) -> Vec<DeviceStatus> {
        self.last_seen
            .iter()
            .map(|(id, &seen)| status(id, seen, now_ms, stale_after_ms))
            .collect()
    }

    /// Drop all state (session teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_topic.clear();
        self.last_seen.clear();
    }
}

fn status(device_id: &str, last_seen_ms: i64, now_ms: i64, stale_after_ms: i64) -> DeviceStatus {
    DeviceStatus {
        device_id: device_id.to_string(),
        online: now_ms.saturating_sub(last_seen_ms) <= stale_after_ms,
        last_seen_ms,
    }
}
