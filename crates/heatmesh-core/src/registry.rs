use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::wire::SampleReading;

/// Latest validated reading for one device. `last_seen` is monotonic and
/// drives staleness; `received_at` is wall clock for display only.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub latest: SampleReading,
    pub last_seen: Instant,
    pub received_at: DateTime<Utc>,
    pub updates: u64,
}

/// Process-lifetime store of device readings. Records are only ever
/// overwritten, never merged or removed, so memory is bounded by the number
/// of distinct device ids seen.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceRecord>,
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub device_id: String,
    pub reading: SampleReading,
    pub fresh: bool,
    pub age: Duration,
    pub received_at: DateTime<Utc>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    /// Last write wins, whole record. A reading only reaches this point
    /// after classification, so a bad wire message can never land here.
    pub fn upsert(&mut self, reading: SampleReading, seen_at: Instant) {
        let received_at = Utc::now();
        match self.devices.entry(reading.device_id.clone()) {
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                record.latest = reading;
                record.last_seen = seen_at;
                record.received_at = received_at;
                record.updates += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(DeviceRecord {
                    latest: reading,
                    last_seen: seen_at,
                    received_at,
                    updates: 1,
                });
            }
        }
    }

    /// Every stored device, sorted by id, with freshness derived against
    /// `ttl`. Stale entries stay in the output; the caller decides what a
    /// stale reading is still good for.
    pub fn snapshot(&self, now: Instant, ttl: Duration) -> Vec<SnapshotEntry> {
        let mut entries = self
            .devices
            .iter()
            .map(|(device_id, record)| {
                let age = now.duration_since(record.last_seen);
                SnapshotEntry {
                    device_id: device_id.clone(),
                    reading: record.latest.clone(),
                    fresh: age <= ttl,
                    age,
                    received_at: record.received_at,
                }
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        entries
    }
}
