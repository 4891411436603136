use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::model::{DeviceKey, DeviceReport, DeviceState};

/// Live per-device battery state, shared between the datagram listener,
/// the scrape handlers and the expiry sweeper.
///
/// Every operation takes the single table lock exactly once, so operations
/// compose without deadlock and records are never observed half-written.
#[derive(Debug, Default)]
pub struct MetricsTable {
    devices: RwLock<HashMap<DeviceKey, DeviceState>>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the state for `key` with `report`. Arrival order wins, even
    /// when the later arrival carries an older receipt time.
    pub fn upsert(&self, key: DeviceKey, report: DeviceReport) {
        self.devices.write().insert(key, DeviceState::from(report));
    }

    /// Point-in-time copy of every tracked device.
    pub fn snapshot(&self) -> Vec<(DeviceKey, DeviceState)> {
        self.devices
            .read()
            .iter()
            .map(|(key, state)| (*key, *state))
            .collect()
    }

    pub fn get(&self, key: &DeviceKey) -> Option<DeviceState> {
        self.devices.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Drops every device not heard from within `max_age`. Returns how many
    /// were removed.
    pub fn sweep_expired(&self, max_age: Duration) -> usize {
        self.sweep_expired_at(Utc::now(), max_age)
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        // A horizon reaching past the representable past expires nothing.
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return 0;
        };
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|_, state| state.last_contact >= cutoff);
        before - devices.len()
    }
}
