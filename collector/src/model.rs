use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity a device is tracked under: sender IP plus the host identifier
/// carried in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub ip: IpAddr,
    pub host: u16,
}

impl DeviceKey {
    /// IPv4-mapped IPv6 addresses are folded back to IPv4 so dual-stack
    /// sockets key devices the same way as IPv4 sockets.
    pub fn new(ip: IpAddr, host: u16) -> Self {
        Self {
            ip: ip.to_canonical(),
            host,
        }
    }
}

/// A decoded battery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReport {
    pub soc: u8,
    pub charging: bool,
    pub temperature: i8,
    /// Collector receipt time, never device supplied.
    pub observed_at: DateTime<Utc>,
}

/// What the table stores per device. Always replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub soc: u8,
    pub charging: bool,
    pub temperature: i8,
    pub last_contact: DateTime<Utc>,
}

impl From<DeviceReport> for DeviceState {
    fn from(report: DeviceReport) -> Self {
        Self {
            soc: report.soc,
            charging: report.charging,
            temperature: report.temperature,
            last_contact: report.observed_at,
        }
    }
}

/// JSON view of one tracked device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub ip: String,
    pub host: u16,
    pub soc: u8,
    pub charging: bool,
    pub temperature: i8,
    pub last_contact: DateTime<Utc>,
    pub age_seconds: i64,
}

impl DeviceView {
    pub fn new(key: &DeviceKey, state: &DeviceState, now: DateTime<Utc>) -> Self {
        Self {
            ip: key.ip.to_string(),
            host: key.host,
            soc: state.soc,
            charging: state.charging,
            temperature: state.temperature,
            last_contact: state.last_contact,
            age_seconds: (now - state.last_contact).num_seconds().max(0),
        }
    }
}

/// REST API response wrapper
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub data: Vec<DeviceView>,
    pub total: usize,
}
