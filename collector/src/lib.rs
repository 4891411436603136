//! Out-of-band battery state collector.
//!
//! Devices send small fixed-format UDP reports; the collector keeps the
//! latest report per device in a [`MetricsTable`], expires devices that stop
//! reporting, and serves the table for Prometheus to scrape.

pub mod collector;
pub mod config;
pub mod errors;
pub mod listener;
pub mod metrics;
pub mod model;
pub mod protocol;
pub mod rest;
pub mod sweeper;
pub mod table;

pub use collector::{start, Collector, CollectorHandle};
pub use config::{Args, CollectorConfig};
pub use errors::{Error, Result};
pub use model::{DeviceKey, DeviceReport, DeviceState};
pub use protocol::{decode, BatteryReading, DecodeError};
pub use table::MetricsTable;
