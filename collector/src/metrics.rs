use lazy_static::lazy_static;
use prometheus::{Encoder, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use crate::errors::Result;
use crate::model::{DeviceKey, DeviceState};

/// Labels carried by every per-device gauge.
pub const DEVICE_LABELS: [&str; 2] = ["ip", "host"];

lazy_static! {
    pub static ref DATAGRAMS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "oob_collector_datagrams_total",
        "Total datagrams received on the report socket"
    ))
    .unwrap();
    pub static ref REJECTED_DATAGRAMS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "oob_collector_rejected_datagrams_total",
        "Total datagrams dropped because they failed to decode"
    ))
    .unwrap();
    pub static ref EXPIRED_DEVICES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "oob_collector_expired_devices_total",
        "Total devices removed by the expiry sweep"
    ))
    .unwrap();
    pub static ref TRACKED_DEVICES: IntGauge = IntGauge::with_opts(Opts::new(
        "oob_collector_tracked_devices",
        "Devices currently tracked"
    ))
    .unwrap();
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry.register(Box::new(DATAGRAMS_TOTAL.clone())).unwrap();
        registry
            .register(Box::new(REJECTED_DATAGRAMS_TOTAL.clone()))
            .unwrap();
        registry
            .register(Box::new(EXPIRED_DEVICES_TOTAL.clone()))
            .unwrap();
        registry.register(Box::new(TRACKED_DEVICES.clone())).unwrap();
        registry
    };
}

/// Per-scrape gauges. Built fresh for every request so that rendering
/// only reads the table.
struct DeviceGauges {
    registry: Registry,
    soc: GaugeVec,
    charging: GaugeVec,
    temperature: GaugeVec,
    last_contact: GaugeVec,
}

impl DeviceGauges {
    fn new() -> Result<Self> {
        let registry = Registry::new();
        let soc = GaugeVec::new(Opts::new("soc", "State of charge"), &DEVICE_LABELS)?;
        let charging = GaugeVec::new(Opts::new("charging", "Charging status"), &DEVICE_LABELS)?;
        let temperature = GaugeVec::new(
            Opts::new("temperature", "Temperature in celsius"),
            &DEVICE_LABELS,
        )?;
        let last_contact =
            GaugeVec::new(Opts::new("last_contact", "Last contact"), &DEVICE_LABELS)?;

        registry.register(Box::new(soc.clone()))?;
        registry.register(Box::new(charging.clone()))?;
        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(last_contact.clone()))?;

        Ok(Self {
            registry,
            soc,
            charging,
            temperature,
            last_contact,
        })
    }

    fn record(&self, key: &DeviceKey, state: &DeviceState) {
        let ip = key.ip.to_string();
        let host = key.host.to_string();
        let labels = [ip.as_str(), host.as_str()];

        self.soc.with_label_values(&labels).set(f64::from(state.soc));
        self.charging
            .with_label_values(&labels)
            .set(if state.charging { 1.0 } else { 0.0 });
        self.temperature
            .with_label_values(&labels)
            .set(f64::from(state.temperature));
        self.last_contact
            .with_label_values(&labels)
            .set(state.last_contact.timestamp_millis() as f64 / 1000.0);
    }
}

/// Renders a table snapshot, followed by the collector's own counters, in
/// the Prometheus text exposition format.
pub fn render(snapshot: &[(DeviceKey, DeviceState)]) -> Result<String> {
    let gauges = DeviceGauges::new()?;
    for (key, state) in snapshot {
        gauges.record(key, state);
    }
    TRACKED_DEVICES.set(snapshot.len() as i64);

    let mut metric_families = gauges.registry.gather();
    metric_families.extend(REGISTRY.gather());

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
