use oob_state_collector::BatteryReading;
use rand::Rng;

/// A simulated battery that drains while discharging and fills while charging.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub host: u16,
    soc: f64,
    charging: bool,
}

impl SimulatedDevice {
    pub fn new(host: u16, rng: &mut impl Rng) -> Self {
        Self {
            host,
            soc: rng.gen_range(20.0..100.0),
            charging: rng.gen_bool(0.5),
        }
    }

    /// Advances the battery by one tick and returns the reading to send.
    pub fn tick(&mut self, rng: &mut impl Rng) -> BatteryReading {
        if self.charging {
            self.soc += rng.gen_range(0.5..2.0);
        } else {
            self.soc -= rng.gen_range(0.1..1.0);
        }

        if self.soc >= 100.0 {
            self.soc = 100.0;
            self.charging = false;
        } else if self.soc <= 5.0 {
            self.charging = true;
        }

        let temperature = if rng.gen_bool(0.02) {
            rng.gen_range(-40..=85) // 2% sensor outliers
        } else {
            rng.gen_range(10..=35)
        };

        BatteryReading {
            host: self.host,
            soc: self.soc.round().clamp(0.0, 255.0) as u8,
            charging: self.charging,
            temperature,
        }
    }
}
