//! Wire format of the out-of-band battery report.
//!
//! ```text
//! offset  0        1..3          3      4            5
//!         version  host (u16 BE) soc u8 bit0 charging temperature i8
//! ```
//!
//! Only version 1 exists. Trailing bytes after offset 5 are ignored.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{DeviceKey, DeviceReport};

pub const PROTOCOL_VERSION: u8 = 1;

/// Length of a version 1 report, version byte included.
pub const REPORT_LEN: usize = 6;

/// Receive buffer size, large enough for any UDP payload.
pub const MAX_DATAGRAM: usize = 65_536;

const CHARGING_BIT: u8 = 0b0000_0001;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Datagram too short ({len} bytes, need {expected})")]
    TooShort { len: usize, expected: usize },

    #[error("Unsupported protocol version {0} (supported: {PROTOCOL_VERSION})")]
    UnsupportedVersion(u8),
}

/// Decodes a datagram received from `source`, stamping it with the current time.
pub fn decode(data: &[u8], source: SocketAddr) -> Result<(DeviceKey, DeviceReport), DecodeError> {
    decode_at(data, source, Utc::now())
}

pub fn decode_at(
    data: &[u8],
    source: SocketAddr,
    observed_at: DateTime<Utc>,
) -> Result<(DeviceKey, DeviceReport), DecodeError> {
    let Some(&version) = data.first() else {
        return Err(DecodeError::TooShort {
            len: 0,
            expected: 1,
        });
    };

    if version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    // Devices in the field may send a truncated v1 frame; never index past it.
    if data.len() < REPORT_LEN {
        return Err(DecodeError::TooShort {
            len: data.len(),
            expected: REPORT_LEN,
        });
    }

    let host = u16::from_be_bytes([data[1], data[2]]);
    let report = DeviceReport {
        soc: data[3],
        charging: data[4] & CHARGING_BIT != 0,
        temperature: i8::from_be_bytes([data[5]]),
        observed_at,
    };

    Ok((DeviceKey::new(source.ip(), host), report))
}

/// A single reading as a device would send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub host: u16,
    pub soc: u8,
    pub charging: bool,
    pub temperature: i8,
}

impl BatteryReading {
    /// Encodes the reading as a version 1 datagram.
    pub fn encode(&self) -> [u8; REPORT_LEN] {
        let [host_hi, host_lo] = self.host.to_be_bytes();
        [
            PROTOCOL_VERSION,
            host_hi,
            host_lo,
            self.soc,
            u8::from(self.charging),
            self.temperature.to_be_bytes()[0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn source() -> SocketAddr {
        "192.0.2.7:40000".parse().unwrap()
    }

    #[test]
    fn test_decode_reference_payload() {
        let payload = [0x01, 0x00, 0x2A, 0x50, 0x01, 0xF6];
        let (key, report) = decode(&payload, source()).unwrap();

        assert_eq!(key.host, 42);
        assert_eq!(key.ip, "192.0.2.7".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(report.soc, 80);
        assert!(report.charging);
        assert_eq!(report.temperature, -10);
    }

    #[test]
    fn test_decode_uses_supplied_receipt_time() {
        let now = Utc::now() - chrono::Duration::seconds(42);
        let (_, report) = decode_at(&[1, 0, 1, 2, 0, 3], source(), now).unwrap();
        assert_eq!(report.observed_at, now);
    }

    #[test]
    fn test_empty_payload_is_too_short() {
        assert_eq!(
            decode(&[], source()),
            Err(DecodeError::TooShort {
                len: 0,
                expected: 1
            })
        );
    }

    #[test]
    fn test_truncated_v1_payload_is_too_short() {
        for len in 1..REPORT_LEN {
            let payload = vec![PROTOCOL_VERSION; len];
            assert_eq!(
                decode(&payload, source()),
                Err(DecodeError::TooShort {
                    len,
                    expected: REPORT_LEN
                })
            );
        }
    }

    #[test]
    fn test_unknown_version_rejected_regardless_of_tail() {
        assert_eq!(
            decode(&[0x02], source()),
            Err(DecodeError::UnsupportedVersion(2))
        );
        assert_eq!(
            decode(&[0x00, 0x00, 0x2A, 0x50, 0x01, 0xF6], source()),
            Err(DecodeError::UnsupportedVersion(0))
        );

        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let version: u8 = loop {
                let v = rng.gen();
                if v != PROTOCOL_VERSION {
                    break v;
                }
            };
            let tail_len = rng.gen_range(0..16);
            let mut payload = vec![version];
            payload.extend((0..tail_len).map(|_| rng.gen::<u8>()));

            assert_eq!(
                decode(&payload, source()),
                Err(DecodeError::UnsupportedVersion(version))
            );
        }
    }

    #[test]
    fn test_soc_is_not_clamped() {
        let (_, report) = decode(&[1, 0, 1, 0xFF, 0, 0], source()).unwrap();
        assert_eq!(report.soc, 255);
    }

    #[test]
    fn test_reserved_charging_bits_ignored() {
        let (_, report) = decode(&[1, 0, 1, 50, 0b1111_1110, 20], source()).unwrap();
        assert!(!report.charging);

        let (_, report) = decode(&[1, 0, 1, 50, 0b1000_0001, 20], source()).unwrap();
        assert!(report.charging);
    }

    #[test]
    fn test_temperature_extremes() {
        let (_, cold) = decode(&[1, 0, 1, 50, 0, 0x80], source()).unwrap();
        let (_, hot) = decode(&[1, 0, 1, 50, 0, 0x7F], source()).unwrap();
        assert_eq!(cold.temperature, -128);
        assert_eq!(hot.temperature, 127);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let (key, report) = decode(&[1, 0xFF, 0xFE, 10, 0, 5, 0xAA, 0xBB], source()).unwrap();
        assert_eq!(key.host, 0xFFFE);
        assert_eq!(report.soc, 10);
        assert_eq!(report.temperature, 5);
    }

    #[test]
    fn test_ipv4_mapped_sender_is_canonicalised() {
        let mapped: SocketAddr = "[::ffff:192.0.2.7]:40000".parse().unwrap();
        let (key, _) = decode(&[1, 0, 42, 80, 1, 0xF6], mapped).unwrap();
        assert_eq!(key.ip, source().ip());
    }

    #[test]
    fn test_encode_matches_reference_layout() {
        let reading = BatteryReading {
            host: 42,
            soc: 80,
            charging: true,
            temperature: -10,
        };
        assert_eq!(reading.encode(), [0x01, 0x00, 0x2A, 0x50, 0x01, 0xF6]);
    }
}
