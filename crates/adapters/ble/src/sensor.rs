//! Thermo-hygrometer advertisement decoders.
//!
//! Pure functions over the manufacturer data of one advertisement. Formats
//! are told apart by company id and length:
//!
//! | Company | Length | Models | Layout |
//! |---------|--------|--------|--------|
//! | `0xEC88` | 6 | H5072, H5075, H5101… | `00 tt tt tt bb 00`, packed temperature and humidity |
//! | `0xEC88` | 7 | H5074 | `00 TT TT HH HH bb 02`, little-endian hundredths |
//! | `0x0001` | 9 | H5179 | `.. .. .. .. TT TT HH HH bb`, little-endian hundredths |

use hearthlink_domain::update::{RawUpdate, UpdateSource};
use uuid::Uuid;

use crate::error::PayloadParseError;

/// Company id advertised by the H507x family.
pub const COMPANY_H507X: u16 = 0xEC88;
/// Company id advertised by the H5179.
pub const COMPANY_H5179: u16 = 0x0001;

const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Service UUIDs a scan is narrowed to: the 16-bit sensor signatures
/// expanded onto the Bluetooth base UUID.
#[must_use]
pub fn scan_services() -> Vec<Uuid> {
    [COMPANY_H507X, COMPANY_H5179]
        .into_iter()
        .map(|id| Uuid::from_u128(BLUETOOTH_BASE_UUID | (u128::from(id) << 96)))
        .collect()
}

const PACKED_LEN: usize = 6;
const H5074_LEN: usize = 7;
const H5179_LEN: usize = 9;

/// One decoded sensor advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Battery level (0–100 %).
    pub battery: u8,
}

impl SensorReading {
    #[must_use]
    pub fn temperature_f(&self) -> f64 {
        self.temperature * 9.0 / 5.0 + 32.0
    }

    /// Raw update in the shape the reconciler expects from the wireless
    /// transport: temperatures and humidity in hundredths.
    #[must_use]
    pub fn into_raw_update(self) -> RawUpdate {
        let mut raw = RawUpdate::new(UpdateSource::Wireless);
        raw.temperature = Some((self.temperature * 100.0).round());
        raw.temperature_f = Some((self.temperature_f() * 100.0).round());
        raw.humidity = Some((self.humidity * 100.0).round());
        raw.battery = Some(f64::from(self.battery));
        raw
    }
}

/// Decode the manufacturer data advertised under `company`.
///
/// # Errors
///
/// Returns [`PayloadParseError`] when the company or length is unknown.
pub fn decode(company: u16, data: &[u8]) -> Result<SensorReading, PayloadParseError> {
    match (company, data.len()) {
        (COMPANY_H507X, PACKED_LEN) => Ok(decode_packed(data)),
        (COMPANY_H507X, H5074_LEN) => Ok(decode_le(&data[1..5], data[5])),
        (COMPANY_H5179, H5179_LEN) => Ok(decode_le(&data[4..8], data[8])),
        (COMPANY_H507X | COMPANY_H5179, actual) => Err(PayloadParseError::UnexpectedLength {
            manufacturer: company,
            actual,
        }),
        (other, _) => Err(PayloadParseError::UnknownManufacturer(other)),
    }
}

/// Three big-endian bytes: `temperature * 10000 + humidity * 10`, with the
/// top bit as the temperature sign.
fn decode_packed(data: &[u8]) -> SensorReading {
    let packed = u32::from_be_bytes([0, data[1], data[2], data[3]]);
    let negative = packed & 0x80_0000 != 0;
    let value = packed & 0x7F_FFFF;

    let temperature = f64::from(value / 1000) / 10.0;
    SensorReading {
        temperature: if negative { -temperature } else { temperature },
        humidity: f64::from(value % 1000) / 10.0,
        battery: data[4].min(100),
    }
}

/// Little-endian `i16` temperature and `u16` humidity, both in hundredths.
fn decode_le(values: &[u8], battery: u8) -> SensorReading {
    let temperature = i16::from_le_bytes([values[0], values[1]]);
    let humidity = u16::from_le_bytes([values[2], values[3]]);
    SensorReading {
        temperature: f64::from(temperature) / 100.0,
        humidity: f64::from(humidity) / 100.0,
        battery: battery.min(100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expand_sensor_signatures_to_service_uuids() {
        let services: Vec<String> = scan_services().iter().map(ToString::to_string).collect();
        assert_eq!(
            services,
            vec![
                "0000ec88-0000-1000-8000-00805f9b34fb".to_string(),
                "00000001-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
    }

    #[test]
    fn should_decode_packed_format() {
        let reading = decode(COMPANY_H507X, &[0x00, 0x03, 0x94, 0x47, 0x5A, 0x00]).unwrap();
        assert!((reading.temperature - 23.4).abs() < 1e-9);
        assert!((reading.humidity - 56.7).abs() < 1e-9);
        assert_eq!(reading.battery, 90);
    }

    #[test]
    fn should_decode_negative_packed_temperature() {
        // -5.2 °C, 40.1 %
        let value: u32 = 52_401 | 0x80_0000;
        let bytes = value.to_be_bytes();
        let data = [0x00, bytes[1], bytes[2], bytes[3], 0x40, 0x00];
        let reading = decode(COMPANY_H507X, &data).unwrap();
        assert!((reading.temperature + 5.2).abs() < 1e-9);
        assert!((reading.humidity - 40.1).abs() < 1e-9);
    }

    #[test]
    fn should_decode_h5074_format() {
        let reading = decode(COMPANY_H507X, &[0x00, 0x29, 0x09, 0xE0, 0x15, 0x64, 0x02]).unwrap();
        assert!((reading.temperature - 23.45).abs() < 1e-9);
        assert!((reading.humidity - 56.0).abs() < 1e-9);
        assert_eq!(reading.battery, 100);
    }

    #[test]
    fn should_decode_h5179_format() {
        let data = [0x01, 0x01, 0x01, 0x01, 0x29, 0x09, 0xE0, 0x15, 0x50];
        let reading = decode(COMPANY_H5179, &data).unwrap();
        assert!((reading.temperature - 23.45).abs() < 1e-9);
        assert_eq!(reading.battery, 80);
    }

    #[test]
    fn should_skip_unknown_manufacturer() {
        assert_eq!(
            decode(0x004C, &[0; 6]),
            Err(PayloadParseError::UnknownManufacturer(0x004C))
        );
    }

    #[test]
    fn should_reject_truncated_payload() {
        assert_eq!(
            decode(COMPANY_H507X, &[0x00, 0x03]),
            Err(PayloadParseError::UnexpectedLength {
                manufacturer: COMPANY_H507X,
                actual: 2
            })
        );
    }

    #[test]
    fn should_build_hundredths_raw_update() {
        let raw = SensorReading {
            temperature: 20.0,
            humidity: 45.5,
            battery: 77,
        }
        .into_raw_update();

        assert_eq!(raw.source, UpdateSource::Wireless);
        assert_eq!(raw.temperature, Some(2000.0));
        assert_eq!(raw.temperature_f, Some(6800.0));
        assert_eq!(raw.humidity, Some(4550.0));
        assert_eq!(raw.battery, Some(77.0));
    }
}
