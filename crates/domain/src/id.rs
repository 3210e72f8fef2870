//! Device identifiers and wireless addresses.
//!
//! Cloud-side device identifiers are 8-byte hex strings that arrive both
//! colon-delimited (`AB:CD:12:34:AB:CD:12:34`) and bare (`abcd1234abcd1234`).
//! Both forms normalise to the uppercase colon-delimited form so that a
//! single device is never registered twice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable identifier of a physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse and normalise a raw device identifier.
    ///
    /// Bare hex identifiers get a colon inserted between every pair of
    /// alphanumeric characters. Add-on suffixes such as `_1` are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceId`] for blank input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if raw.contains(':') {
            return Ok(Self(raw.to_ascii_uppercase()));
        }

        let chars: Vec<char> = raw.chars().collect();
        let mut out = String::with_capacity(chars.len() * 3 / 2);
        let mut i = 0;
        while i < chars.len() {
            let pair = chars[i].is_ascii_alphanumeric()
                && chars.get(i + 1).is_some_and(char::is_ascii_alphanumeric)
                && chars.get(i + 2).is_some_and(char::is_ascii_alphanumeric);
            if pair {
                out.push(chars[i]);
                out.push(chars[i + 1]);
                out.push(':');
                i += 2;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        Ok(Self(out.to_ascii_uppercase()))
    }

    /// Borrow the normalised identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// A 6-byte wireless (BLE) hardware address.
///
/// Displayed lowercase and colon-delimited (`a4:c1:38:5b:0e:df`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BleAddress([u8; 6]);

impl BleAddress {
    /// Wrap raw address bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes, most significant first.
    #[must_use]
    pub fn into_inner(self) -> [u8; 6] {
        self.0
    }

    /// Parse an address written with `:` or `-` separators, or none at all.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] unless the input contains
    /// exactly twelve hex digits.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
            .collect();
        let decoded = hex::decode(&digits)
            .map_err(|_| ValidationError::InvalidAddress(raw.to_string()))?;
        let bytes: [u8; 6] = decoded
            .try_into()
            .map_err(|_| ValidationError::InvalidAddress(raw.to_string()))?;
        Ok(Self(bytes))
    }

    /// Derive the wireless address from an 8-byte device identifier.
    ///
    /// The last six octets of the identifier are the radio address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] when the identifier is too
    /// short to contain an address.
    pub fn from_device_id(id: &DeviceId) -> Result<Self, ValidationError> {
        let tail = id
            .as_str()
            .get(6..)
            .ok_or_else(|| ValidationError::InvalidAddress(id.to_string()))?;
        let tail = tail.split('_').next().unwrap_or(tail);
        Self::parse(tail)
    }
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for BleAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BleAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BleAddress> for String {
    fn from(addr: BleAddress) -> Self {
        addr.to_string()
    }
}
