//! Inbound state updates.
//!
//! A [`RawUpdate`] is whatever a transport pushed, deserialised leniently
//! from its JSON shape. A [`ReconciledUpdate`] is the canonical, sparse diff
//! handed to device handlers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{PowerState, Rgb};
use crate::time::Timestamp;

/// Transport an update arrived on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    #[default]
    Cloud,
    Lan,
    Wireless,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cloud => "cloud",
            Self::Lan => "lan",
            Self::Wireless => "wireless",
        })
    }
}

/// `state` block of a cloud or LAN status message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawState {
    pub on_off: Option<u8>,
    pub brightness: Option<f64>,
    pub color: Option<Rgb>,
    pub color_tem_in_kelvin: Option<u32>,
    pub sta: Option<RawSta>,
}

/// Appliance status block (`state.sta`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSta {
    pub cur_tem: Option<f64>,
    pub set_tem: Option<f64>,
}

/// Legacy `data` block used by older devices instead of `state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawData {
    pub turn: Option<u8>,
    pub brightness: Option<f64>,
    pub op: Option<String>,
    pub value: Option<Value>,
}

/// `op` block carrying scene or mode commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawOp {
    pub command: Option<Vec<String>>,
    pub mode: Option<Value>,
    pub value: Option<Value>,
    pub opcode: Option<String>,
    pub mode_value: Option<Value>,
}

/// An inbound update as pushed by a transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUpdate {
    #[serde(skip)]
    pub source: UpdateSource,
    pub device: Option<String>,
    pub sku: Option<String>,
    pub state: Option<RawState>,
    pub data: Option<RawData>,
    pub battery: Option<f64>,
    pub leak_detected: Option<bool>,
    pub temperature: Option<f64>,
    #[serde(rename = "temperatureF")]
    pub temperature_f: Option<f64>,
    pub humidity: Option<f64>,
    pub online: Option<bool>,
    pub commands: Option<Vec<String>>,
    pub op: Option<RawOp>,
    pub bulb: Option<Vec<String>>,
}

impl RawUpdate {
    /// An empty update from `source`.
    #[must_use]
    pub fn new(source: UpdateSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Deserialise a JSON message pushed by `source`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when a known field has the wrong type.
    pub fn from_json(source: UpdateSource, value: Value) -> Result<Self, serde_json::Error> {
        let mut update: Self = serde_json::from_value(value)?;
        update.source = source;
        Ok(update)
    }
}

/// Power as reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PowerReading {
    Single(PowerState),
    /// Dual switches: first and second outlet.
    Dual(PowerState, PowerState),
}

/// Where a reconciled `commands` list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseCmd {
    /// Top-level `commands`.
    None,
    /// `op.command`
    Op,
    /// `op.mode` with `op.value`, or legacy `data.op == "mode"`.
    OpMode,
    /// `op.opcode == "mode"` with `op.modeValue`.
    OpCodeMode,
    /// `bulb`
    Bulb,
}

/// Canonical, sparse state diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledUpdate {
    pub source: UpdateSource,
    pub received_at: Timestamp,
    pub power: Option<PowerReading>,
    pub brightness: Option<u8>,
    pub rgb: Option<Rgb>,
    pub kelvin: Option<u16>,
    /// Kelvin as reported when it was implausibly high; `kelvin` holds the
    /// clamped value. Not counted as a state field.
    pub kelvin_anomaly: Option<u32>,
    pub battery: Option<u8>,
    pub leak_detected: Option<bool>,
    pub temperature: Option<f64>,
    pub temperature_f: Option<f64>,
    pub set_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub online: Option<bool>,
    pub commands: Option<Vec<String>>,
    pub base_cmd: Option<BaseCmd>,
}

impl ReconciledUpdate {
    /// An empty diff tagged with its source.
    #[must_use]
    pub fn new(source: UpdateSource, received_at: Timestamp) -> Self {
        Self {
            source,
            received_at,
            power: None,
            brightness: None,
            rgb: None,
            kelvin: None,
            kelvin_anomaly: None,
            battery: None,
            leak_detected: None,
            temperature: None,
            temperature_f: None,
            set_temperature: None,
            humidity: None,
            online: None,
            commands: None,
            base_cmd: None,
        }
    }

    /// Number of populated state fields, not counting the source tag.
    #[must_use]
    pub fn populated(&self) -> usize {
        [
            self.power.is_some(),
            self.brightness.is_some(),
            self.rgb.is_some(),
            self.kelvin.is_some(),
            self.battery.is_some(),
            self.leak_detected.is_some(),
            self.temperature.is_some(),
            self.temperature_f.is_some(),
            self.set_temperature.is_some(),
            self.humidity.is_some(),
            self.online.is_some(),
            self.commands.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }
}
