//! Semantic commands: transport-agnostic descriptions of a device action.
//!
//! Commands arrive as `{ "cmd": <kind>, "value": <value> }` and are parsed
//! once into a [`Command`]. Anything that does not parse is rejected with a
//! [`CommandError`] before any transport is touched.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommandError;

/// Binary on/off state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    #[must_use]
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// An RGB colour triple.
///
/// Deserialises from both `{r,g,b}` and `{red,green,blue}` shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    #[serde(alias = "red")]
    pub r: u8,
    #[serde(alias = "green")]
    pub g: u8,
    #[serde(alias = "blue")]
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A semantic device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Main power.
    State(PowerState),
    /// Dual-switch devices: raw bitmask of both outlets.
    StateDual(u8),
    /// Outlet power.
    StateOutlet(PowerState),
    /// Humidifier power.
    StateHumidifier(bool),
    /// Purifier power.
    StatePurifier(bool),
    /// Heater power (fixed pre-encoded codes).
    StateHeater(bool),
    /// Pre-encoded base64 code sent as `multiSync`.
    MultiSync(String),
    /// Pre-encoded base64 code sent as `ptReal`.
    PtReal(String),
    /// Brightness percentage.
    Brightness(u8),
    /// RGB colour.
    Color(Rgb),
    /// Colour temperature in Kelvin.
    ColorTemperature(u16),
    /// Scene: comma-separated cloud/LAN codes and a single wireless code.
    Scene {
        cloud: Option<String>,
        wireless: Option<String>,
    },
}

impl Command {
    /// Wire name of the command kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::StateDual(_) => "stateDual",
            Self::StateOutlet(_) => "stateOutlet",
            Self::StateHumidifier(_) => "stateHumi",
            Self::StatePurifier(_) => "statePuri",
            Self::StateHeater(_) => "stateHeat",
            Self::MultiSync(_) => "multiSync",
            Self::PtReal(_) => "ptReal",
            Self::Brightness(_) => "brightness",
            Self::Color(_) => "color",
            Self::ColorTemperature(_) => "colorTem",
            Self::Scene { .. } => "rgbScene",
        }
    }

    /// Parse a `{ "cmd": …, "value": … }` request.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownKind`] for unrecognised kinds,
    /// [`CommandError::InvalidValue`] when the value has the wrong shape and
    /// [`CommandError::InvalidCode`] when a pre-encoded code is not base64.
    pub fn from_request(request: &Value) -> Result<Self, CommandError> {
        let kind = request
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                let raw = request.get("cmd").map_or_else(String::new, Value::to_string);
                CommandError::UnknownKind(raw)
            })?;
        let value = request.get("value").unwrap_or(&Value::Null);

        match kind {
            "state" => Ok(Self::State(power_value("state", value)?)),
            "stateDual" => {
                let raw = value
                    .as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .filter(|v| *v <= 3)
                    .ok_or(CommandError::InvalidValue {
                        kind: "stateDual",
                        reason: "expected an integer in 0..=3",
                    })?;
                Ok(Self::StateDual(raw))
            }
            "stateOutlet" => Ok(Self::StateOutlet(power_value("stateOutlet", value)?)),
            "stateHumi" => Ok(Self::StateHumidifier(flag_value("stateHumi", value)?)),
            "statePuri" => Ok(Self::StatePurifier(flag_value("statePuri", value)?)),
            "stateHeat" => Ok(Self::StateHeater(flag_value("stateHeat", value)?)),
            "multiSync" => Ok(Self::MultiSync(code_value("multiSync", value)?)),
            "ptReal" => Ok(Self::PtReal(code_value("ptReal", value)?)),
            "brightness" => {
                let level = value
                    .as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .filter(|v| *v <= 100)
                    .ok_or(CommandError::InvalidValue {
                        kind: "brightness",
                        reason: "expected an integer in 0..=100",
                    })?;
                Ok(Self::Brightness(level))
            }
            "color" => {
                let rgb = Rgb::deserialize(value).map_err(|_| CommandError::InvalidValue {
                    kind: "color",
                    reason: "expected an object with r, g and b",
                })?;
                Ok(Self::Color(rgb))
            }
            "colorTem" => {
                let kelvin = value
                    .as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .filter(|v| *v > 0)
                    .ok_or(CommandError::InvalidValue {
                        kind: "colorTem",
                        reason: "expected a positive Kelvin integer",
                    })?;
                Ok(Self::ColorTemperature(kelvin))
            }
            "rgbScene" => scene_value(value),
            other => Err(CommandError::UnknownKind(other.to_string())),
        }
    }
}

fn power_value(kind: &'static str, value: &Value) -> Result<PowerState, CommandError> {
    match value {
        Value::String(s) if s == "on" => Ok(PowerState::On),
        Value::String(s) if s == "off" => Ok(PowerState::Off),
        Value::Bool(b) => Ok(PowerState::from(*b)),
        _ => Err(CommandError::InvalidValue {
            kind,
            reason: "expected \"on\" or \"off\"",
        }),
    }
}

fn flag_value(kind: &'static str, value: &Value) -> Result<bool, CommandError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(CommandError::InvalidValue {
                kind,
                reason: "expected 0 or 1",
            }),
        },
        _ => Err(CommandError::InvalidValue {
            kind,
            reason: "expected a boolean",
        }),
    }
}

fn code_value(kind: &'static str, value: &Value) -> Result<String, CommandError> {
    let code = value.as_str().ok_or(CommandError::InvalidValue {
        kind,
        reason: "expected a base64 code",
    })?;
    STANDARD
        .decode(code)
        .map_err(|_| CommandError::InvalidCode)?;
    Ok(code.to_string())
}

fn scene_value(value: &Value) -> Result<Command, CommandError> {
    const INVALID: CommandError = CommandError::InvalidValue {
        kind: "rgbScene",
        reason: "expected [cloudCode, wirelessCode]",
    };

    let items = value.as_array().ok_or(INVALID)?;
    let slot = |index: usize| -> Result<Option<String>, CommandError> {
        match items.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(INVALID),
        }
    };
    let cloud = slot(0)?;
    let wireless = slot(1)?;
    if cloud.is_none() && wireless.is_none() {
        return Err(INVALID);
    }
    if let Some(code) = &wireless {
        STANDARD
            .decode(code)
            .map_err(|_| CommandError::InvalidCode)?;
    }
    Ok(Command::Scene { cloud, wireless })
}
