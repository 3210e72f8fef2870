//! Device profiles: per-model behaviour described as data.
//!
//! A [`DeviceProfile`] lists what a model family supports and the code
//! tables it needs. The same state machine ([`DeviceState`]) serves every
//! profile: [`DeviceProfile::plan`] turns a user [`Intent`] into the
//! [`Command`] to dispatch, [`DeviceProfile::commit`] records it once the
//! dispatch succeeded, and [`DeviceProfile::apply`] folds reconciled updates
//! back into the cached state.

mod catalog;
mod query;
mod state;

pub use catalog::{CATALOG, GENERIC_LIGHT, H5109, H7105, H7106, H7107, H7172, lookup};
pub use query::{QueryCode, QueryDecoder};
pub use state::{DeviceState, StateChange};

use crate::codec::frame;
use crate::command::{Command, PowerState, Rgb};

/// How a profile switches the device on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerControl {
    /// Not switchable (sensors).
    None,
    /// Semantic `state` command.
    Semantic,
    /// Pre-encoded `ptReal` codes.
    Coded {
        on: &'static str,
        off: &'static str,
    },
}

/// How a speed value maps onto the code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedScale {
    /// `0..=100` percentage bucketed into levels.
    Percent,
    /// Level number `1..=len`.
    Level,
}

/// Fan speed code table. Entry `n` is the code for level `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedTable {
    pub codes: &'static [&'static str],
    pub scale: SpeedScale,
}

impl SpeedTable {
    /// Number of speed levels.
    #[must_use]
    pub fn levels(&self) -> u8 {
        u8::try_from(self.codes.len()).unwrap_or(u8::MAX)
    }

    /// Level selected by a user value, `None` for zero.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::SpeedOutOfRange`] for level values above the
    /// table size or percentages above 100.
    pub fn level_for(&self, value: u8) -> Result<Option<u8>, ProfileError> {
        if value == 0 {
            return Ok(None);
        }
        let levels = self.levels();
        match self.scale {
            SpeedScale::Percent if value <= 100 => {
                let level = (u16::from(value) * u16::from(levels)).div_ceil(100);
                Ok(Some(u8::try_from(level).unwrap_or(levels).clamp(1, levels)))
            }
            SpeedScale::Level if value <= levels => Ok(Some(value)),
            _ => Err(ProfileError::SpeedOutOfRange(value)),
        }
    }

    /// User-facing value for a level.
    #[must_use]
    pub fn report(&self, level: u8) -> u8 {
        match self.scale {
            SpeedScale::Percent => {
                let percent = u16::from(level) * 100 / u16::from(self.levels().max(1));
                u8::try_from(percent.min(100)).unwrap_or(100)
            }
            SpeedScale::Level => level,
        }
    }

    fn code(&self, level: u8) -> Option<&'static str> {
        self.codes.get(usize::from(level).checked_sub(1)?).copied()
    }
}

/// Data description of one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub models: &'static [&'static str],
    pub power: PowerControl,
    pub speed: Option<SpeedTable>,
    pub swing: bool,
    pub night_light: bool,
    /// Brightness, colour and colour temperature through semantic commands.
    pub light: bool,
    /// Battery-powered sensor fed by wireless advertisements and polling.
    pub sensor: bool,
    pub query: QueryDecoder,
}

/// A user-level request against a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SetActive(bool),
    SetSpeed(u8),
    SetSwing(bool),
    SetLight(bool),
    SetLightBrightness(u8),
    SetLightColour(Rgb),
    SetBrightness(u8),
    SetColour(Rgb),
    SetColourTemperature(u16),
}

impl Intent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetActive(_) => "set_active",
            Self::SetSpeed(_) => "set_speed",
            Self::SetSwing(_) => "set_swing",
            Self::SetLight(_) => "set_light",
            Self::SetLightBrightness(_) => "set_light_brightness",
            Self::SetLightColour(_) => "set_light_colour",
            Self::SetBrightness(_) => "set_brightness",
            Self::SetColour(_) => "set_colour",
            Self::SetColourTemperature(_) => "set_colour_temperature",
        }
    }
}

/// Reasons an intent cannot be turned into a command.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("{profile} does not support {intent}")]
    Unsupported {
        profile: &'static str,
        intent: &'static str,
    },

    #[error("speed {0} out of range")]
    SpeedOutOfRange(u8),

    /// Swing commands reuse the last reported swing frame; none has been
    /// seen yet.
    #[error("swing state unknown until the device reports it")]
    SwingStateUnknown,
}

impl DeviceProfile {
    fn unsupported(&self, intent: Intent) -> ProfileError {
        ProfileError::Unsupported {
            profile: self.name,
            intent: intent.name(),
        }
    }

    /// Command needed to carry out `intent`, or `None` when the cached state
    /// already matches.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] when the profile does not support the
    /// intent or lacks the state to build the command.
    pub fn plan(
        &self,
        state: &DeviceState,
        intent: Intent,
    ) -> Result<Option<Command>, ProfileError> {
        match intent {
            Intent::SetActive(on) => {
                if state.power == Some(PowerState::from(on)) {
                    return Ok(None);
                }
                match self.power {
                    PowerControl::None => Err(self.unsupported(intent)),
                    PowerControl::Semantic => Ok(Some(Command::State(on.into()))),
                    PowerControl::Coded { on: on_code, off } => Ok(Some(Command::PtReal(
                        (if on { on_code } else { off }).to_string(),
                    ))),
                }
            }
            Intent::SetSpeed(value) => {
                let table = self.speed.ok_or_else(|| self.unsupported(intent))?;
                let Some(level) = table.level_for(value)? else {
                    return Ok(None);
                };
                if state.speed == Some(level) {
                    return Ok(None);
                }
                let code = table.code(level).ok_or(ProfileError::SpeedOutOfRange(value))?;
                Ok(Some(Command::PtReal(code.to_string())))
            }
            Intent::SetSwing(on) => {
                if !self.swing {
                    return Err(self.unsupported(intent));
                }
                if state.swing == Some(PowerState::from(on)) {
                    return Ok(None);
                }
                let tail = state
                    .swing_frame
                    .as_deref()
                    .and_then(|frame| frame.get(3..7))
                    .ok_or(ProfileError::SwingStateUnknown)?;
                let mut values = vec![0x3A, 0x1D, u8::from(on)];
                values.extend_from_slice(tail);
                Ok(Some(Command::MultiSync(frame::encode_code(&values))))
            }
            Intent::SetLight(on) => {
                if !self.night_light {
                    return Err(self.unsupported(intent));
                }
                if state.light == Some(PowerState::from(on)) {
                    return Ok(None);
                }
                let code = frame::encode_code(&[0x3A, 0x1B, 0x01, 0x01, u8::from(on)]);
                Ok(Some(Command::MultiSync(code)))
            }
            Intent::SetLightBrightness(level) => {
                if !self.night_light {
                    return Err(self.unsupported(intent));
                }
                if state.light_brightness == Some(level) {
                    return Ok(None);
                }
                let code = frame::encode_code(&[0x3A, 0x1B, 0x01, 0x02, level.min(100)]);
                Ok(Some(Command::MultiSync(code)))
            }
            Intent::SetLightColour(rgb) => {
                if !self.night_light {
                    return Err(self.unsupported(intent));
                }
                if state.light_rgb == Some(rgb) {
                    return Ok(None);
                }
                let code = frame::encode_code(&[0x3A, 0x1B, 0x05, 0x0D, rgb.r, rgb.g, rgb.b]);
                Ok(Some(Command::MultiSync(code)))
            }
            Intent::SetBrightness(level) => {
                if !self.light {
                    return Err(self.unsupported(intent));
                }
                if state.brightness == Some(level) {
                    return Ok(None);
                }
                Ok(Some(Command::Brightness(level.min(100))))
            }
            Intent::SetColour(rgb) => {
                if !self.light {
                    return Err(self.unsupported(intent));
                }
                if state.rgb == Some(rgb) {
                    return Ok(None);
                }
                Ok(Some(Command::Color(rgb)))
            }
            Intent::SetColourTemperature(kelvin) => {
                if !self.light {
                    return Err(self.unsupported(intent));
                }
                if state.kelvin == Some(kelvin) {
                    return Ok(None);
                }
                Ok(Some(Command::ColorTemperature(kelvin)))
            }
        }
    }

    /// Record a dispatched intent in the cached state.
    pub fn commit(&self, state: &mut DeviceState, intent: Intent) {
        match intent {
            Intent::SetActive(on) => state.power = Some(on.into()),
            Intent::SetSpeed(value) => {
                if let Some(Ok(Some(level))) = self.speed.map(|t| t.level_for(value)) {
                    state.speed = Some(level);
                }
            }
            Intent::SetSwing(on) => state.swing = Some(on.into()),
            Intent::SetLight(on) => state.light = Some(on.into()),
            Intent::SetLightBrightness(level) => {
                state.light_brightness = Some(level);
                if level == 0 {
                    state.light = Some(PowerState::Off);
                }
            }
            Intent::SetLightColour(rgb) => state.light_rgb = Some(rgb),
            Intent::SetBrightness(level) => state.brightness = Some(level),
            Intent::SetColour(rgb) => {
                state.rgb = Some(rgb);
                state.kelvin = None;
            }
            Intent::SetColourTemperature(kelvin) => state.kelvin = Some(kelvin),
        }
    }
}
