use serde::Serialize;

use super::{DeviceProfile, QueryCode};
use crate::codec::frame;
use crate::command::{PowerState, Rgb};
use crate::update::{PowerReading, ReconciledUpdate};

/// Cached semantic state of one device.
///
/// Sensor temperature and humidity are kept as reported (hundredths for
/// wireless readings).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub power: Option<PowerState>,
    pub outlets: Option<(PowerState, PowerState)>,
    pub brightness: Option<u8>,
    pub rgb: Option<Rgb>,
    pub kelvin: Option<u16>,
    pub battery: Option<u8>,
    pub temperature: Option<f64>,
    pub set_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub leak: Option<bool>,
    pub online: Option<bool>,
    pub speed: Option<u8>,
    pub fan_mode: Option<u8>,
    pub swing: Option<PowerState>,
    pub swing_frame: Option<Vec<u8>>,
    pub light: Option<PowerState>,
    pub light_brightness: Option<u8>,
    pub light_rgb: Option<Rgb>,
    pub sensor_attached: Option<bool>,
    pub last_commands: Vec<String>,
}

/// A field that changed while applying an update.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Power(PowerState),
    Outlets(PowerState, PowerState),
    Brightness(u8),
    Rgb(Rgb),
    Kelvin(u16),
    Battery(u8),
    Temperature(f64),
    SetTemperature(f64),
    Humidity(f64),
    Leak(bool),
    Online(bool),
    Speed(u8),
    FanMode(u8),
    Swing(PowerState),
    Light(PowerState),
    LightBrightness(u8),
    LightColour(Rgb),
    SensorAttached(bool),
    /// A status frame the profile does not interpret, as hex.
    UnknownCode(String),
}

fn set<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

impl DeviceProfile {
    /// Fold a reconciled update into `state`, returning what changed.
    pub fn apply(&self, state: &mut DeviceState, update: &ReconciledUpdate) -> Vec<StateChange> {
        let mut changes = Vec::new();

        match update.power {
            Some(PowerReading::Single(power)) => {
                if set(&mut state.power, power) {
                    changes.push(StateChange::Power(power));
                }
            }
            Some(PowerReading::Dual(first, second)) => {
                if set(&mut state.outlets, (first, second)) {
                    changes.push(StateChange::Outlets(first, second));
                }
            }
            None => {}
        }

        macro_rules! track {
            ($field:ident, $slot:ident, $change:ident) => {
                if let Some(value) = update.$field {
                    if set(&mut state.$slot, value) {
                        changes.push(StateChange::$change(value));
                    }
                }
            };
        }

        track!(brightness, brightness, Brightness);
        track!(rgb, rgb, Rgb);
        track!(kelvin, kelvin, Kelvin);
        track!(battery, battery, Battery);
        track!(temperature, temperature, Temperature);
        track!(set_temperature, set_temperature, SetTemperature);
        track!(humidity, humidity, Humidity);
        track!(leak_detected, leak, Leak);
        track!(online, online, Online);

        if let Some(commands) = &update.commands {
            for code in commands {
                let Ok(bytes) = frame::decode_code(code) else {
                    continue;
                };
                if let Some(query) = self.query.decode(&bytes) {
                    self.apply_query(state, query, &mut changes);
                }
            }
            state.last_commands.clone_from(commands);
        }

        changes
    }

    fn apply_query(
        &self,
        state: &mut DeviceState,
        query: QueryCode,
        changes: &mut Vec<StateChange>,
    ) {
        match query {
            QueryCode::FanSpeed(level) => {
                if set(&mut state.speed, level) {
                    changes.push(StateChange::Speed(level));
                }
            }
            QueryCode::FanMode(mode) => {
                if set(&mut state.fan_mode, mode) {
                    changes.push(StateChange::FanMode(mode));
                }
            }
            QueryCode::SensorAttached(attached) => {
                if set(&mut state.sensor_attached, attached) {
                    changes.push(StateChange::SensorAttached(attached));
                }
            }
            QueryCode::NightLight { on, brightness } => {
                if !self.night_light {
                    return;
                }
                if set(&mut state.light, PowerState::from(on)) {
                    changes.push(StateChange::Light(on.into()));
                }
                if set(&mut state.light_brightness, brightness) {
                    changes.push(StateChange::LightBrightness(brightness));
                }
            }
            QueryCode::NightLightColour(rgb) => {
                if self.night_light && set(&mut state.light_rgb, rgb) {
                    changes.push(StateChange::LightColour(rgb));
                }
            }
            QueryCode::Swing { on, frame } => {
                state.swing_frame = Some(frame);
                if set(&mut state.swing, PowerState::from(on)) {
                    changes.push(StateChange::Swing(on.into()));
                }
            }
            QueryCode::IceMakerPower(on) => {
                if set(&mut state.power, PowerState::from(on)) {
                    changes.push(StateChange::Power(on.into()));
                }
            }
            QueryCode::Unknown(bytes) => {
                changes.push(StateChange::UnknownCode(frame::to_hex(&bytes)));
            }
        }
    }
}
