//! Transport codec: semantic command to per-transport payloads.
//!
//! [`encode`] is pure: the same record and command always produce the same
//! bundle. Model quirks come from [`crate::models`], per-device quirks from
//! [`DeviceSettings`](crate::device::DeviceSettings).

pub mod colour;
pub mod frame;

use serde_json::{Value, json};

use crate::command::{Command, PowerState, Rgb};
use crate::device::{ColourMode, DeviceRecord};
use crate::error::CommandError;
use crate::models;
use crate::payload::{CloudPayload, LanPayload, PayloadBundle, WirelessPayload};

/// Heater power codes, already framed.
pub const HEATER_ON_CODE: &str = "MwEBAAAAAAAAAAAAAAAAAAAAADM=";
pub const HEATER_OFF_CODE: &str = "MwEAAAAAAAAAAAAAAAAAAAAAADI=";

const OPCODE_POWER: u8 = 0x01;
const OPCODE_BRIGHTNESS: u8 = 0x04;
const OPCODE_COLOUR: u8 = 0x05;

/// Build every transport payload for `command` on `device`.
///
/// # Errors
///
/// Returns [`CommandError::InvalidCode`] when a pre-encoded code does not
/// decode.
pub fn encode(device: &DeviceRecord, command: &Command) -> Result<PayloadBundle, CommandError> {
    let model = device.model.as_str();
    let bundle = match command {
        Command::State(state) => {
            let bit = u8::from(state.is_on());
            PayloadBundle {
                cloud: Some(CloudPayload::new("turn", json!({ "val": bit }))),
                wireless: Some(WirelessPayload::Opcode {
                    cmd: OPCODE_POWER,
                    data: vec![bit],
                }),
                lan: Some(LanPayload::new("turn", json!({ "value": bit }))),
            }
        }
        Command::StateDual(mask) => PayloadBundle {
            cloud: Some(CloudPayload::new("turn", json!({ "val": mask }))),
            ..PayloadBundle::default()
        },
        Command::StateOutlet(state) => {
            let val = match (models::is_outlet_16_17(model), state) {
                (true, PowerState::On) => 17,
                (true, PowerState::Off) => 16,
                (false, PowerState::On) => 1,
                (false, PowerState::Off) => 0,
            };
            PayloadBundle {
                cloud: Some(CloudPayload::new("turn", json!({ "val": val }))),
                ..PayloadBundle::default()
            }
        }
        Command::StateHumidifier(on) | Command::StatePurifier(on) => {
            let bit = u8::from(*on);
            PayloadBundle {
                cloud: Some(CloudPayload::new("turn", json!({ "val": bit }))),
                wireless: Some(WirelessPayload::Opcode {
                    cmd: OPCODE_POWER,
                    data: vec![bit],
                }),
                lan: None,
            }
        }
        Command::StateHeater(on) => {
            let code = if *on { HEATER_ON_CODE } else { HEATER_OFF_CODE };
            coded("multiSync", code)?
        }
        Command::MultiSync(code) => coded("multiSync", code)?,
        Command::PtReal(code) => coded("ptReal", code)?,
        Command::Brightness(level) => brightness(device, *level),
        Command::Color(rgb) => colour(device, *rgb),
        Command::ColorTemperature(kelvin) => colour_temperature(device, *kelvin),
        Command::Scene { cloud, wireless } => {
            let mut bundle = PayloadBundle::default();
            if let Some(code) = cloud {
                let parts: Vec<&str> = code.split(',').collect();
                bundle.cloud = Some(CloudPayload::new("ptReal", json!({ "command": parts })));
                bundle.lan = Some(LanPayload::new("ptReal", json!({ "command": parts })));
            }
            if let Some(code) = wireless {
                bundle.wireless = Some(WirelessPayload::Raw(frame::decode_code(code)?));
            }
            bundle
        }
    };
    Ok(bundle)
}

fn coded(cmd: &str, code: &str) -> Result<PayloadBundle, CommandError> {
    Ok(PayloadBundle {
        cloud: Some(CloudPayload::new(cmd, json!({ "command": [code] }))),
        wireless: Some(WirelessPayload::Raw(frame::decode_code(code)?)),
        lan: None,
    })
}

/// Cloud brightness for a `0..=100` level.
#[must_use]
pub fn cloud_brightness(level: u8, no_scale: bool) -> u8 {
    if no_scale {
        level
    } else {
        scale(f64::from(level) * 2.54)
    }
}

/// Wireless brightness for a `0..=100` level on `model`.
#[must_use]
pub fn wireless_brightness(level: u8, model: &str) -> u8 {
    let max = if models::is_ble_brightness_no_scale(model) {
        f64::from(0x64u8)
    } else {
        f64::from(0xFFu8)
    };
    let value = (f64::from(level) / 100.0 * max).floor();
    scale(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn brightness(device: &DeviceRecord, level: u8) -> PayloadBundle {
    PayloadBundle {
        cloud: Some(CloudPayload::new(
            "brightness",
            json!({ "val": cloud_brightness(level, device.settings.cloud_brightness_no_scale) }),
        )),
        wireless: Some(WirelessPayload::Opcode {
            cmd: OPCODE_BRIGHTNESS,
            data: vec![wireless_brightness(level, &device.model)],
        }),
        lan: Some(LanPayload::new("brightness", json!({ "value": level }))),
    }
}

fn colour(device: &DeviceRecord, rgb: Rgb) -> PayloadBundle {
    let Rgb { r, g, b } = rgb;
    let cloud = match device.settings.cloud_colour_mode {
        ColourMode::Rgb => CloudPayload::new("color", json!({ "r": r, "g": g, "b": b })),
        ColourMode::RedGreenBlue => {
            CloudPayload::new("color", json!({ "red": r, "green": g, "blue": b }))
        }
        ColourMode::ColorWc => CloudPayload::new(
            "colorwc",
            json!({
                "color": { "r": r, "g": g, "b": b, "red": r, "green": g, "blue": b },
                "colorTemInKelvin": 0,
            }),
        ),
    };

    let model = device.model.as_str();
    let mut data = if models::is_ble_colour_d(model) {
        vec![0x0D]
    } else if models::is_ble_colour_1501(model) {
        vec![0x15, 0x01]
    } else {
        vec![0x02]
    };
    data.extend_from_slice(&[r, g, b]);
    if models::is_ble_colour_1501(model) && !models::is_ble_colour_d(model) {
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x7F]);
    }

    PayloadBundle {
        cloud: Some(cloud),
        wireless: Some(WirelessPayload::Opcode {
            cmd: OPCODE_COLOUR,
            data,
        }),
        lan: Some(LanPayload::new("colorwc", lan_colour(rgb, 0))),
    }
}

fn colour_temperature(device: &DeviceRecord, kelvin: u16) -> PayloadBundle {
    let rgb = colour::kelvin_to_rgb(kelvin);
    let Rgb { r, g, b } = rgb;
    let cloud = match device.settings.cloud_colour_mode {
        ColourMode::Rgb => CloudPayload::new(
            "colorTem",
            json!({ "colorTemInKelvin": kelvin, "color": { "r": r, "g": g, "b": b } }),
        ),
        ColourMode::RedGreenBlue => CloudPayload::new(
            "colorTem",
            json!({ "color": { "red": r, "green": g, "blue": b }, "colorTemInKelvin": kelvin }),
        ),
        ColourMode::ColorWc => CloudPayload::new("colorwc", lan_colour(rgb, kelvin)),
    };

    let prefix = if models::is_ble_colour_d(&device.model) {
        0x0D
    } else {
        0x02
    };

    PayloadBundle {
        cloud: Some(cloud),
        wireless: Some(WirelessPayload::Opcode {
            cmd: OPCODE_COLOUR,
            data: vec![prefix, 0xFF, 0xFF, 0xFF, 0x01, r, g, b],
        }),
        lan: Some(LanPayload::new("colorwc", lan_colour(rgb, kelvin))),
    }
}

fn lan_colour(rgb: Rgb, kelvin: u16) -> Value {
    json!({
        "color": { "r": rgb.r, "g": rgb.g, "b": rgb.b },
        "colorTemInKelvin": kelvin,
    })
}
