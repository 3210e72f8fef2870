//! State reconciler: turns whatever a transport pushed into the canonical
//! diff device handlers understand.

use serde_json::Value;

use hearthlink_domain::codec::colour::{KELVIN_MAX, KELVIN_MIN};
use hearthlink_domain::command::PowerState;
use hearthlink_domain::device::DeviceRecord;
use hearthlink_domain::models;
use hearthlink_domain::time::now;
use hearthlink_domain::update::{
    BaseCmd, PowerReading, RawState, RawUpdate, ReconciledUpdate, UpdateSource,
};

use crate::ports::DeviceHandler;

/// Kelvin above which a reported value is flagged as implausible.
const KELVIN_ANOMALY: u32 = 9000;

/// Normalises raw updates and forwards non-empty diffs to device handlers.
#[derive(Debug, Default)]
pub struct Reconciler;

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Normalise `raw` and hand it to `handler` when it carries anything.
    ///
    /// Returns the diff that was forwarded. Handler errors are logged.
    #[tracing::instrument(skip_all, fields(device = %device.id, source = %raw.source))]
    pub fn receive_device_update<H>(
        &self,
        device: &DeviceRecord,
        raw: &RawUpdate,
        handler: &H,
    ) -> Option<ReconciledUpdate>
    where
        H: DeviceHandler + ?Sized,
    {
        tracing::debug!(?raw, "receiving update");
        let update = normalize(device, raw);

        if update.is_empty() {
            tracing::debug!("update carries no known field");
            return None;
        }
        if let Some(kelvin) = update.kelvin_anomaly {
            tracing::warn!(kelvin, clamped = ?update.kelvin, "device reported kelvin out of range");
        }

        if let Err(err) = handler.external_update(&update) {
            tracing::warn!(error = %err, "device not updated");
        }
        Some(update)
    }
}

/// Canonical diff for `raw` as seen by `device`.
#[must_use]
pub fn normalize(device: &DeviceRecord, raw: &RawUpdate) -> ReconciledUpdate {
    let mut update = ReconciledUpdate::new(raw.source, now());

    // older devices report a `data` block instead of `state`
    let legacy;
    let state = match (&raw.state, &raw.data) {
        (Some(state), _) => Some(state),
        (None, Some(data)) => {
            legacy = RawState {
                on_off: data.turn,
                brightness: data.brightness,
                ..RawState::default()
            };
            Some(&legacy)
        }
        (None, None) => None,
    };

    if let Some(state) = state {
        if let Some(on_off) = state.on_off {
            update.power = power_reading(&device.model, on_off);
        }

        if let Some(brightness) = state.brightness {
            let level = match raw.source {
                UpdateSource::Lan => Some(brightness),
                UpdateSource::Cloud if device.settings.cloud_brightness_no_scale => {
                    Some(brightness)
                }
                UpdateSource::Cloud => Some((brightness / 2.54).round()),
                UpdateSource::Wireless => None,
            };
            update.brightness = level.map(percent);
        }

        update.rgb = state.color;

        if let Some(kelvin) = state.color_tem_in_kelvin.filter(|k| *k != 0) {
            update.kelvin_anomaly = Some(kelvin).filter(|k| *k > KELVIN_ANOMALY);
            let clamped = kelvin.clamp(u32::from(KELVIN_MIN), u32::from(KELVIN_MAX));
            update.kelvin = u16::try_from(clamped).ok();
        }
    }

    update.battery = raw.battery.map(percent);
    update.leak_detected = raw.leak_detected;
    update.temperature = raw
        .temperature
        .or_else(|| state.and_then(|s| s.sta.as_ref()).and_then(|sta| sta.cur_tem));
    update.temperature_f = raw.temperature_f;
    update.set_temperature = state.and_then(|s| s.sta.as_ref()).and_then(|sta| sta.set_tem);
    update.humidity = raw.humidity;
    update.online = raw.online;

    if let Some((commands, base_cmd)) = command_list(raw) {
        update.commands = Some(commands);
        update.base_cmd = Some(base_cmd);
    }

    update
}

fn power_reading(model: &str, on_off: u8) -> Option<PowerReading> {
    if models::is_switch_double(model) {
        let (first, second) = match on_off {
            0 => (PowerState::Off, PowerState::Off),
            1 => (PowerState::On, PowerState::Off),
            2 => (PowerState::Off, PowerState::On),
            3 => (PowerState::On, PowerState::On),
            _ => return None,
        };
        return Some(PowerReading::Dual(first, second));
    }
    Some(PowerReading::Single(PowerState::from(matches!(on_off, 1 | 17))))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn command_list(raw: &RawUpdate) -> Option<(Vec<String>, BaseCmd)> {
    if let Some(commands) = &raw.commands {
        return Some((commands.clone(), BaseCmd::None));
    }
    if let Some(op) = &raw.op {
        if let Some(command) = &op.command {
            return Some((command.clone(), BaseCmd::Op));
        }
        if truthy(op.mode.as_ref())
            && let Some(values) = string_list(op.value.as_ref())
        {
            return Some((values, BaseCmd::OpMode));
        }
        if op.opcode.as_deref() == Some("mode")
            && let Some(values) = string_list(op.mode_value.as_ref())
        {
            return Some((values, BaseCmd::OpCodeMode));
        }
        return None;
    }
    if let Some(bulb) = &raw.bulb {
        return Some((bulb.clone(), BaseCmd::Bulb));
    }
    let data = raw.data.as_ref()?;
    if data.op.as_deref() == Some("mode") {
        return string_list(data.value.as_ref()).map(|values| (values, BaseCmd::OpMode));
    }
    None
}
