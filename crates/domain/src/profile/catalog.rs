//! Built-in profiles.

use super::{DeviceProfile, PowerControl, QueryDecoder, SpeedScale, SpeedTable};

const APPLIANCE_ON: &str = "MwEBAAAAAAAAAAAAAAAAAAAAADM=";
const APPLIANCE_OFF: &str = "MwEAAAAAAAAAAAAAAAAAAAAAADI=";

const FAN_SPEED_CODES: &[&str] = &[
    "MwUBAQAAAAAAAAAAAAAAAAAAADY=",
    "MwUBAgAAAAAAAAAAAAAAAAAAADU=",
    "MwUBAwAAAAAAAAAAAAAAAAAAADQ=",
    "MwUBBAAAAAAAAAAAAAAAAAAAADM=",
    "MwUBBQAAAAAAAAAAAAAAAAAAADI=",
    "MwUBBgAAAAAAAAAAAAAAAAAAADE=",
    "MwUBBwAAAAAAAAAAAAAAAAAAADA=",
    "MwUBCAAAAAAAAAAAAAAAAAAAAD8=",
    "MwUBCQAAAAAAAAAAAAAAAAAAAD4=",
    "MwUBCgAAAAAAAAAAAAAAAAAAAD0=",
    "MwUBCwAAAAAAAAAAAAAAAAAAADw=",
    "MwUBDAAAAAAAAAAAAAAAAAAAADs=",
];

/// Fallback for anything not listed: a dimmable colour light.
pub static GENERIC_LIGHT: DeviceProfile = DeviceProfile {
    name: "light",
    models: &[],
    power: PowerControl::Semantic,
    speed: None,
    swing: false,
    night_light: false,
    light: true,
    sensor: false,
    query: QueryDecoder::None,
};

pub static H7105: DeviceProfile = DeviceProfile {
    name: "H7105",
    models: &["H7105"],
    power: PowerControl::Coded {
        on: APPLIANCE_ON,
        off: APPLIANCE_OFF,
    },
    speed: Some(SpeedTable {
        codes: FAN_SPEED_CODES,
        scale: SpeedScale::Percent,
    }),
    swing: true,
    night_light: true,
    light: false,
    sensor: false,
    query: QueryDecoder::Fan,
};

pub static H7106: DeviceProfile = DeviceProfile {
    name: "H7106",
    models: &["H7106"],
    power: PowerControl::Coded {
        on: APPLIANCE_ON,
        off: APPLIANCE_OFF,
    },
    speed: Some(SpeedTable {
        codes: FAN_SPEED_CODES.split_at(8).0,
        scale: SpeedScale::Percent,
    }),
    swing: false,
    night_light: false,
    light: false,
    sensor: false,
    query: QueryDecoder::Fan,
};

pub static H7107: DeviceProfile = DeviceProfile {
    name: "H7107",
    models: &["H7107"],
    power: PowerControl::Coded {
        on: APPLIANCE_ON,
        off: APPLIANCE_OFF,
    },
    speed: Some(SpeedTable {
        codes: FAN_SPEED_CODES,
        scale: SpeedScale::Level,
    }),
    swing: true,
    night_light: true,
    light: false,
    sensor: false,
    query: QueryDecoder::Fan,
};

pub static H7172: DeviceProfile = DeviceProfile {
    name: "H7172",
    models: &["H7172"],
    power: PowerControl::Coded {
        on: "MwUCAAAAAAAAAAAAAAAAAAAAADQ=",
        off: "MxkAAAAAAAAAAAAAAAAAAAAAACo=",
    },
    speed: None,
    swing: false,
    night_light: false,
    light: false,
    sensor: false,
    query: QueryDecoder::IceMaker,
};

pub static H5109: DeviceProfile = DeviceProfile {
    name: "H5109",
    models: &["H5109"],
    power: PowerControl::None,
    speed: None,
    swing: false,
    night_light: false,
    light: false,
    sensor: true,
    query: QueryDecoder::None,
};

/// Every model-specific profile.
pub static CATALOG: &[&DeviceProfile] = &[&H7105, &H7106, &H7107, &H7172, &H5109];

/// Profile for `model`, falling back to [`GENERIC_LIGHT`].
#[must_use]
pub fn lookup(model: &str) -> &'static DeviceProfile {
    CATALOG
        .iter()
        .copied()
        .find(|profile| profile.models.contains(&model))
        .unwrap_or(&GENERIC_LIGHT)
}
