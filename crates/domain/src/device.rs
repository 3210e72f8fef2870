//! Device record: the core's view of one physical device.
//!
//! A [`DeviceRecord`] describes *how* a device can be reached: which
//! transports it is capable of, which of those are enabled, and the
//! transport-specific addressing (radio address, cloud topic, LAN IP). It
//! also carries the per-device codec settings.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, ValidationError};
use crate::id::{BleAddress, DeviceId};

/// One of the three independent channels used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Lan,
    Cloud,
    Wireless,
}

impl Transport {
    /// Static label used in logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lan => "lan",
            Self::Cloud => "cloud",
            Self::Wireless => "wireless",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability and enablement of a single transport for a single device.
///
/// A link can only be enabled when the device is capable of the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportLink {
    capable: bool,
    enabled: bool,
}

impl TransportLink {
    /// The device cannot use this transport.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// The device supports this transport; it is enabled when the transport
    /// is globally enabled.
    #[must_use]
    pub fn capable(globally_enabled: bool) -> Self {
        Self {
            capable: true,
            enabled: globally_enabled,
        }
    }

    #[must_use]
    pub fn is_capable(self) -> bool {
        self.capable
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        self.enabled
    }

    /// Turn the link on or off.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TransportNotCapable`] when enabling a link
    /// the device is not capable of.
    pub fn set_enabled(
        &mut self,
        transport: Transport,
        enabled: bool,
    ) -> Result<(), ValidationError> {
        if enabled && !self.capable {
            return Err(ValidationError::TransportNotCapable(transport.as_str()));
        }
        self.enabled = enabled;
        Ok(())
    }

    /// Mark the device capable and enabled (used when a device is first
    /// seen on a transport at runtime).
    pub fn activate(&mut self) {
        self.capable = true;
        self.enabled = true;
    }
}

/// Cloud JSON shape used for colour and colour-temperature commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColourMode {
    /// `{ r, g, b }`
    Rgb,
    /// `{ red, green, blue }`
    RedGreenBlue,
    /// `colorwc` wrapper with both key styles and a Kelvin field.
    #[default]
    #[serde(rename = "colorwc")]
    ColorWc,
}

impl ColourMode {
    /// Parse the configuration spelling of a colour mode.
    #[must_use]
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "rgb" => Some(Self::Rgb),
            "redgreenblue" => Some(Self::RedGreenBlue),
            "colorwc" => Some(Self::ColorWc),
            _ => None,
        }
    }
}

/// Per-device codec settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Cloud JSON shape for colour commands.
    pub cloud_colour_mode: ColourMode,
    /// When set, cloud brightness is `0..=100` rather than `0..=254`.
    pub cloud_brightness_no_scale: bool,
}

/// The core's reference to one physical device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub model: String,
    pub name: String,
    pub lan: TransportLink,
    pub cloud: TransportLink,
    pub wireless: TransportLink,
    pub ble_address: Option<BleAddress>,
    pub cloud_topic: Option<String>,
    pub lan_address: Option<IpAddr>,
    pub settings: DeviceSettings,
}

impl DeviceRecord {
    /// Create a builder for constructing a [`DeviceRecord`].
    #[must_use]
    pub fn builder() -> DeviceRecordBuilder {
        DeviceRecordBuilder::default()
    }

    /// The link for the given transport.
    #[must_use]
    pub fn link(&self, transport: Transport) -> TransportLink {
        match transport {
            Transport::Lan => self.lan,
            Transport::Cloud => self.cloud,
            Transport::Wireless => self.wireless,
        }
    }

    /// Whether the device may be reached over `transport` right now.
    #[must_use]
    pub fn uses(&self, transport: Transport) -> bool {
        self.link(transport).is_enabled()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] when the model is empty or the
    /// wireless link is enabled without an address.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel.into());
        }
        if self.wireless.is_enabled() && self.ble_address.is_none() {
            return Err(ValidationError::InvalidAddress(String::new()).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`DeviceRecord`].
#[derive(Debug, Default)]
pub struct DeviceRecordBuilder {
    id: Option<DeviceId>,
    model: Option<String>,
    name: Option<String>,
    lan: TransportLink,
    cloud: TransportLink,
    wireless: TransportLink,
    ble_address: Option<BleAddress>,
    cloud_topic: Option<String>,
    lan_address: Option<IpAddr>,
    settings: DeviceSettings,
}

impl DeviceRecordBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reachable over the local network at `address`.
    #[must_use]
    pub fn lan(mut self, address: Option<IpAddr>, enabled: bool) -> Self {
        self.lan = TransportLink::capable(enabled);
        self.lan_address = address;
        self
    }

    /// Reachable over the cloud bus on `topic`.
    #[must_use]
    pub fn cloud(mut self, topic: impl Into<String>, enabled: bool) -> Self {
        self.cloud = TransportLink::capable(enabled);
        self.cloud_topic = Some(topic.into());
        self
    }

    /// Reachable over the radio at `address`.
    #[must_use]
    pub fn wireless(mut self, address: BleAddress, enabled: bool) -> Self {
        self.wireless = TransportLink::capable(enabled);
        self.ble_address = Some(address);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: DeviceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Consume the builder, validate, and return a [`DeviceRecord`].
    ///
    /// The display name defaults to the device identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if the id or model is missing.
    pub fn build(self) -> Result<DeviceRecord, BridgeError> {
        let id = self.id.ok_or(ValidationError::EmptyDeviceId)?;
        let record = DeviceRecord {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            model: self.model.unwrap_or_default(),
            lan: self.lan,
            cloud: self.cloud,
            wireless: self.wireless,
            ble_address: self.ble_address,
            cloud_topic: self.cloud_topic,
            lan_address: self.lan_address,
            settings: self.settings,
        };
        record.validate()?;
        Ok(record)
    }
}
