//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hearthlink.toml` in the working directory, or the file named
//! by `HEARTHLINK_CONFIG`. Every field has a default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::HashSet;
use std::net::IpAddr;

use serde::Deserialize;

use hearthlink_adapter_ble::BleConfig;
use hearthlink_adapter_cloud::CloudConfig;
use hearthlink_adapter_lan::LanConfig;
use hearthlink_domain::device::{ColourMode, DeviceRecord, DeviceSettings};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::{BleAddress, DeviceId};

const DEFAULT_PATH: &str = "hearthlink.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ble: BleConfig,
    pub cloud: CloudConfig,
    pub lan: LanConfig,
    /// Devices the bridge controls.
    pub devices: Vec<DeviceConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,rumqttc=warn,btleplug=warn".to_string(),
        }
    }
}

/// One controlled device with its per-device overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: String,
    pub model: String,
    pub name: Option<String>,
    /// Device topic on the cloud bus; the device is cloud-capable when set.
    pub cloud_topic: Option<String>,
    /// The device has a radio. Its address is derived from the identifier
    /// unless `custom_address` is set.
    pub wireless: bool,
    /// Radio address override. Whitespace is ignored.
    pub custom_address: Option<String>,
    /// Fixed local network address; otherwise learnt from scan replies.
    pub custom_ip_address: Option<IpAddr>,
    /// `rgb`, `redgreenblue` or `colorwc`.
    pub cloud_colour_mode: Option<String>,
    pub cloud_brightness_no_scale: bool,
    /// Skip this device entirely.
    pub ignore: bool,
}

impl DeviceConfig {
    fn custom_address(&self) -> Option<String> {
        self.custom_address
            .as_deref()
            .map(|raw| raw.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|raw| !raw.is_empty())
    }

    fn colour_mode(&self) -> Result<ColourMode, ConfigError> {
        match self.cloud_colour_mode.as_deref() {
            None => Ok(ColourMode::default()),
            Some(raw) => ColourMode::from_config(raw).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "device {}: cloud_colour_mode must be rgb, redgreenblue or colorwc, got {raw:?}",
                    self.device_id
                ))
            }),
        }
    }

    /// Build the device record, enabling each transport the device is
    /// capable of unless it is disabled globally.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the identifier, address or colour mode
    /// is invalid.
    pub fn to_record(
        &self,
        ble: &BleConfig,
        cloud: &CloudConfig,
        lan: &LanConfig,
    ) -> Result<DeviceRecord, ConfigError> {
        let id = DeviceId::parse(&self.device_id)
            .map_err(|err| ConfigError::Validation(format!("device {:?}: {err}", self.device_id)))?;

        let mut builder = DeviceRecord::builder()
            .id(id.clone())
            .model(&self.model)
            .settings(DeviceSettings {
                cloud_colour_mode: self.colour_mode()?,
                cloud_brightness_no_scale: self.cloud_brightness_no_scale,
            });
        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(topic) = &self.cloud_topic {
            builder = builder.cloud(topic, !cloud.disable);
        }
        if !lan.disable {
            builder = builder.lan(self.custom_ip_address, self.custom_ip_address.is_some());
        }

        let custom_address = self.custom_address();
        if self.wireless || custom_address.is_some() {
            let address = match custom_address {
                Some(raw) => BleAddress::parse(&raw),
                None => BleAddress::from_device_id(&id),
            }
            .map_err(|err| ConfigError::Validation(format!("device {id}: {err}")))?;
            builder = builder.wireless(address, !ble.disable);
        }

        builder.build().map_err(|source| ConfigError::Device { id, source })
    }
}

/// A variable lookup, `std::env::var` in production.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or the
    /// configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let env = ProcessEnv;
        let path = env.var("HEARTHLINK_CONFIG").unwrap_or_else(|| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(&env);
        config.validate()?;
        Ok(config.normalized())
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, env: &impl Env) {
        if let Some(val) = env.var("HEARTHLINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env.var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = env.var("HEARTHLINK_BLE_DISABLE") {
            self.ble.disable = flag(&val);
        }
        if let Some(val) = env.var("HEARTHLINK_CLOUD_DISABLE") {
            self.cloud.disable = flag(&val);
        }
        if let Some(val) = env.var("HEARTHLINK_LAN_DISABLE") {
            self.lan.disable = flag(&val);
        }
        if let Some(val) = env.var("HEARTHLINK_CLOUD_HOST") {
            self.cloud.broker_host = val;
        }
        if let Some(val) = env.var("HEARTHLINK_CLOUD_USERNAME") {
            self.cloud.username = Some(val);
        }
        if let Some(val) = env.var("HEARTHLINK_CLOUD_PASSWORD") {
            self.cloud.password = Some(val);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for device in self.devices.iter().filter(|device| !device.ignore) {
            if device.model.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "device {:?} has no model",
                    device.device_id
                )));
            }
            device.colour_mode()?;
            let id = DeviceId::parse(&device.device_id)
                .map_err(|err| {
                    ConfigError::Validation(format!("device {:?}: {err}", device.device_id))
                })?;
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Validation(format!("device {id} is listed twice")));
            }
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.ble = self.ble.normalized();
        self.cloud = self.cloud.normalized();
        self.lan = self.lan.normalized();
        self
    }

    /// Records for every device not marked `ignore`.
    ///
    /// # Errors
    ///
    /// Returns the first device that cannot be turned into a record.
    pub fn device_records(&self) -> Result<Vec<DeviceRecord>, ConfigError> {
        self.devices
            .iter()
            .filter(|device| {
                if device.ignore {
                    tracing::debug!(device = %device.device_id, "ignoring device");
                }
                !device.ignore
            })
            .map(|device| device.to_record(&self.ble, &self.cloud, &self.lan))
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A device entry produced an invalid record.
    #[error("invalid device {id}")]
    Device {
        id: DeviceId,
        #[source]
        source: BridgeError,
    },
}
