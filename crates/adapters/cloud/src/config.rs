//! Cloud transport configuration.

use std::time::Duration;

use serde::Deserialize;

/// Smallest allowed status polling period, in seconds.
pub const MIN_REFRESH_SECS: u64 = 30;

/// Configuration for the cloud message bus connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Disable the cloud transport entirely.
    pub disable: bool,
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Connect with TLS using the platform root certificates.
    pub tls: bool,
    /// MQTT client identifier.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic the account's status messages are published on.
    pub account_topic: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Pause before polling the broker again after a connection error.
    pub reconnect_delay_secs: u64,
    /// Status polling period for devices without push updates.
    pub refresh_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            disable: false,
            broker_host: "localhost".to_string(),
            broker_port: 8883,
            tls: true,
            client_id: "hearthlink".to_string(),
            username: None,
            password: None,
            account_topic: None,
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
            refresh_secs: 60,
        }
    }
}

impl CloudConfig {
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.refresh_secs = self.refresh_secs.max(MIN_REFRESH_SECS);
        self
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}
