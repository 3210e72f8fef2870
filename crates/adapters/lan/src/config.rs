//! Local-network transport configuration.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Deserialize;

/// Smallest allowed status polling period, in seconds.
pub const MIN_REFRESH_SECS: u64 = 10;

/// Configuration for the UDP transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanConfig {
    /// Disable the local-network transport entirely.
    pub disable: bool,
    /// Interface address the listener binds to.
    pub bind_address: Ipv4Addr,
    /// Group the scan request is sent to.
    pub multicast_address: Ipv4Addr,
    /// Port devices listen on for scan requests.
    pub scan_port: u16,
    /// Port devices send their replies to.
    pub listen_port: u16,
    /// Port devices accept commands on.
    pub command_port: u16,
    /// Period between discovery scans, in seconds.
    pub scan_interval_secs: u64,
    /// Period between status polls, in seconds.
    pub refresh_secs: u64,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            disable: false,
            bind_address: Ipv4Addr::UNSPECIFIED,
            multicast_address: Ipv4Addr::new(239, 255, 255, 250),
            scan_port: 4001,
            listen_port: 4002,
            command_port: 4003,
            scan_interval_secs: 60,
            refresh_secs: 30,
        }
    }
}

impl LanConfig {
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.refresh_secs = self.refresh_secs.max(MIN_REFRESH_SECS);
        self.scan_interval_secs = self.scan_interval_secs.max(MIN_REFRESH_SECS);
        self
    }

    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    #[must_use]
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}
