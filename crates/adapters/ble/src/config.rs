//! Wireless transport configuration.

use std::time::Duration;

use serde::Deserialize;

/// Smallest allowed sensor scan period, in seconds.
pub const MIN_REFRESH_SECS: u64 = 30;

/// Configuration for the wireless driver and its job queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Disable the wireless transport entirely.
    pub disable: bool,
    /// Minimum spacing between wireless jobs, in seconds.
    ///
    /// Values of 500 and above are taken as milliseconds.
    pub control_interval_secs: f64,
    pub job_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// How long to wait for the radio to power on before giving up.
    pub power_on_timeout_secs: u64,
    /// Pause after a write before disconnecting.
    pub post_write_settle_ms: u64,
    /// Pause before scanning resumes after a connection.
    pub resume_scan_delay_ms: u64,
    /// Sensor scan period, in seconds.
    pub refresh_secs: u64,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            disable: false,
            control_interval_secs: 0.5,
            job_timeout_secs: 10,
            connect_timeout_secs: 10,
            write_timeout_secs: 5,
            power_on_timeout_secs: 5,
            post_write_settle_ms: 100,
            resume_scan_delay_ms: 1000,
            refresh_secs: 60,
        }
    }
}

impl BleConfig {
    /// Fix up values users commonly get wrong.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.control_interval_secs >= 500.0 {
            self.control_interval_secs /= 1000.0;
        }
        if !self.control_interval_secs.is_finite() || self.control_interval_secs < 0.0 {
            self.control_interval_secs = Self::default().control_interval_secs;
        }
        self.refresh_secs = self.refresh_secs.max(MIN_REFRESH_SECS);
        self
    }

    #[must_use]
    pub fn control_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.control_interval_secs)
            .unwrap_or(Duration::from_millis(500))
    }

    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    #[must_use]
    pub fn power_on_timeout(&self) -> Duration {
        Duration::from_secs(self.power_on_timeout_secs)
    }

    #[must_use]
    pub fn post_write_settle(&self) -> Duration {
        Duration::from_millis(self.post_write_settle_ms)
    }

    #[must_use]
    pub fn resume_scan_delay(&self) -> Duration {
        Duration::from_millis(self.resume_scan_delay_ms)
    }

    #[must_use]
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}
