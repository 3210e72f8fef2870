//! Sensor scanner port: passive wireless discovery.

use std::future::Future;
use std::sync::Arc;

use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::BleAddress;
use hearthlink_domain::update::RawUpdate;

/// Callback receiving one decoded advertisement.
pub type ReadingSink = Arc<dyn Fn(BleAddress, RawUpdate) + Send + Sync>;

/// Wireless discovery of advertising sensors.
pub trait SensorScanner: Send + Sync {
    /// Start scanning and deliver each decoded reading to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the radio cannot scan.
    fn start_discovery(
        &self,
        sink: ReadingSink,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Stop scanning and drop the sink.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the radio refuses to stop.
    fn stop_discovery(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;
}
