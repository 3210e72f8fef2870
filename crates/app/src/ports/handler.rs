//! Device handler port: the per-device receiver of reconciled updates.

use hearthlink_domain::error::BridgeError;
use hearthlink_domain::update::ReconciledUpdate;

/// Receives canonical state diffs for one device.
pub trait DeviceHandler: Send + Sync {
    /// Fold `update` into the device's state.
    ///
    /// # Errors
    ///
    /// Errors are logged by the reconciler and never propagated further.
    fn external_update(&self, update: &ReconciledUpdate) -> Result<(), BridgeError>;
}
