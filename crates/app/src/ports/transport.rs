//! Transport client port: the three channels a command can travel on.

use std::future::Future;
use std::sync::Arc;

use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;

/// A client able to deliver one transport's payload to a device.
///
/// Implementations log their own failures; the dispatcher only decides
/// whether to fall through to the next transport.
pub trait TransportClient: Send + Sync {
    /// Payload shape this transport accepts.
    type Payload: Send + Sync;

    /// Which transport this client drives.
    fn transport(&self) -> Transport;

    /// Deliver `payload` to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the device could not be
    /// reached.
    fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &Self::Payload,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

impl<T: TransportClient> TransportClient for Arc<T> {
    type Payload = T::Payload;

    fn transport(&self) -> Transport {
        (**self).transport()
    }

    fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &Self::Payload,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        (**self).update_device(device, payload)
    }
}
