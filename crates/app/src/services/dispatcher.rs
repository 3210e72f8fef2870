//! Command dispatcher: routes one semantic command to the first transport
//! that accepts it.

use serde_json::Value;

use hearthlink_domain::codec;
use hearthlink_domain::command::Command;
use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::payload::{CloudPayload, LanPayload, WirelessPayload};

use crate::error::DispatchError;
use crate::ports::TransportClient;
use crate::services::WirelessQueue;

/// Encodes commands and tries LAN, then cloud, then wireless.
///
/// A transport is attempted only when its client is installed, the device
/// has it enabled, and the codec produced a payload for it. Wireless jobs
/// always go through the [`WirelessQueue`].
pub struct Dispatcher<L, C, W> {
    lan: Option<L>,
    cloud: Option<C>,
    wireless: Option<W>,
    queue: WirelessQueue,
}

impl<L, C, W> Dispatcher<L, C, W>
where
    L: TransportClient<Payload = LanPayload>,
    C: TransportClient<Payload = CloudPayload>,
    W: TransportClient<Payload = WirelessPayload>,
{
    /// A dispatcher with no transport installed.
    #[must_use]
    pub fn new(queue: WirelessQueue) -> Self {
        Self {
            lan: None,
            cloud: None,
            wireless: None,
            queue,
        }
    }

    #[must_use]
    pub fn with_lan(mut self, client: L) -> Self {
        self.lan = Some(client);
        self
    }

    #[must_use]
    pub fn with_cloud(mut self, client: C) -> Self {
        self.cloud = Some(client);
        self
    }

    #[must_use]
    pub fn with_wireless(mut self, client: W) -> Self {
        self.wireless = Some(client);
        self
    }

    #[must_use]
    pub fn queue(&self) -> &WirelessQueue {
        &self.queue
    }

    #[cfg(test)]
    pub(crate) fn cloud(&self) -> Option<&C> {
        self.cloud.as_ref()
    }

    /// Deliver `command` to `device`, returning the transport that accepted it.
    ///
    /// Transport failures are logged and fall through to the next transport.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCommand`] when the command cannot be
    /// encoded (no transport is touched) and
    /// [`DispatchError::NoConnectionMethod`] when no transport accepted it.
    #[tracing::instrument(
        skip(self, device, command),
        fields(device = %device.id, cmd = command.kind())
    )]
    pub async fn send_device_update(
        &self,
        device: &DeviceRecord,
        command: &Command,
    ) -> Result<Transport, DispatchError> {
        let bundle = codec::encode(device, command)?;

        if device.uses(Transport::Lan)
            && let (Some(client), Some(payload)) = (&self.lan, &bundle.lan)
        {
            match client.update_device(device, payload).await {
                Ok(()) => return Ok(Transport::Lan),
                Err(err) => tracing::warn!(
                    transport = %Transport::Lan,
                    error = %err,
                    "update failed, trying next transport"
                ),
            }
        }

        if device.uses(Transport::Cloud)
            && let (Some(client), Some(payload)) = (&self.cloud, &bundle.cloud)
        {
            match client.update_device(device, payload).await {
                Ok(()) => return Ok(Transport::Cloud),
                Err(err) => tracing::warn!(
                    transport = %Transport::Cloud,
                    error = %err,
                    "update failed, trying next transport"
                ),
            }
        }

        if device.uses(Transport::Wireless)
            && let (Some(client), Some(payload)) = (&self.wireless, &bundle.wireless)
        {
            match self.queue.run(client.update_device(device, payload)).await {
                Ok(()) => return Ok(Transport::Wireless),
                Err(err) => {
                    tracing::warn!(transport = %Transport::Wireless, error = %err, "update failed");
                }
            }
        }

        Err(DispatchError::NoConnectionMethod)
    }

    /// Parse a `{ "cmd", "value" }` request and deliver it.
    ///
    /// # Errors
    ///
    /// See [`Self::send_device_update`].
    pub async fn send_request(
        &self,
        device: &DeviceRecord,
        request: &Value,
    ) -> Result<Transport, DispatchError> {
        let command = Command::from_request(request)?;
        self.send_device_update(device, &command).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::{FakeDispatcher, FakeTransport, cloud_device, full_device};
    use hearthlink_domain::command::PowerState;
    use hearthlink_domain::error::CommandError;

    fn dispatcher(lan_fails: bool, cloud_fails: bool, wireless_fails: bool) -> FakeDispatcher {
        Dispatcher::new(WirelessQueue::new(Duration::ZERO))
            .with_lan(FakeTransport::new(Transport::Lan, lan_fails))
            .with_cloud(FakeTransport::new(Transport::Cloud, cloud_fails))
            .with_wireless(FakeTransport::new(Transport::Wireless, wireless_fails))
    }

    fn sent(d: &FakeDispatcher) -> (usize, usize, usize) {
        (
            d.lan.as_ref().map_or(0, |t| t.sent().len()),
            d.cloud.as_ref().map_or(0, |t| t.sent().len()),
            d.wireless.as_ref().map_or(0, |t| t.sent().len()),
        )
    }

    #[tokio::test]
    async fn should_prefer_lan_when_enabled() {
        let d = dispatcher(false, false, false);
        let used = d
            .send_device_update(&full_device(), &Command::State(PowerState::On))
            .await
            .unwrap();

        assert_eq!(used, Transport::Lan);
        assert_eq!(sent(&d), (1, 0, 0));
    }

    #[tokio::test]
    async fn should_use_cloud_without_touching_wireless_when_lan_disabled() {
        let d = dispatcher(false, false, false);
        let used = d
            .send_device_update(&cloud_device(), &Command::Brightness(80))
            .await
            .unwrap();

        assert_eq!(used, Transport::Cloud);
        assert_eq!(sent(&d), (0, 1, 0));
        let payload = d.cloud.as_ref().unwrap().sent().remove(0);
        assert_eq!(payload.data, json!({"val": 203}));
    }

    #[tokio::test]
    async fn should_fall_back_to_wireless_when_others_fail() {
        let d = dispatcher(true, true, false);
        let used = d
            .send_device_update(&full_device(), &Command::State(PowerState::Off))
            .await
            .unwrap();

        assert_eq!(used, Transport::Wireless);
        assert_eq!(sent(&d), (1, 1, 1));
    }

    #[tokio::test]
    async fn should_report_no_connection_method_when_all_fail() {
        let d = dispatcher(true, true, true);
        let result = d
            .send_device_update(&full_device(), &Command::State(PowerState::On))
            .await;

        assert!(matches!(result, Err(DispatchError::NoConnectionMethod)));
        assert_eq!(sent(&d), (1, 1, 1));
    }

    #[tokio::test]
    async fn should_report_no_connection_method_when_nothing_is_installed() {
        let d: FakeDispatcher = Dispatcher::new(WirelessQueue::new(Duration::ZERO));
        let result = d
            .send_device_update(&full_device(), &Command::State(PowerState::On))
            .await;

        assert!(matches!(result, Err(DispatchError::NoConnectionMethod)));
    }

    #[tokio::test]
    async fn should_reject_unknown_kind_before_any_transport() {
        let d = dispatcher(false, false, false);
        let result = d
            .send_request(&full_device(), &json!({"cmd": "dance", "value": 1}))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::InvalidCommand(CommandError::UnknownKind(_)))
        ));
        assert_eq!(sent(&d), (0, 0, 0));
    }

    #[tokio::test]
    async fn should_parse_and_route_request() {
        let d = dispatcher(true, false, false);
        let used = d
            .send_request(&full_device(), &json!({"cmd": "state", "value": "on"}))
            .await
            .unwrap();

        assert_eq!(used, Transport::Cloud);
        let payload = d.cloud.as_ref().unwrap().sent().remove(0);
        assert_eq!(payload.cmd, "turn");
        assert_eq!(payload.data, json!({"val": 1}));
    }
}
