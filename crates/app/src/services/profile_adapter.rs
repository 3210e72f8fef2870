//! Profile-driven device handler.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hearthlink_domain::device::DeviceRecord;
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::DeviceId;
use hearthlink_domain::payload::{CloudPayload, LanPayload, WirelessPayload};
use hearthlink_domain::profile::{self, DeviceProfile, DeviceState, Intent};
use hearthlink_domain::update::ReconciledUpdate;

use crate::error::IntentError;
use crate::event_bus::{DeviceEvent, StateEventBus};
use crate::ports::{DeviceHandler, TransportClient};
use crate::services::Dispatcher;

/// Drives one device through its [`DeviceProfile`].
///
/// Intents are planned against the cached state, dispatched, and committed
/// only once a transport accepted them. Reconciled updates are folded back
/// into the cache and published on the event bus.
#[derive(Debug)]
pub struct ProfileAdapter {
    device: DeviceId,
    profile: &'static DeviceProfile,
    state: Mutex<DeviceState>,
    events: Option<StateEventBus>,
}

impl ProfileAdapter {
    /// Adapter for `device`, picking the profile by model.
    #[must_use]
    pub fn new(device: &DeviceRecord) -> Self {
        Self {
            device: device.id.clone(),
            profile: profile::lookup(&device.model),
            state: Mutex::new(DeviceState::default()),
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: StateEventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    #[must_use]
    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    /// Snapshot of the cached state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Carry out `intent` on `device` through `dispatcher`.
    ///
    /// Nothing is sent when the cached state already matches.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::Profile`] when the profile cannot express the
    /// intent and [`IntentError::Dispatch`] when no transport accepted the
    /// command; the cached state is left untouched in both cases.
    #[tracing::instrument(
        skip(self, dispatcher, device),
        fields(device = %self.device, intent = intent.name())
    )]
    pub async fn handle_intent<L, C, W>(
        &self,
        dispatcher: &Dispatcher<L, C, W>,
        device: &DeviceRecord,
        intent: Intent,
    ) -> Result<(), IntentError>
    where
        L: TransportClient<Payload = LanPayload>,
        C: TransportClient<Payload = CloudPayload>,
        W: TransportClient<Payload = WirelessPayload>,
    {
        let planned = self.profile.plan(&self.lock(), intent)?;
        let Some(command) = planned else {
            tracing::debug!("state already matches");
            return Ok(());
        };

        let transport = dispatcher.send_device_update(device, &command).await?;
        self.profile.commit(&mut self.lock(), intent);
        tracing::info!(%transport, "intent applied");
        Ok(())
    }
}

impl DeviceHandler for ProfileAdapter {
    fn external_update(&self, update: &ReconciledUpdate) -> Result<(), BridgeError> {
        let changes = self.profile.apply(&mut self.lock(), update);
        if changes.is_empty() {
            return Ok(());
        }

        for change in &changes {
            tracing::info!(
                device = %self.device,
                source = %update.source,
                ?change,
                "state changed"
            );
        }
        if let Some(events) = &self.events {
            events.publish(DeviceEvent {
                device: self.device.clone(),
                source: update.source,
                changes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::DispatchError;
    use crate::services::WirelessQueue;
    use crate::testing::{FakeDispatcher, FakeTransport, device_with_model};
    use hearthlink_domain::codec::frame;
    use hearthlink_domain::command::PowerState;
    use hearthlink_domain::device::Transport;
    use hearthlink_domain::profile::{ProfileError, StateChange};
    use hearthlink_domain::time::now;
    use hearthlink_domain::update::UpdateSource;

    fn dispatcher(cloud_fails: bool) -> FakeDispatcher {
        Dispatcher::new(WirelessQueue::new(Duration::ZERO))
            .with_cloud(FakeTransport::new(Transport::Cloud, cloud_fails))
            .with_wireless(FakeTransport::new(Transport::Wireless, true))
    }

    #[tokio::test]
    async fn should_commit_speed_after_successful_dispatch() {
        let device = device_with_model("H7107");
        let adapter = ProfileAdapter::new(&device);
        let d = dispatcher(false);

        adapter.handle_intent(&d, &device, Intent::SetSpeed(7)).await.unwrap();

        assert_eq!(adapter.state().speed, Some(7));
        let sent = d.cloud().unwrap().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].cmd, "ptReal");
    }

    #[tokio::test]
    async fn should_keep_state_when_dispatch_fails() {
        let device = device_with_model("H7107");
        let adapter = ProfileAdapter::new(&device);
        let d = dispatcher(true);

        let result = adapter.handle_intent(&d, &device, Intent::SetActive(true)).await;

        assert!(matches!(
            result,
            Err(IntentError::Dispatch(DispatchError::NoConnectionMethod))
        ));
        assert_eq!(adapter.state().power, None);
    }

    #[tokio::test]
    async fn should_skip_dispatch_when_state_matches() {
        let device = device_with_model("H7107");
        let adapter = ProfileAdapter::new(&device);
        let d = dispatcher(false);

        adapter.handle_intent(&d, &device, Intent::SetActive(true)).await.unwrap();
        adapter.handle_intent(&d, &device, Intent::SetActive(true)).await.unwrap();

        assert_eq!(d.cloud().unwrap().sent().len(), 1);
        assert_eq!(adapter.state().power, Some(PowerState::On));
    }

    #[tokio::test]
    async fn should_refuse_swing_until_reported() {
        let device = device_with_model("H7107");
        let adapter = ProfileAdapter::new(&device);
        let d = dispatcher(false);

        let result = adapter.handle_intent(&d, &device, Intent::SetSwing(true)).await;

        assert!(matches!(
            result,
            Err(IntentError::Profile(ProfileError::SwingStateUnknown))
        ));
        assert!(d.cloud().unwrap().sent().is_empty());
    }

    #[tokio::test]
    async fn should_publish_reported_changes() {
        let device = device_with_model("H7107");
        let bus = StateEventBus::new(8);
        let mut rx = bus.subscribe();
        let adapter = ProfileAdapter::new(&device).with_events(bus);

        let mut update = ReconciledUpdate::new(UpdateSource::Cloud, now());
        update.commands = Some(vec![frame::encode_code(&[0xAA, 0x05, 0x01, 0x03])]);
        adapter.external_update(&update).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.device, device.id);
        assert_eq!(event.changes, vec![StateChange::Speed(3)]);
        assert_eq!(adapter.state().speed, Some(3));
    }

    #[test]
    fn should_not_publish_when_nothing_changed() {
        let device = device_with_model("H6199");
        let bus = StateEventBus::new(8);
        let mut rx = bus.subscribe();
        let adapter = ProfileAdapter::new(&device).with_events(bus);

        let update = ReconciledUpdate::new(UpdateSource::Lan, now());
        adapter.external_update(&update).unwrap();

        assert!(rx.try_recv().is_err());
    }
}
