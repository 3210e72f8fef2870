//! In-process state event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use hearthlink_domain::id::DeviceId;
use hearthlink_domain::profile::StateChange;
use hearthlink_domain::update::UpdateSource;

/// State changes applied to one device by one update.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub device: DeviceId,
    pub source: UpdateSource,
    pub changes: Vec<StateChange>,
}

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Debug, Clone)]
pub struct StateEventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl StateEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DeviceEvent) {
        // send fails only when there are zero receivers
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthlink_domain::command::PowerState;

    fn event() -> DeviceEvent {
        DeviceEvent {
            device: DeviceId::parse("AB:CD:A4:C1:38:5B:0E:DF").unwrap(),
            source: UpdateSource::Lan,
            changes: vec![StateChange::Power(PowerState::On)],
        }
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = StateEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(event());

        assert_eq!(rx1.recv().await.unwrap(), event());
        assert_eq!(rx2.recv().await.unwrap(), event());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = StateEventBus::new(16);
        bus.publish(event());

        let mut rx = bus.subscribe();
        let mut later = event();
        later.source = UpdateSource::Cloud;
        bus.publish(later.clone());

        assert_eq!(rx.recv().await.unwrap(), later);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = StateEventBus::new(4);
        bus.publish(event());
    }
}
