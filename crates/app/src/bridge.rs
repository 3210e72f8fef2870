//! Root context: the device registry plus the services that act on it.
//!
//! A [`Bridge`] is created once by the composition root and shared by every
//! transport task. Transports push [`InboundUpdate`]s onto a channel drained
//! by [`Bridge::run_inbound`]; commands enter through
//! [`Bridge::send_request`] or [`Bridge::send_intent`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::{BridgeError, NotFoundError};
use hearthlink_domain::id::{BleAddress, DeviceId};
use hearthlink_domain::payload::{CloudPayload, LanPayload, WirelessPayload};
use hearthlink_domain::profile::Intent;
use hearthlink_domain::update::{RawUpdate, ReconciledUpdate};

use crate::error::IntentError;
use crate::event_bus::StateEventBus;
use crate::ports::{DeviceHandler, ReadingSink, SensorScanner, TransportClient};
use crate::services::{Dispatcher, ProfileAdapter, Reconciler};

/// How long each periodic sensor scan runs.
pub const SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Something a transport pushed towards the core.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    /// Status keyed by device identifier (cloud bus, account polling).
    Device { id: DeviceId, raw: RawUpdate },
    /// Wireless advertisement keyed by radio address.
    Address { address: BleAddress, raw: RawUpdate },
    /// Local-network status reply keyed by the sender's address.
    LanStatus { ip: IpAddr, raw: RawUpdate },
    /// Local-network scan reply: the device answers at `ip`.
    LanSeen { id: DeviceId, ip: IpAddr },
}

struct Entry {
    record: DeviceRecord,
    handler: Arc<dyn DeviceHandler>,
    profile: Option<Arc<ProfileAdapter>>,
}

/// Device registry, dispatcher and reconciler for one running bridge.
pub struct Bridge<L, C, W> {
    registry: RwLock<HashMap<DeviceId, Entry>>,
    dispatcher: Dispatcher<L, C, W>,
    reconciler: Reconciler,
    events: StateEventBus,
}

impl<L, C, W> Bridge<L, C, W>
where
    L: TransportClient<Payload = LanPayload>,
    C: TransportClient<Payload = CloudPayload>,
    W: TransportClient<Payload = WirelessPayload>,
{
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher<L, C, W>,
        reconciler: Reconciler,
        events: StateEventBus,
    ) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            dispatcher,
            reconciler,
            events,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<L, C, W> {
        &self.dispatcher
    }

    #[must_use]
    pub fn events(&self) -> &StateEventBus {
        &self.events
    }

    /// Register `record` with a custom handler, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] when the record is invalid.
    pub fn register(
        &self,
        record: DeviceRecord,
        handler: Arc<dyn DeviceHandler>,
    ) -> Result<(), BridgeError> {
        self.insert(record, handler, None)
    }

    /// Register `record` driven by the profile matching its model.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] when the record is invalid.
    pub fn register_profiled(
        &self,
        record: DeviceRecord,
    ) -> Result<Arc<ProfileAdapter>, BridgeError> {
        let adapter = Arc::new(ProfileAdapter::new(&record).with_events(self.events.clone()));
        self.insert(record, adapter.clone(), Some(adapter.clone()))?;
        Ok(adapter)
    }

    fn insert(
        &self,
        record: DeviceRecord,
        handler: Arc<dyn DeviceHandler>,
        profile: Option<Arc<ProfileAdapter>>,
    ) -> Result<(), BridgeError> {
        record.validate()?;
        tracing::info!(device = %record.id, model = %record.model, "device registered");
        let previous = self.write().insert(
            record.id.clone(),
            Entry {
                record,
                handler,
                profile,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(device = %previous.record.id, "replaced existing registration");
        }
        Ok(())
    }

    /// Remove a device. Returns whether it was registered.
    pub fn unregister(&self, id: &DeviceId) -> bool {
        self.write().remove(id).is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<DeviceId, Entry>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<DeviceId, Entry>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.read().get(id).map(|entry| entry.record.clone())
    }

    #[must_use]
    pub fn devices(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> =
            self.read().values().map(|entry| entry.record.clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Identifier of the device using radio address `address`.
    #[must_use]
    pub fn find_by_address(&self, address: BleAddress) -> Option<DeviceId> {
        self.read()
            .values()
            .find(|entry| entry.record.ble_address == Some(address))
            .map(|entry| entry.record.id.clone())
    }

    /// Identifier of the device answering on the local network at `ip`.
    #[must_use]
    pub fn find_by_ip(&self, ip: IpAddr) -> Option<DeviceId> {
        self.read()
            .values()
            .find(|entry| entry.record.lan_address == Some(ip))
            .map(|entry| entry.record.id.clone())
    }

    /// Route a `{ "cmd", "value" }` request to device `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] for unknown devices, otherwise the
    /// dispatcher's error converted into [`BridgeError`].
    pub async fn send_request(
        &self,
        id: &DeviceId,
        request: &Value,
    ) -> Result<Transport, BridgeError> {
        let record = self.device(id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: id.to_string(),
        })?;
        Ok(self.dispatcher.send_request(&record, request).await?)
    }

    /// Carry out `intent` on a profile-driven device.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::UnknownDevice`] when `id` is not registered
    /// with a profile, otherwise the adapter's error.
    pub async fn send_intent(&self, id: &DeviceId, intent: Intent) -> Result<(), IntentError> {
        let (record, adapter) = {
            let registry = self.read();
            let entry = registry.get(id);
            match entry.and_then(|entry| entry.profile.clone().map(|p| (entry.record.clone(), p))) {
                Some(found) => found,
                None => return Err(IntentError::UnknownDevice(id.to_string())),
            }
        };
        adapter.handle_intent(&self.dispatcher, &record, intent).await
    }

    /// The device answered on the local network: enable LAN for it and
    /// remember its address. Returns whether the device is registered.
    pub fn mark_lan_seen(&self, id: &DeviceId, ip: IpAddr) -> bool {
        let mut registry = self.write();
        let Some(entry) = registry.get_mut(id) else {
            tracing::debug!(device = %id, %ip, "unregistered device answered on the local network");
            return false;
        };
        let record = &mut entry.record;
        if !record.lan.is_enabled() {
            tracing::info!(device = %id, "local network control enabled");
        }
        record.lan.activate();
        if record.lan_address != Some(ip) {
            tracing::info!(device = %id, %ip, "local network address updated");
            record.lan_address = Some(ip);
        }
        true
    }

    /// Resolve the device an inbound update belongs to and reconcile it.
    ///
    /// Returns the diff forwarded to the device handler, if any.
    pub fn handle_inbound(&self, update: InboundUpdate) -> Option<ReconciledUpdate> {
        let (id, raw) = match update {
            InboundUpdate::Device { id, raw } => (Some(id), raw),
            InboundUpdate::Address { address, raw } => (self.find_by_address(address), raw),
            InboundUpdate::LanStatus { ip, raw } => (self.find_by_ip(ip), raw),
            InboundUpdate::LanSeen { id, ip } => {
                self.mark_lan_seen(&id, ip);
                return None;
            }
        };
        let Some(id) = id else {
            tracing::debug!(source = %raw.source, "update for an unregistered device");
            return None;
        };

        let (record, handler) = {
            let registry = self.read();
            let Some(entry) = registry.get(&id) else {
                tracing::debug!(
                    device = %id,
                    source = %raw.source,
                    "update for an unregistered device"
                );
                return None;
            };
            (entry.record.clone(), entry.handler.clone())
        };
        self.reconciler.receive_device_update(&record, &raw, handler.as_ref())
    }

    /// Drain `rx` until every sender is gone.
    pub async fn run_inbound(&self, mut rx: mpsc::Receiver<InboundUpdate>) {
        while let Some(update) = rx.recv().await {
            self.handle_inbound(update);
        }
        tracing::debug!("inbound channel closed");
    }
}

/// Sink forwarding decoded advertisements onto the inbound channel.
///
/// Readings are dropped (and logged) when the channel is full.
#[must_use]
pub fn reading_sink(tx: mpsc::Sender<InboundUpdate>) -> ReadingSink {
    Arc::new(move |address, raw| {
        if let Err(err) = tx.try_send(InboundUpdate::Address { address, raw }) {
            tracing::debug!(%address, error = %err, "sensor reading dropped");
        }
    })
}

/// Scan for sensors every `period`, each scan lasting `window`.
///
/// Runs until the surrounding task is aborted.
pub async fn refresh_sensors<S: SensorScanner>(
    scanner: &S,
    sink: ReadingSink,
    period: Duration,
    window: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(err) = scanner.start_discovery(sink.clone()).await {
            tracing::warn!(error = %err, "sensor scan not started");
            continue;
        }
        tokio::time::sleep(window).await;
        if let Err(err) = scanner.stop_discovery().await {
            tracing::warn!(error = %err, "sensor scan not stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::services::WirelessQueue;
    use crate::testing::{
        FakeDispatcher, FakeTransport, RecordingHandler, cloud_device, device_id, full_device,
        lan_ip,
    };
    use hearthlink_domain::command::PowerState;
    use hearthlink_domain::update::{PowerReading, UpdateSource};

    type FakeBridge = Bridge<
        FakeTransport<LanPayload>,
        FakeTransport<CloudPayload>,
        FakeTransport<WirelessPayload>,
    >;

    fn bridge() -> FakeBridge {
        let dispatcher: FakeDispatcher = Dispatcher::new(WirelessQueue::new(Duration::ZERO))
            .with_lan(FakeTransport::new(Transport::Lan, false))
            .with_cloud(FakeTransport::new(Transport::Cloud, false));
        Bridge::new(dispatcher, Reconciler::new(), StateEventBus::new(16))
    }

    fn power_on() -> RawUpdate {
        RawUpdate::from_json(UpdateSource::Cloud, json!({"state": {"onOff": 1}})).unwrap()
    }

    #[test]
    fn should_route_update_by_device_id() {
        let bridge = bridge();
        let handler = Arc::new(RecordingHandler::default());
        bridge.register(cloud_device(), handler.clone()).unwrap();

        let forwarded = bridge.handle_inbound(InboundUpdate::Device {
            id: device_id(),
            raw: power_on(),
        });

        assert!(forwarded.is_some());
        assert_eq!(handler.updates().len(), 1);
    }

    #[test]
    fn should_route_advertisement_by_address() {
        let bridge = bridge();
        let handler = Arc::new(RecordingHandler::default());
        let device = full_device();
        let address = device.ble_address.unwrap();
        bridge.register(device, handler.clone()).unwrap();

        let mut raw = RawUpdate::new(UpdateSource::Wireless);
        raw.battery = Some(87.0);
        bridge.handle_inbound(InboundUpdate::Address { address, raw });

        assert_eq!(handler.updates()[0].battery, Some(87));
    }

    #[test]
    fn should_ignore_update_for_unknown_device() {
        let bridge = bridge();
        let forwarded = bridge.handle_inbound(InboundUpdate::Device {
            id: device_id(),
            raw: power_on(),
        });
        assert!(forwarded.is_none());
    }

    #[test]
    fn should_enable_lan_when_device_answers() {
        let bridge = bridge();
        bridge.register(cloud_device(), Arc::new(RecordingHandler::default())).unwrap();

        bridge.handle_inbound(InboundUpdate::LanSeen {
            id: device_id(),
            ip: lan_ip(),
        });

        let record = bridge.device(&device_id()).unwrap();
        assert!(record.uses(Transport::Lan));
        assert_eq!(record.lan_address, Some(lan_ip()));
        assert_eq!(bridge.find_by_ip(lan_ip()), Some(device_id()));
    }

    #[test]
    fn should_route_lan_status_by_ip() {
        let bridge = bridge();
        let handler = Arc::new(RecordingHandler::default());
        bridge.register(full_device(), handler.clone()).unwrap();

        let raw =
            RawUpdate::from_json(UpdateSource::Lan, json!({"state": {"brightness": 42}})).unwrap();
        bridge.handle_inbound(InboundUpdate::LanStatus { ip: lan_ip(), raw });

        assert_eq!(handler.updates()[0].brightness, Some(42));
    }

    #[tokio::test]
    async fn should_send_request_over_newly_enabled_lan() {
        let bridge = bridge();
        bridge.register(cloud_device(), Arc::new(RecordingHandler::default())).unwrap();
        let request = json!({"cmd": "state", "value": "off"});

        assert_eq!(bridge.send_request(&device_id(), &request).await.unwrap(), Transport::Cloud);

        bridge.mark_lan_seen(&device_id(), lan_ip());
        assert_eq!(bridge.send_request(&device_id(), &request).await.unwrap(), Transport::Lan);
    }

    #[tokio::test]
    async fn should_report_unknown_device_on_request() {
        let bridge = bridge();
        let result = bridge
            .send_request(&device_id(), &json!({"cmd": "state", "value": "on"}))
            .await;
        assert!(matches!(result, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_drive_profiled_device_end_to_end() {
        let bridge = bridge();
        let mut events = bridge.events().subscribe();
        let adapter = bridge.register_profiled(cloud_device()).unwrap();

        bridge
            .send_intent(&device_id(), Intent::SetBrightness(60))
            .await
            .unwrap();
        assert_eq!(adapter.state().brightness, Some(60));

        bridge.handle_inbound(InboundUpdate::Device {
            id: device_id(),
            raw: power_on(),
        });
        let event = events.recv().await.unwrap();
        assert_eq!(adapter.state().power, Some(PowerState::On));
        assert_eq!(event.source, UpdateSource::Cloud);
    }

    #[tokio::test]
    async fn should_reject_intent_for_device_without_profile() {
        let bridge = bridge();
        bridge.register(cloud_device(), Arc::new(RecordingHandler::default())).unwrap();

        let result = bridge.send_intent(&device_id(), Intent::SetActive(true)).await;
        assert!(matches!(result, Err(IntentError::UnknownDevice(_))));
    }

    #[tokio::test]
    async fn should_drain_inbound_channel_until_closed() {
        let bridge = bridge();
        let handler = Arc::new(RecordingHandler::default());
        bridge.register(cloud_device(), handler.clone()).unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(InboundUpdate::Device {
            id: device_id(),
            raw: power_on(),
        })
        .await
        .unwrap();
        drop(tx);
        bridge.run_inbound(rx).await;

        assert_eq!(
            handler.updates()[0].power,
            Some(PowerReading::Single(PowerState::On))
        );
    }

    #[tokio::test]
    async fn should_forward_readings_through_sink() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = reading_sink(tx);
        let address = BleAddress::from_bytes([0xa4, 0xc1, 0x38, 0x5b, 0x0e, 0xdf]);

        sink(address, RawUpdate::new(UpdateSource::Wireless));
        sink(address, RawUpdate::new(UpdateSource::Wireless));

        assert!(matches!(rx.recv().await, Some(InboundUpdate::Address { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[derive(Default)]
    struct CountingScanner {
        starts: AtomicUsize,
        stops: AtomicUsize,
        sinks: Mutex<Vec<ReadingSink>>,
    }

    impl SensorScanner for CountingScanner {
        fn start_discovery(
            &self,
            sink: ReadingSink,
        ) -> impl Future<Output = Result<(), BridgeError>> + Send {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.sinks.lock().unwrap().push(sink);
            async { Ok(()) }
        }

        fn stop_discovery(&self) -> impl Future<Output = Result<(), BridgeError>> + Send {
            self.stops.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_scan_periodically_for_the_window() {
        let scanner = CountingScanner::default();
        let (tx, _rx) = mpsc::channel(4);

        let result = tokio::time::timeout(
            Duration::from_secs(130),
            refresh_sensors(&scanner, reading_sink(tx), Duration::from_secs(60), SCAN_WINDOW),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(scanner.starts.load(Ordering::SeqCst), 3);
        assert_eq!(scanner.stops.load(Ordering::SeqCst), 3);
    }
}
