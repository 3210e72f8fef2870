//! In-memory fakes shared by the service tests.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::{BleAddress, DeviceId};
use hearthlink_domain::payload::{CloudPayload, LanPayload, WirelessPayload};
use hearthlink_domain::update::ReconciledUpdate;

use crate::ports::{DeviceHandler, TransportClient};
use crate::services::Dispatcher;

pub(crate) type FakeDispatcher = Dispatcher<
    FakeTransport<LanPayload>,
    FakeTransport<CloudPayload>,
    FakeTransport<WirelessPayload>,
>;

pub(crate) const DEVICE_ID: &str = "AB:CD:A4:C1:38:5B:0E:DF";

pub(crate) struct FakeTransport<P> {
    transport: Transport,
    fail: bool,
    sent: Mutex<Vec<P>>,
}

impl<P> FakeTransport<P> {
    pub(crate) fn new(transport: Transport, fail: bool) -> Self {
        Self {
            transport,
            fail,
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl<P: Clone> FakeTransport<P> {
    pub(crate) fn sent(&self) -> Vec<P> {
        self.sent.lock().unwrap().clone()
    }
}

impl<P: Clone + Send + Sync> TransportClient for FakeTransport<P> {
    type Payload = P;

    fn transport(&self) -> Transport {
        self.transport
    }

    fn update_device(
        &self,
        _device: &DeviceRecord,
        payload: &P,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send {
        self.sent.lock().unwrap().push(payload.clone());
        let result = if self.fail {
            Err(BridgeError::Transport("unreachable".into()))
        } else {
            Ok(())
        };
        async move { result }
    }
}

#[derive(Default)]
pub(crate) struct RecordingHandler {
    updates: Mutex<Vec<ReconciledUpdate>>,
}

impl RecordingHandler {
    pub(crate) fn updates(&self) -> Vec<ReconciledUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl DeviceHandler for RecordingHandler {
    fn external_update(&self, update: &ReconciledUpdate) -> Result<(), BridgeError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

pub(crate) fn device_id() -> DeviceId {
    DeviceId::parse(DEVICE_ID).unwrap()
}

pub(crate) fn lan_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40))
}

/// Light reachable over every transport.
pub(crate) fn full_device() -> DeviceRecord {
    let id = device_id();
    DeviceRecord::builder()
        .wireless(BleAddress::from_device_id(&id).unwrap(), true)
        .id(id)
        .model("H6199")
        .lan(Some(lan_ip()), true)
        .cloud("GA/topic", true)
        .build()
        .unwrap()
}

/// Light reachable over the cloud only.
pub(crate) fn cloud_device() -> DeviceRecord {
    DeviceRecord::builder()
        .id(device_id())
        .model("H6199")
        .cloud("GA/topic", true)
        .build()
        .unwrap()
}

/// A record for `model` reachable over the cloud and wireless.
pub(crate) fn device_with_model(model: &str) -> DeviceRecord {
    let id = device_id();
    DeviceRecord::builder()
        .wireless(BleAddress::from_device_id(&id).unwrap(), true)
        .id(id)
        .model(model)
        .cloud("GA/topic", true)
        .build()
        .unwrap()
}
