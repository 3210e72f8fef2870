//! Bridge wired to a real local-network client on loopback, with the cloud
//! and radio replaced by in-memory transports.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use hearthlink_adapter_lan::{LanClient, LanConfig};
use hearthlink_app::bridge::{Bridge, InboundUpdate};
use hearthlink_app::event_bus::StateEventBus;
use hearthlink_app::ports::TransportClient;
use hearthlink_app::services::{Dispatcher, Reconciler, WirelessQueue};
use hearthlink_domain::command::PowerState;
use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::{BleAddress, DeviceId};
use hearthlink_domain::payload::{CloudPayload, WirelessPayload};
use hearthlink_domain::profile::StateChange;
use hearthlink_domain::update::UpdateSource;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEVICE: &str = "1F:80:C5:32:32:36:72:4E";

/// Transport that records what it was asked to send and always fails.
struct Unreachable<P> {
    transport: Transport,
    attempts: Mutex<Vec<P>>,
}

impl<P> Unreachable<P> {
    fn new(transport: Transport) -> Self {
        Self {
            transport,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl<P: Clone + Send + Sync> TransportClient for Unreachable<P> {
    type Payload = P;

    fn transport(&self) -> Transport {
        self.transport
    }

    async fn update_device(&self, _device: &DeviceRecord, payload: &P) -> Result<(), BridgeError> {
        self.attempts.lock().unwrap().push(payload.clone());
        Err(BridgeError::Transport(Box::new(std::io::Error::other("offline"))))
    }
}

type TestBridge =
    Bridge<Arc<LanClient>, Arc<Unreachable<CloudPayload>>, Arc<Unreachable<WirelessPayload>>>;

struct Harness {
    bridge: Arc<TestBridge>,
    lan: Arc<LanClient>,
    cloud: Arc<Unreachable<CloudPayload>>,
    radio: Arc<Unreachable<WirelessPayload>>,
    fake_device: UdpSocket,
}

async fn harness() -> Harness {
    let fake_device = UdpSocket::bind((LOOPBACK, 0)).await.unwrap();
    let lan = Arc::new(
        LanClient::bind(LanConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            listen_port: 0,
            command_port: fake_device.local_addr().unwrap().port(),
            ..LanConfig::default()
        })
        .await
        .unwrap(),
    );
    let cloud = Arc::new(Unreachable::new(Transport::Cloud));
    let radio = Arc::new(Unreachable::new(Transport::Wireless));

    let queue = WirelessQueue::with_timeout(Duration::ZERO, Duration::from_secs(1));
    let dispatcher = Dispatcher::new(queue)
        .with_lan(Arc::clone(&lan))
        .with_cloud(Arc::clone(&cloud))
        .with_wireless(Arc::clone(&radio));
    let bridge = Arc::new(Bridge::new(
        dispatcher,
        Reconciler::new(),
        StateEventBus::new(16),
    ));

    Harness {
        bridge,
        lan,
        cloud,
        radio,
        fake_device,
    }
}

fn light(lan_address: Option<IpAddr>) -> DeviceRecord {
    let id = DeviceId::parse(DEVICE).unwrap();
    let address = BleAddress::from_device_id(&id).unwrap();
    DeviceRecord::builder()
        .id(id)
        .model("H6199")
        .cloud("GD/light", true)
        .lan(lan_address, lan_address.is_some())
        .wireless(address, true)
        .build()
        .unwrap()
}

async fn receive_json(socket: &UdpSocket) -> (Value, std::net::SocketAddr) {
    let mut buf = [0_u8; 512];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    (serde_json::from_slice(&buf[..len]).unwrap(), from)
}

#[tokio::test]
async fn should_control_over_lan_and_reconcile_status_reply() {
    let h = harness().await;
    h.bridge.register_profiled(light(Some(LOOPBACK))).unwrap();
    let mut events = h.bridge.events().subscribe();

    let (tx, rx) = mpsc::channel(8);
    let listener = {
        let lan = Arc::clone(&h.lan);
        tokio::spawn(async move { lan.listen(tx).await })
    };
    let inbound = {
        let bridge = Arc::clone(&h.bridge);
        tokio::spawn(async move { bridge.run_inbound(rx).await })
    };

    let id = DeviceId::parse(DEVICE).unwrap();
    let transport = h
        .bridge
        .send_request(&id, &json!({"cmd": "state", "value": "on"}))
        .await
        .unwrap();
    assert_eq!(transport, Transport::Lan);

    let (command, reply_to) = receive_json(&h.fake_device).await;
    assert_eq!(command, json!({"msg": {"cmd": "turn", "data": {"value": 1}}}));
    assert_eq!(h.cloud.attempts(), 0);
    assert_eq!(h.radio.attempts(), 0);

    h.fake_device
        .send_to(br#"{"msg":{"cmd":"devStatus","data":{"onOff":1}}}"#, reply_to)
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.device, id);
    assert_eq!(event.source, UpdateSource::Lan);
    assert!(event.changes.contains(&StateChange::Power(PowerState::On)));

    listener.abort();
    inbound.abort();
}

#[tokio::test]
async fn should_switch_to_lan_once_device_answers_scan() {
    let h = harness().await;
    h.bridge.register_profiled(light(None)).unwrap();
    let id = DeviceId::parse(DEVICE).unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let listener = {
        let lan = Arc::clone(&h.lan);
        tokio::spawn(async move { lan.listen(tx).await })
    };

    let lan_addr = h.lan.local_addr().unwrap();
    let reply = json!({"msg": {
        "cmd": "scan",
        "data": {"ip": "127.0.0.1", "device": DEVICE, "sku": "H6199"}
    }});
    h.fake_device
        .send_to(&serde_json::to_vec(&reply).unwrap(), (LOOPBACK, lan_addr.port()))
        .await
        .unwrap();

    let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(update, InboundUpdate::LanSeen { .. }));
    assert!(h.bridge.handle_inbound(update).is_none());

    let record = h.bridge.device(&id).unwrap();
    assert!(record.uses(Transport::Lan));
    assert_eq!(record.lan_address, Some(LOOPBACK));

    let transport = h
        .bridge
        .send_request(&id, &json!({"cmd": "state", "value": "off"}))
        .await
        .unwrap();
    assert_eq!(transport, Transport::Lan);
    let (command, _) = receive_json(&h.fake_device).await;
    assert_eq!(command, json!({"msg": {"cmd": "turn", "data": {"value": 0}}}));

    listener.abort();
}

#[tokio::test]
async fn should_fall_through_every_transport_before_giving_up() {
    let h = harness().await;
    h.bridge.register_profiled(light(None)).unwrap();
    let id = DeviceId::parse(DEVICE).unwrap();

    let result = h
        .bridge
        .send_request(&id, &json!({"cmd": "state", "value": "on"}))
        .await;

    assert!(matches!(result, Err(BridgeError::NoConnectionMethod)));
    assert_eq!(h.cloud.attempts(), 1);
    assert_eq!(h.radio.attempts(), 1);
}
