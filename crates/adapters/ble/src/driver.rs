//! Wireless driver: owns the radio session and serves control writes and
//! sensor discovery on top of any [`Radio`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use hearthlink_app::ports::{ReadingSink, SensorScanner, TransportClient};
use hearthlink_domain::device::{DeviceRecord, Transport};
use hearthlink_domain::error::BridgeError;
use hearthlink_domain::id::BleAddress;
use hearthlink_domain::payload::WirelessPayload;

use crate::config::BleConfig;
use crate::error::WirelessError;
use crate::radio::{Radio, RadioEvent, RadioLink, RadioState};
use crate::sensor;
use crate::session::{Effect, Phase, SessionEvent, SessionState};

/// Characteristic every controllable device accepts frames on.
pub const CONTROL_CHARACTERISTIC: uuid::Uuid =
    uuid::Uuid::from_u128(0x0001_0203_0405_0607_0809_0a0b_0c0d_1910);

/// State shared between the driver and its event listener task.
struct Shared {
    session: Mutex<SessionState>,
    sink: Mutex<Option<ReadingSink>>,
    power: watch::Sender<Option<RadioState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_sink(&self, sink: Option<ReadingSink>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    fn sink(&self) -> Option<ReadingSink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply `event` and carry out [`Effect::ClearCallback`]; other effects
    /// are returned for the caller.
    fn apply(&self, event: SessionEvent) -> Vec<Effect> {
        let effects = self.session().apply(event);
        if effects.contains(&Effect::ClearCallback) {
            self.set_sink(None);
        }
        effects
    }

    /// Enter the connecting phase if the session allows a write.
    fn begin_connect(&self) -> Result<Vec<Effect>, WirelessError> {
        let mut session = self.session();
        session.check_writable()?;
        Ok(session.apply(SessionEvent::ConnectStarted))
    }

    /// Consume the pending scan resume, unless a new connection took over.
    fn take_resume(&self) -> bool {
        let mut session = self.session();
        if !session.wants_resume() || session.is_connecting() {
            return false;
        }
        session.apply(SessionEvent::ScanResuming);
        true
    }

    fn power_changed(&self, state: RadioState) {
        let effects = self.apply(SessionEvent::Power(state));
        if effects.contains(&Effect::ClearCallback) {
            tracing::warn!(?state, "radio lost power during an operation, session cleared");
        } else {
            tracing::debug!(?state, "radio state changed");
        }
        self.power.send_replace(Some(state));
    }

    fn deliver(&self, address: BleAddress, manufacturer_data: &HashMap<u16, Vec<u8>>) {
        let Some(sink) = self.sink() else {
            return;
        };
        for (company, data) in manufacturer_data {
            match sensor::decode(*company, data) {
                Ok(reading) => {
                    tracing::trace!(%address, ?reading, "sensor advertisement");
                    sink(address, reading.into_raw_update());
                }
                Err(err) => tracing::trace!(%address, %err, "skipping advertisement"),
            }
        }
    }
}

async fn listen(shared: Arc<Shared>, mut events: mpsc::Receiver<RadioEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RadioEvent::State(state) => shared.power_changed(state),
            RadioEvent::Advertisement {
                address,
                manufacturer_data,
            } => shared.deliver(address, &manufacturer_data),
        }
    }
    tracing::debug!("radio event stream closed");
}

/// Driver for the single wireless radio.
///
/// Control writes connect, write one frame and disconnect. A running scan is
/// paused for the connection and resumed after
/// [`BleConfig::resume_scan_delay`]. Writes are not serialised here; callers
/// go through the wireless job queue.
pub struct WirelessDriver<R: Radio> {
    radio: Arc<R>,
    config: BleConfig,
    shared: Arc<Shared>,
}

impl<R: Radio> WirelessDriver<R> {
    /// Subscribe to `radio` and spawn the event listener.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError`] when the radio cannot report events or its
    /// state.
    pub async fn start(radio: Arc<R>, config: BleConfig) -> Result<Self, WirelessError> {
        let events = radio.events().await?;
        let initial = radio.state().await?;

        let (power, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            session: Mutex::default(),
            sink: Mutex::default(),
            power,
            listener: Mutex::default(),
        });
        shared.power_changed(initial);

        let listener = tokio::spawn(listen(Arc::clone(&shared), events));
        *shared.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        tracing::info!(state = ?initial, "wireless driver started");

        Ok(Self { radio, config, shared })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.session().phase()
    }

    #[must_use]
    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    /// Wait until the radio reports it is powered on.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError::AdapterUnavailable`] on timeout or after
    /// shutdown.
    pub async fn wait_for_power_on(&self, timeout: Duration) -> Result<(), WirelessError> {
        if self.shared.session().is_shut_down() {
            return Err(WirelessError::AdapterUnavailable);
        }
        let mut power = self.shared.power.subscribe();
        let powered_on = power.wait_for(|state| *state == Some(RadioState::PoweredOn));
        let powered = tokio::time::timeout(timeout, powered_on)
            .await
            .is_ok_and(|result| result.is_ok());

        if powered && !self.shared.session().is_shut_down() {
            Ok(())
        } else {
            Err(WirelessError::AdapterUnavailable)
        }
    }

    /// Write `payload` to the control characteristic of `device`.
    ///
    /// The radio work runs on its own task. Dropping the returned future
    /// (a queue timeout, for instance) does not interrupt it: the link is
    /// still closed and the session released once the task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError`] when the session is not ready, the device
    /// cannot be reached or the write does not complete in time.
    #[tracing::instrument(skip(self, device, payload), fields(device = %device.id))]
    pub async fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &WirelessPayload,
    ) -> Result<(), WirelessError> {
        let address = device.ble_address.ok_or(WirelessError::MissingAddress)?;
        let pause_scan = self.shared.begin_connect()?.contains(&Effect::StopScan);

        let job = tokio::spawn(write_frame(
            Arc::clone(&self.radio),
            Arc::clone(&self.shared),
            self.config.clone(),
            address,
            payload.to_frame(),
            pause_scan,
        ));
        job.await.unwrap_or_else(|err| {
            tracing::error!(%address, %err, "wireless write task failed");
            Err(WirelessError::Aborted)
        })
    }

    /// Start passive scanning and deliver decoded sensor readings to `sink`.
    ///
    /// Does nothing while a scan or connection is already running.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError::AdapterUnavailable`] after shutdown or when
    /// the radio does not power on in time, or the radio's error when the
    /// scan cannot start.
    pub async fn start_discovery(&self, sink: ReadingSink) -> Result<(), WirelessError> {
        {
            let session = self.shared.session();
            if session.is_shut_down() {
                return Err(WirelessError::AdapterUnavailable);
            }
            if session.is_scanning() || session.is_connecting() {
                tracing::debug!(phase = ?session.phase(), "discovery already active or radio busy");
                return Ok(());
            }
        }

        self.wait_for_power_on(self.config.power_on_timeout()).await?;
        self.shared.set_sink(Some(sink));

        if let Err(err) = self.radio.start_scan().await {
            self.shared.set_sink(None);
            if err.is_native_crash() {
                tracing::error!(%err, "native radio driver failure, disabling wireless transport");
                shut_down(self.radio.as_ref(), &self.shared).await;
            }
            return Err(err);
        }
        self.shared.apply(SessionEvent::ScanStarted);
        tracing::debug!("discovery started");
        Ok(())
    }

    /// Stop scanning and drop the sink. Stopping an idle radio is fine.
    pub async fn stop_discovery(&self) {
        self.shared.set_sink(None);
        let was_scanning = {
            let mut session = self.shared.session();
            let scanning = session.is_scanning();
            session.apply(SessionEvent::ScanStopped);
            scanning
        };

        if was_scanning && let Err(err) = self.radio.stop_scan().await {
            tracing::debug!(%err, "scan already stopped");
        }
    }

    /// Stop everything and refuse further operations. Safe to call twice.
    pub async fn shutdown(&self) {
        shut_down(self.radio.as_ref(), &self.shared).await;
    }
}

/// One control write, from pausing the scan to releasing the session.
async fn write_frame<R: Radio>(
    radio: Arc<R>,
    shared: Arc<Shared>,
    config: BleConfig,
    address: BleAddress,
    frame: Vec<u8>,
    pause_scan: bool,
) -> Result<(), WirelessError> {
    if pause_scan && let Err(err) = radio.stop_scan().await {
        tracing::warn!(%err, "failed to pause scan before connecting");
    }

    let result = connect_and_write(radio.as_ref(), &shared, &config, address, &frame).await;

    if shared.apply(SessionEvent::ConnectionClosed).contains(&Effect::ResumeScan) {
        schedule_resume(Arc::clone(&radio), Arc::clone(&shared), config.resume_scan_delay());
    }

    match &result {
        Ok(()) => tracing::debug!(%address, "control frame written"),
        Err(err) if err.is_native_crash() => {
            tracing::error!(%err, "native radio driver failure, disabling wireless transport");
            shut_down(radio.as_ref(), &shared).await;
        }
        Err(err) => tracing::warn!(%address, %err, "wireless write failed"),
    }
    result
}

async fn connect_and_write<R: Radio>(
    radio: &R,
    shared: &Shared,
    config: &BleConfig,
    address: BleAddress,
    frame: &[u8],
) -> Result<(), WirelessError> {
    let connect_timeout = config.connect_timeout();
    let link = tokio::time::timeout(connect_timeout, radio.connect(address))
        .await
        .map_err(|_| WirelessError::ConnectionTimeout(connect_timeout))??;
    shared.apply(SessionEvent::Connected(address));

    let result = write_control(&link, config, frame).await;

    // The link is closed whatever happened to the write.
    if let Err(err) = link.disconnect().await {
        tracing::warn!(%address, %err, "failed to disconnect");
    }
    result
}

async fn write_control<L: RadioLink>(
    link: &L,
    config: &BleConfig,
    frame: &[u8],
) -> Result<(), WirelessError> {
    let found = link.characteristics().await?;
    if !found.contains(&CONTROL_CHARACTERISTIC) {
        tracing::warn!(?found, "device does not expose the control characteristic");
        return Err(WirelessError::CharacteristicNotFound { found });
    }

    let write_timeout = config.write_timeout();
    tokio::time::timeout(write_timeout, link.write(CONTROL_CHARACTERISTIC, frame))
        .await
        .map_err(|_| WirelessError::WriteTimeout(write_timeout))??;

    tokio::time::sleep(config.post_write_settle()).await;
    Ok(())
}

fn schedule_resume<R: Radio>(radio: Arc<R>, shared: Arc<Shared>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !shared.take_resume() {
            return;
        }
        match radio.start_scan().await {
            Ok(()) => {
                shared.apply(SessionEvent::ScanStarted);
                tracing::debug!("scan resumed");
            }
            Err(err) => tracing::warn!(%err, "failed to resume scan"),
        }
    });
}

async fn shut_down<R: Radio>(radio: &R, shared: &Shared) {
    let was_scanning = {
        let mut session = shared.session();
        if session.is_shut_down() {
            return;
        }
        let scanning = session.is_scanning();
        session.apply(SessionEvent::Shutdown);
        scanning
    };
    shared.set_sink(None);

    let listener = shared.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(listener) = listener {
        listener.abort();
    }
    if was_scanning && let Err(err) = radio.stop_scan().await {
        tracing::debug!(%err, "failed to stop scan during shutdown");
    }
    if let Err(err) = radio.reset().await {
        tracing::warn!(%err, "failed to reset radio");
    }
    tracing::info!("wireless driver shut down");
}

impl<R: Radio> TransportClient for WirelessDriver<R> {
    type Payload = WirelessPayload;

    fn transport(&self) -> Transport {
        Transport::Wireless
    }

    async fn update_device(
        &self,
        device: &DeviceRecord,
        payload: &WirelessPayload,
    ) -> Result<(), BridgeError> {
        WirelessDriver::update_device(self, device, payload)
            .await
            .map_err(WirelessError::into_domain)
    }
}

impl<R: Radio> SensorScanner for WirelessDriver<R> {
    async fn start_discovery(&self, sink: ReadingSink) -> Result<(), BridgeError> {
        WirelessDriver::start_discovery(self, sink)
            .await
            .map_err(WirelessError::into_domain)
    }

    async fn stop_discovery(&self) -> Result<(), BridgeError> {
        WirelessDriver::stop_discovery(self).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hearthlink_app::error::QueueError;
    use hearthlink_app::services::WirelessQueue;
    use hearthlink_domain::id::DeviceId;
    use hearthlink_domain::update::RawUpdate;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        StartScan,
        StopScan,
        Connect(BleAddress),
        Write(uuid::Uuid, Vec<u8>),
        Disconnect,
        Reset,
    }

    type CallLog = Arc<Mutex<Vec<Call>>>;

    struct FakeRadio {
        events: Mutex<Option<mpsc::Receiver<RadioEvent>>>,
        initial: RadioState,
        characteristics: Vec<uuid::Uuid>,
        hang_connect: bool,
        connect_delay: Duration,
        write_error: Option<&'static str>,
        calls: CallLog,
    }

    impl FakeRadio {
        fn new(initial: RadioState) -> (Self, mpsc::Sender<RadioEvent>) {
            let (tx, rx) = mpsc::channel(16);
            let radio = Self {
                events: Mutex::new(Some(rx)),
                initial,
                characteristics: vec![uuid::Uuid::nil(), CONTROL_CHARACTERISTIC],
                hang_connect: false,
                connect_delay: Duration::ZERO,
                write_error: None,
                calls: CallLog::default(),
            };
            (radio, tx)
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct FakeLink {
        characteristics: Vec<uuid::Uuid>,
        write_error: Option<&'static str>,
        calls: CallLog,
    }

    impl Radio for FakeRadio {
        type Link = FakeLink;

        async fn events(&self) -> Result<mpsc::Receiver<RadioEvent>, WirelessError> {
            self.events.lock().unwrap().take().ok_or(WirelessError::AdapterUnavailable)
        }

        async fn state(&self) -> Result<RadioState, WirelessError> {
            Ok(self.initial)
        }

        async fn start_scan(&self) -> Result<(), WirelessError> {
            self.record(Call::StartScan);
            Ok(())
        }

        async fn stop_scan(&self) -> Result<(), WirelessError> {
            self.record(Call::StopScan);
            Ok(())
        }

        async fn connect(&self, address: BleAddress) -> Result<FakeLink, WirelessError> {
            self.record(Call::Connect(address));
            if self.hang_connect {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.connect_delay).await;
            Ok(FakeLink {
                characteristics: self.characteristics.clone(),
                write_error: self.write_error,
                calls: Arc::clone(&self.calls),
            })
        }

        async fn reset(&self) -> Result<(), WirelessError> {
            self.record(Call::Reset);
            Ok(())
        }
    }

    impl RadioLink for FakeLink {
        async fn characteristics(&self) -> Result<Vec<uuid::Uuid>, WirelessError> {
            Ok(self.characteristics.clone())
        }

        async fn write(
            &self,
            characteristic: uuid::Uuid,
            data: &[u8],
        ) -> Result<(), WirelessError> {
            self.calls.lock().unwrap().push(Call::Write(characteristic, data.to_vec()));
            match self.write_error {
                Some(message) => Err(WirelessError::Radio(btleplug::Error::Other(message.into()))),
                None => Ok(()),
            }
        }

        async fn disconnect(&self) -> Result<(), WirelessError> {
            self.calls.lock().unwrap().push(Call::Disconnect);
            Ok(())
        }
    }

    fn address() -> BleAddress {
        BleAddress::from_bytes([0xa4, 0xc1, 0x38, 0x5b, 0x0e, 0xdf])
    }

    fn device() -> DeviceRecord {
        DeviceRecord::builder()
            .id(DeviceId::parse("AB:CD:A4:C1:38:5B:0E:DF").unwrap())
            .model("H6199")
            .wireless(address(), true)
            .build()
            .unwrap()
    }

    fn turn_on() -> WirelessPayload {
        WirelessPayload::Opcode { cmd: 0x01, data: vec![0x01] }
    }

    type Readings = Arc<Mutex<Vec<(BleAddress, RawUpdate)>>>;

    fn recording_sink() -> (ReadingSink, Readings) {
        let readings = Readings::default();
        let captured = Arc::clone(&readings);
        let sink: ReadingSink = Arc::new(move |address: BleAddress, raw: RawUpdate| {
            captured.lock().unwrap().push((address, raw));
        });
        (sink, readings)
    }

    async fn driver(radio: FakeRadio) -> (WirelessDriver<FakeRadio>, Arc<FakeRadio>) {
        let radio = Arc::new(radio);
        let driver = WirelessDriver::start(Arc::clone(&radio), BleConfig::default()).await.unwrap();
        (driver, radio)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_write_frame_to_control_characteristic() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, radio) = driver(radio).await;

        driver.update_device(&device(), &turn_on()).await.unwrap();

        assert_eq!(
            radio.calls(),
            vec![
                Call::Connect(address()),
                Call::Write(CONTROL_CHARACTERISTIC, turn_on().to_frame()),
                Call::Disconnect,
            ]
        );
        assert_eq!(driver.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn should_pause_scan_while_connected_and_resume_after() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, radio) = driver(radio).await;
        let (sink, _) = recording_sink();

        driver.start_discovery(sink).await.unwrap();
        driver.update_device(&device(), &turn_on()).await.unwrap();
        assert_eq!(driver.phase(), Phase::Ready);

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(radio.calls().first(), Some(&Call::StartScan));
        assert_eq!(radio.calls().get(1), Some(&Call::StopScan));
        assert_eq!(radio.calls().last(), Some(&Call::StartScan));
        assert_eq!(driver.phase(), Phase::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_resume_scan_stopped_during_connection() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, radio) = driver(radio).await;
        let (sink, _) = recording_sink();

        driver.start_discovery(sink).await.unwrap();
        driver.update_device(&device(), &turn_on()).await.unwrap();
        driver.stop_discovery().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let starts = radio.calls().iter().filter(|call| **call == Call::StartScan).count();
        assert_eq!(starts, 1);
        assert_eq!(driver.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_missing_characteristic_and_still_disconnect() {
        let (mut radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        radio.characteristics = vec![uuid::Uuid::nil()];
        let (driver, radio) = driver(radio).await;

        let err = driver.update_device(&device(), &turn_on()).await.unwrap_err();

        assert!(matches!(
            err,
            WirelessError::CharacteristicNotFound { ref found } if found.len() == 1
        ));
        assert_eq!(radio.calls().last(), Some(&Call::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_hanging_connect() {
        let (mut radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        radio.hang_connect = true;
        let (driver, _radio) = driver(radio).await;

        let err = driver.update_device(&device(), &turn_on()).await.unwrap_err();

        assert!(matches!(
            err,
            WirelessError::ConnectionTimeout(timeout) if timeout == Duration::from_secs(10)
        ));
        assert_eq!(driver.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn should_release_session_when_queue_gives_up_mid_write() {
        let (mut radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        radio.connect_delay = Duration::from_millis(9_950);
        let (driver, radio) = driver(radio).await;
        let queue = WirelessQueue::new(Duration::ZERO);

        let first = queue
            .run(TransportClient::update_device(&driver, &device(), &turn_on()))
            .await;
        assert!(matches!(first, Err(QueueError::Timeout(_))));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(driver.phase(), Phase::Ready);
        assert_eq!(radio.calls().last(), Some(&Call::Disconnect));

        driver.update_device(&device(), &turn_on()).await.unwrap();
        let writes = radio.calls().iter().filter(|call| matches!(call, Call::Write(..))).count();
        assert_eq!(writes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_resume_scan_after_abandoned_write() {
        let (mut radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        radio.connect_delay = Duration::from_millis(9_950);
        let (driver, radio) = driver(radio).await;
        let (sink, _) = recording_sink();
        driver.start_discovery(sink).await.unwrap();

        let (device, command) = (device(), turn_on());
        let write = driver.update_device(&device, &command);
        assert!(tokio::time::timeout(Duration::from_secs(1), write).await.is_err());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(radio.calls().last(), Some(&Call::StartScan));
        assert_eq!(driver.phase(), Phase::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_write_before_power_on() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOff);
        let (driver, radio) = driver(radio).await;

        let err = driver.update_device(&device(), &turn_on()).await.unwrap_err();

        assert!(matches!(err, WirelessError::AdapterUnavailable));
        assert!(radio.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_require_radio_address() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, _radio) = driver(radio).await;
        let cloud_only = DeviceRecord::builder()
            .id(DeviceId::parse("AB:CD:A4:C1:38:5B:0E:DF").unwrap())
            .model("H6199")
            .cloud("GA/abc", true)
            .build()
            .unwrap();

        let err = driver.update_device(&cloud_only, &turn_on()).await.unwrap_err();

        assert!(matches!(err, WirelessError::MissingAddress));
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_for_power_on_event() {
        let (radio, events) = FakeRadio::new(RadioState::PoweredOff);
        let (driver, _radio) = driver(radio).await;
        assert_eq!(driver.phase(), Phase::PoweringOn);

        events.send(RadioEvent::State(RadioState::PoweredOn)).await.unwrap();

        driver.wait_for_power_on(Duration::from_secs(5)).await.unwrap();
        assert_eq!(driver.phase(), Phase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_waiting_for_power() {
        let (radio, _events) = FakeRadio::new(RadioState::Unknown);
        let (driver, _radio) = driver(radio).await;

        let err = driver.wait_for_power_on(Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, WirelessError::AdapterUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn should_start_discovery_once() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, radio) = driver(radio).await;
        let (sink, _) = recording_sink();

        driver.start_discovery(Arc::clone(&sink)).await.unwrap();
        driver.start_discovery(sink).await.unwrap();

        assert_eq!(radio.calls(), vec![Call::StartScan]);
        assert_eq!(driver.phase(), Phase::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn should_deliver_decoded_readings_and_skip_unknown_data() {
        let (radio, events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, _radio) = driver(radio).await;
        let (sink, readings) = recording_sink();
        driver.start_discovery(sink).await.unwrap();

        let known = HashMap::from([(
            sensor::COMPANY_H507X,
            vec![0x00, 0x03, 0x94, 0x47, 0x5A, 0x00],
        )]);
        let unknown = HashMap::from([(0x004C, vec![0x02, 0x15])]);
        events
            .send(RadioEvent::Advertisement {
                address: address(),
                manufacturer_data: unknown,
            })
            .await
            .unwrap();
        events
            .send(RadioEvent::Advertisement {
                address: address(),
                manufacturer_data: known,
            })
            .await
            .unwrap();
        settle().await;

        let readings = readings.lock().unwrap().clone();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].0, address());
        assert_eq!(readings[0].1.temperature, Some(2340.0));
        assert_eq!(readings[0].1.battery, Some(90.0));
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_sink_on_power_loss() {
        let (radio, events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, _radio) = driver(radio).await;
        let (sink, readings) = recording_sink();
        driver.start_discovery(sink).await.unwrap();

        events.send(RadioEvent::State(RadioState::PoweredOff)).await.unwrap();
        events
            .send(RadioEvent::Advertisement {
                address: address(),
                manufacturer_data: HashMap::from([(
                    sensor::COMPANY_H507X,
                    vec![0x00, 0x03, 0x94, 0x47, 0x5A, 0x00],
                )]),
            })
            .await
            .unwrap();
        settle().await;

        assert!(readings.lock().unwrap().is_empty());
        assert_eq!(driver.phase(), Phase::PoweringOn);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_everything_after_shutdown_during_discovery() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, radio) = driver(radio).await;
        let (sink, _) = recording_sink();
        driver.start_discovery(Arc::clone(&sink)).await.unwrap();

        driver.shutdown().await;
        driver.shutdown().await;

        assert!(matches!(
            driver.update_device(&device(), &turn_on()).await,
            Err(WirelessError::AdapterUnavailable)
        ));
        assert!(matches!(
            driver.start_discovery(sink).await,
            Err(WirelessError::AdapterUnavailable)
        ));
        assert_eq!(radio.calls(), vec![Call::StartScan, Call::StopScan, Call::Reset]);
        assert_eq!(driver.phase(), Phase::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn should_disable_after_native_crash() {
        let (mut radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        radio.write_error = Some("dlopen failed: ERR_DLOPEN_FAILED");
        let (driver, _radio) = driver(radio).await;

        let err = driver.update_device(&device(), &turn_on()).await.unwrap_err();

        assert!(err.is_native_crash());
        assert_eq!(driver.phase(), Phase::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn should_serve_transport_port() {
        let (radio, _events) = FakeRadio::new(RadioState::PoweredOn);
        let (driver, _radio) = driver(radio).await;

        assert_eq!(TransportClient::transport(&driver), Transport::Wireless);
        let result = TransportClient::update_device(&driver, &device(), &turn_on()).await;
        assert!(result.is_ok());
    }
}
