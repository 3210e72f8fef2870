//! [`Radio`] implementation backed by the host Bluetooth stack via btleplug.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use hearthlink_domain::id::BleAddress;

use crate::error::WirelessError;
use crate::radio::{Radio, RadioEvent, RadioLink, RadioState};
use crate::sensor;

const EVENT_BUFFER: usize = 64;
const LOOKUP_WINDOW: Duration = Duration::from_secs(2);

fn to_address(address: BDAddr) -> BleAddress {
    BleAddress::from_bytes(address.into_inner())
}

fn to_state(state: CentralState) -> RadioState {
    match state {
        CentralState::PoweredOn => RadioState::PoweredOn,
        CentralState::PoweredOff => RadioState::PoweredOff,
        CentralState::Unknown => RadioState::Unknown,
    }
}

/// The first Bluetooth adapter of the host.
pub struct BtleplugRadio {
    adapter: Adapter,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugRadio {
    /// Open the first adapter reported by the platform manager.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError::AdapterUnavailable`] when the host has no
    /// adapter, or [`WirelessError::Radio`] when the stack cannot be opened.
    pub async fn first_adapter() -> Result<Self, WirelessError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(WirelessError::AdapterUnavailable)?;

        Ok(Self {
            adapter,
            forwarder: Mutex::new(None),
        })
    }

    async fn known(&self, address: BleAddress) -> Result<Option<Peripheral>, WirelessError> {
        for peripheral in self.adapter.peripherals().await? {
            if to_address(peripheral.address()) == address {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    /// Sensor scans are filtered by service, so a light that was never seen
    /// gets one short unfiltered scan before giving up.
    async fn find(&self, address: BleAddress) -> Result<Peripheral, WirelessError> {
        if let Some(peripheral) = self.known(address).await? {
            return Ok(peripheral);
        }
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(LOOKUP_WINDOW).await;
        let found = self.known(address).await;
        if let Err(err) = self.adapter.stop_scan().await {
            tracing::debug!(%err, "failed to stop lookup scan");
        }
        found?.ok_or_else(|| WirelessError::PeripheralNotFound(address.to_string()))
    }
}

async fn forward(adapter: Adapter, tx: mpsc::Sender<RadioEvent>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(err) => {
            tracing::warn!(%err, "failed to subscribe to radio events");
            return;
        }
    };

    while let Some(event) = events.next().await {
        let event = match event {
            CentralEvent::StateUpdate(state) => RadioEvent::State(to_state(state)),
            CentralEvent::ManufacturerDataAdvertisement { id, manufacturer_data } => {
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                RadioEvent::Advertisement {
                    address: to_address(peripheral.address()),
                    manufacturer_data,
                }
            }
            _ => continue,
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

impl Radio for BtleplugRadio {
    type Link = BtleplugLink;

    async fn events(&self) -> Result<mpsc::Receiver<RadioEvent>, WirelessError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(forward(self.adapter.clone(), tx));

        let previous = self
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(rx)
    }

    async fn state(&self) -> Result<RadioState, WirelessError> {
        Ok(to_state(self.adapter.adapter_state().await?))
    }

    async fn start_scan(&self) -> Result<(), WirelessError> {
        let filter = ScanFilter {
            services: sensor::scan_services(),
        };
        self.adapter.start_scan(filter).await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), WirelessError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, address: BleAddress) -> Result<BtleplugLink, WirelessError> {
        let peripheral = self.find(address).await?;
        peripheral.connect().await?;
        Ok(BtleplugLink { peripheral })
    }

    async fn reset(&self) -> Result<(), WirelessError> {
        let forwarder = self.forwarder.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }

        for peripheral in self.adapter.peripherals().await? {
            if peripheral.is_connected().await.unwrap_or(false)
                && let Err(err) = peripheral.disconnect().await
            {
                tracing::debug!(
                    %err,
                    address = %peripheral.address(),
                    "failed to disconnect during reset"
                );
            }
        }
        Ok(())
    }
}

/// A connected btleplug peripheral.
pub struct BtleplugLink {
    peripheral: Peripheral,
}

impl RadioLink for BtleplugLink {
    async fn characteristics(&self) -> Result<Vec<uuid::Uuid>, WirelessError> {
        self.peripheral.discover_services().await?;
        Ok(self
            .peripheral
            .characteristics()
            .into_iter()
            .map(|characteristic| characteristic.uuid)
            .collect())
    }

    async fn write(&self, characteristic: uuid::Uuid, data: &[u8]) -> Result<(), WirelessError> {
        let characteristics = self.peripheral.characteristics();
        let Some(target) = characteristics.iter().find(|c| c.uuid == characteristic) else {
            return Err(WirelessError::CharacteristicNotFound {
                found: characteristics.iter().map(|c| c.uuid).collect(),
            });
        };
        self.peripheral.write(target, data, WriteType::WithoutResponse).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), WirelessError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
