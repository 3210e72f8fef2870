//! Radio abstraction the driver runs on.
//!
//! [`Radio`] is implemented by [`crate::BtleplugRadio`] for real hardware and
//! by an in-memory fake in the driver tests.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::mpsc;

use hearthlink_domain::id::BleAddress;

use crate::error::WirelessError;

/// Power state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Unknown,
    PoweredOn,
    PoweredOff,
}

/// Something the radio reported asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    State(RadioState),
    /// Manufacturer data advertised by a peripheral, keyed by company id.
    Advertisement {
        address: BleAddress,
        manufacturer_data: HashMap<u16, Vec<u8>>,
    },
}

/// A single radio adapter.
pub trait Radio: Send + Sync + 'static {
    type Link: RadioLink + 'static;

    /// Subscribe to radio events. Called once per driver.
    fn events(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<RadioEvent>, WirelessError>> + Send;

    fn state(&self) -> impl Future<Output = Result<RadioState, WirelessError>> + Send;

    /// Start a passive scan for manufacturer advertisements.
    fn start_scan(&self) -> impl Future<Output = Result<(), WirelessError>> + Send;

    fn stop_scan(&self) -> impl Future<Output = Result<(), WirelessError>> + Send;

    /// Connect to the peripheral at `address`.
    fn connect(
        &self,
        address: BleAddress,
    ) -> impl Future<Output = Result<Self::Link, WirelessError>> + Send;

    /// Drop every subscription and connection.
    fn reset(&self) -> impl Future<Output = Result<(), WirelessError>> + Send;
}

/// An open connection to one peripheral.
pub trait RadioLink: Send + Sync {
    /// Discover services and list every characteristic.
    fn characteristics(
        &self,
    ) -> impl Future<Output = Result<Vec<uuid::Uuid>, WirelessError>> + Send;

    /// Write `data` to `characteristic` without waiting for a response.
    fn write(
        &self,
        characteristic: uuid::Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), WirelessError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), WirelessError>> + Send;
}
