//! Wireless adapter error types.

use std::time::Duration;

use hearthlink_domain::error::BridgeError;

/// Substrings of radio errors that mean the native driver is unusable for
/// the rest of the process.
const NATIVE_CRASH_SIGNATURES: &[&str] =
    &["ERR_DLOPEN_FAILED", "ENODEV", "SIGSEGV", "Segmentation fault"];

/// Errors specific to the wireless adapter.
#[derive(Debug, thiserror::Error)]
pub enum WirelessError {
    /// The radio is not powered on, or the driver was shut down.
    #[error("wireless adapter unavailable")]
    AdapterUnavailable,

    /// Another connection is in progress.
    #[error("wireless adapter busy")]
    Busy,

    /// The device record carries no radio address.
    #[error("device has no wireless address")]
    MissingAddress,

    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The device does not expose the control characteristic.
    #[error("control characteristic not found ({} characteristics discovered)", found.len())]
    CharacteristicNotFound {
        /// Characteristics the device did expose.
        found: Vec<uuid::Uuid>,
    },

    /// The radio never reported the peripheral.
    #[error("peripheral {0} not found")]
    PeripheralNotFound(String),

    /// The write task ended without reporting a result.
    #[error("wireless write aborted")]
    Aborted,

    /// The native driver crashed; wireless is disabled until restart.
    #[error("native radio driver failure: {0}")]
    NativeCrash(String),

    /// BLE radio operation failed.
    #[error("radio error")]
    Radio(#[from] btleplug::Error),
}

impl WirelessError {
    /// Whether this error carries a native-crash signature.
    #[must_use]
    pub fn is_native_crash(&self) -> bool {
        match self {
            Self::NativeCrash(_) => true,
            Self::Radio(err) => {
                let message = err.to_string();
                NATIVE_CRASH_SIGNATURES.iter().any(|sig| message.contains(sig))
            }
            _ => false,
        }
    }

    /// Convert into a [`BridgeError::Transport`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> BridgeError {
        BridgeError::Transport(Box::new(self))
    }
}

impl From<WirelessError> for BridgeError {
    fn from(err: WirelessError) -> Self {
        err.into_domain()
    }
}

/// Details about why a sensor advertisement could not be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadParseError {
    /// The manufacturer identifier is not one we know how to decode.
    #[error("unsupported manufacturer 0x{0:04X}")]
    UnknownManufacturer(u16),

    /// The payload length does not match any format for the manufacturer.
    #[error("unexpected payload length {actual} for manufacturer 0x{manufacturer:04X}")]
    UnexpectedLength {
        manufacturer: u16,
        actual: usize,
    },
}
