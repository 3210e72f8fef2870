//! # hearthlink-adapter-ble
//!
//! Wireless transport: writes control frames to devices over BLE and
//! passively decodes thermo-hygrometer advertisements.
//!
//! ## How it works
//!
//! [`WirelessDriver`] owns the single radio session. Its state lives in a
//! pure state machine ([`session::SessionState`]) fed by radio events and by
//! the driver's own operations. A control write pauses any running scan,
//! connects, writes one frame to [`CONTROL_CHARACTERISTIC`] without
//! response, disconnects and resumes the scan after a short delay.
//!
//! The radio itself sits behind the [`radio::Radio`] trait so the driver can
//! be exercised without hardware; [`BtleplugRadio`] is the production
//! implementation.
//!
//! ## Supported sensor advertisements
//!
//! | Company | Payload length | Models | Encoding |
//! |---------|----------------|--------|----------|
//! | `0xEC88` | 6 bytes | H5072, H5075 | packed 24-bit big-endian |
//! | `0xEC88` | 7 bytes | H5074 | little-endian hundredths |
//! | `0x0001` | 9 bytes | H5179 | little-endian hundredths |
//!
//! ## Dependency rule
//!
//! Depends on `hearthlink-app` (ports) and `hearthlink-domain` only.

mod btleplug_radio;
mod config;
mod driver;
mod error;
pub mod radio;
pub mod sensor;
pub mod session;

pub use btleplug_radio::{BtleplugLink, BtleplugRadio};
pub use config::{BleConfig, MIN_REFRESH_SECS};
pub use driver::{CONTROL_CHARACTERISTIC, WirelessDriver};
pub use error::{PayloadParseError, WirelessError};

/// Driver running on the host's Bluetooth stack.
pub type BleDriver = WirelessDriver<BtleplugRadio>;
