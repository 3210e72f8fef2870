//! # hearthlink-adapter-lan
//!
//! Local-network transport over the devices' UDP JSON protocol.
//!
//! ## How it works
//!
//! A single socket bound to the listen port sends discovery scans, status
//! polls and commands, and receives every reply. Scan replies tell the
//! bridge a device is reachable locally (and at which address); status
//! replies are decoded into raw updates for the reconciler.
//!
//! See [`message`] for the wire format.
//!
//! ## Dependency rule
//!
//! Depends on `hearthlink-app` (ports) and `hearthlink-domain` only.

mod client;
mod config;
mod error;
pub mod message;

pub use client::LanClient;
pub use config::{LanConfig, MIN_REFRESH_SECS};
pub use error::LanError;
