//! # hearthlink-adapter-cloud
//!
//! Cloud transport over the vendor MQTT bus.
//!
//! ## How it works
//!
//! Commands are published to each device's own topic wrapped in a `msg`
//! envelope. Devices report their state on the account topic; every status
//! message carrying a `device` field is decoded into a raw update and pushed
//! onto the bridge's inbound channel.
//!
//! The connection is owned by a rumqttc event loop task. It reconnects on
//! its own and re-subscribes to the account topic after every `CONNACK`.
//!
//! ## Dependency rule
//!
//! Depends on `hearthlink-app` (ports) and `hearthlink-domain` only.

mod client;
mod config;
mod error;
pub mod message;

pub use client::CloudClient;
pub use config::{CloudConfig, MIN_REFRESH_SECS};
pub use error::CloudError;
