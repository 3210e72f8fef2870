//! # hearthlink-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `TransportClient`: deliver one transport's payload to a device
//!   - `SensorScanner`: passive wireless discovery of sensor readings
//!   - `DeviceHandler`: receive reconciled updates for one device
//! - Provide the use-cases:
//!   - `Dispatcher`: encode a command once and route it LAN → cloud → wireless
//!   - `WirelessQueue`: single-flight, spaced, time-boxed wireless jobs
//!   - `Reconciler`: normalise raw transport updates into a canonical diff
//!   - `ProfileAdapter`: profile-driven device handler
//! - Own the registry and inbound plumbing in the root [`bridge::Bridge`] context
//! - Provide **in-process infrastructure** (state event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hearthlink-domain` only (plus `tokio::sync`/`tokio::time`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bridge;
pub mod error;
pub mod event_bus;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
