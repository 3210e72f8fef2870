//! # hearthlink-domain
//!
//! Pure domain model for the hearthlink device bridge.
//!
//! ## Responsibilities
//! - Foundational types: device identifiers, wireless addresses, error conventions, timestamps
//! - Describe **device records**: which transports reach a device and how
//! - Define **semantic commands** and parse them from wire requests
//! - Encode commands into per-transport **payloads** (the codec)
//! - Model **raw updates** pushed by transports and the canonical **reconciled** diff
//! - Describe per-model behaviour as **device profiles**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Transports and the dispatcher live behind traits in the `app` crate.

pub mod error;
pub mod id;
pub mod time;

pub mod codec;
pub mod command;
pub mod device;
pub mod models;
pub mod payload;
pub mod profile;
pub mod update;
