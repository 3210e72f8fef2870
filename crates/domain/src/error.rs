//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`BridgeError`] at port boundaries via `#[from]` or an explicit
//! `into_domain()`.

/// Top-level error shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A semantic command could not be understood or encoded.
    #[error("invalid command")]
    InvalidCommand(#[from] CommandError),

    /// Domain invariants were violated while building a value.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced device does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Every applicable transport was tried and none accepted the command.
    #[error("no connection method available")]
    NoConnectionMethod,

    /// A transport adapter failed. The boxed error carries the details.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Reasons a semantic command is rejected before any transport is touched.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    /// The `cmd` tag names no known command kind.
    #[error("unknown command kind {0:?}")]
    UnknownKind(String),

    /// The `value` does not have the shape the command kind expects.
    #[error("invalid value for command {kind:?}: {reason}")]
    InvalidValue {
        /// Command kind the value was supplied for.
        kind: &'static str,
        /// Human-readable explanation.
        reason: &'static str,
    },

    /// A pre-encoded code is not valid base64.
    #[error("command code is not valid base64")]
    InvalidCode,
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A device identifier was empty.
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// A device model identifier was empty.
    #[error("device model must not be empty")]
    EmptyModel,

    /// A wireless address could not be parsed.
    #[error("invalid wireless address {0:?}")]
    InvalidAddress(String),

    /// A transport was enabled without the device being capable of it.
    #[error("{0} transport enabled without capability")]
    TransportNotCapable(&'static str),
}

/// Lookup failure for a keyed resource.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of resource (e.g. `"Device"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}
