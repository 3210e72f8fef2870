//! Local-network adapter error types.

use hearthlink_domain::error::BridgeError;

/// Errors specific to the local-network adapter.
#[derive(Debug, thiserror::Error)]
pub enum LanError {
    /// The device record carries no network address.
    #[error("device has no local network address")]
    MissingAddress,

    #[error("socket error")]
    Io(#[from] std::io::Error),

    #[error("failed to encode local message")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse local reply")]
    PayloadParse(#[source] serde_json::Error),
}

impl LanError {
    /// Convert into a [`BridgeError::Transport`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> BridgeError {
        BridgeError::Transport(Box::new(self))
    }
}

impl From<LanError> for BridgeError {
    fn from(err: LanError) -> Self {
        err.into_domain()
    }
}
