//! Cloud adapter error types.

use hearthlink_domain::error::BridgeError;

/// Errors specific to the cloud adapter.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The device record carries no cloud topic.
    #[error("device has no cloud topic")]
    MissingTopic,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to encode an outgoing message.
    #[error("failed to encode cloud message")]
    Encode(#[source] serde_json::Error),

    /// Failed to parse an incoming payload as JSON.
    #[error("failed to parse cloud payload")]
    PayloadParse(#[source] serde_json::Error),
}

impl CloudError {
    /// Convert into a [`BridgeError::Transport`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> BridgeError {
        BridgeError::Transport(Box::new(self))
    }
}

impl From<CloudError> for BridgeError {
    fn from(err: CloudError) -> Self {
        err.into_domain()
    }
}
