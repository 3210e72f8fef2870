//! Errors raised by the application services.

use std::time::Duration;

use hearthlink_domain::error::{BridgeError, CommandError};
use hearthlink_domain::profile::ProfileError;

/// Outcome of routing a command that reached no device.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The command could not be encoded; no transport was attempted.
    #[error("invalid command")]
    InvalidCommand(#[from] CommandError),

    /// Every usable transport was tried and failed, or none was usable.
    #[error("no connection method available")]
    NoConnectionMethod,
}

impl From<DispatchError> for BridgeError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidCommand(err) => Self::InvalidCommand(err),
            DispatchError::NoConnectionMethod => Self::NoConnectionMethod,
        }
    }
}

/// Failure of a job run through the wireless queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("wireless job timed out after {0:?}")]
    Timeout(Duration),

    #[error("wireless job failed")]
    Job(#[source] BridgeError),
}

/// Failure of a user intent handled by a profile adapter.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The adapter's device is no longer registered.
    #[error("device {0} is not registered")]
    UnknownDevice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_no_connection_method_into_bridge_error() {
        let err: BridgeError = DispatchError::NoConnectionMethod.into();
        assert!(matches!(err, BridgeError::NoConnectionMethod));
    }

    #[test]
    fn should_display_queue_timeout() {
        let err = QueueError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "wireless job timed out after 10s");
    }
}
