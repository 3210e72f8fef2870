//! Wire format of cloud bus messages.
//!
//! Outgoing messages wrap a command in a `msg` envelope:
//!
//! ```json
//! {"msg":{"cmd":"turn","data":{"val":1},"cmdVersion":0,"transaction":"v_1700000000000000","type":1}}
//! ```
//!
//! Incoming account messages are flat status objects keyed by `device`.

use serde::Serialize;
use serde_json::Value;

use hearthlink_app::bridge::InboundUpdate;
use hearthlink_domain::id::DeviceId;
use hearthlink_domain::payload::CloudPayload;
use hearthlink_domain::time::Timestamp;
use hearthlink_domain::update::{RawUpdate, UpdateSource};

use crate::error::CloudError;

const COMMAND_VERSION: u8 = 0;
const STATUS_VERSION: u8 = 2;
const TYPE_COMMAND: u8 = 1;
const TYPE_STATUS: u8 = 0;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    msg: Message<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Message<'a> {
    cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    cmd_version: u8,
    transaction: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_topic: Option<&'a str>,
}

/// Transaction tag: `v_` followed by the time in microseconds.
#[must_use]
pub fn transaction_id(at: Timestamp) -> String {
    format!("v_{}000", at.timestamp_millis())
}

/// Encode a device command.
///
/// # Errors
///
/// Returns [`CloudError::Encode`] if the payload data cannot be serialised.
pub fn command(
    payload: &CloudPayload,
    transaction: &str,
    account_topic: Option<&str>,
) -> Result<Vec<u8>, CloudError> {
    encode(&Envelope {
        msg: Message {
            cmd: &payload.cmd,
            data: Some(&payload.data),
            cmd_version: COMMAND_VERSION,
            transaction,
            kind: TYPE_COMMAND,
            account_topic,
        },
    })
}

/// Encode a status request; the device answers on the account topic.
///
/// # Errors
///
/// Returns [`CloudError::Encode`] if serialisation fails.
pub fn status_request(
    transaction: &str,
    account_topic: Option<&str>,
) -> Result<Vec<u8>, CloudError> {
    encode(&Envelope {
        msg: Message {
            cmd: "status",
            data: None,
            cmd_version: STATUS_VERSION,
            transaction,
            kind: TYPE_STATUS,
            account_topic,
        },
    })
}

fn encode(envelope: &Envelope<'_>) -> Result<Vec<u8>, CloudError> {
    serde_json::to_vec(envelope).map_err(CloudError::Encode)
}

/// Decode an account message into an inbound update.
///
/// Messages without a usable `device` field are not device updates and
/// yield `None`.
///
/// # Errors
///
/// Returns [`CloudError::PayloadParse`] when the payload is not a JSON
/// status object.
pub fn parse_incoming(payload: &[u8]) -> Result<Option<InboundUpdate>, CloudError> {
    let value: Value = serde_json::from_slice(payload).map_err(CloudError::PayloadParse)?;
    let Some(device) = value.get("device").and_then(Value::as_str) else {
        return Ok(None);
    };
    let Ok(id) = DeviceId::parse(device) else {
        tracing::debug!(device, "ignoring message for malformed device id");
        return Ok(None);
    };

    let raw = RawUpdate::from_json(UpdateSource::Cloud, value).map_err(CloudError::PayloadParse)?;
    Ok(Some(InboundUpdate::Device { id, raw }))
}
