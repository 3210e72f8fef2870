//! Wire format of the local UDP protocol.
//!
//! | Direction | Port | `cmd` | `data` |
//! |-----------|------|-------|--------|
//! | request, multicast | 4001 | `scan` | `{"account_topic":"reserve"}` |
//! | reply | 4002 | `scan` | `{"ip","device","sku",…}` |
//! | request, unicast | 4003 | `devStatus` | `{}` |
//! | reply | 4002 | `devStatus` | `{"onOff","brightness","color","colorTemInKelvin"}` |
//! | request, unicast | 4003 | `turn`, `brightness`, `colorwc`, `ptReal` | command arguments |
//!
//! Every message is wrapped as `{"msg":{"cmd":…,"data":…}}`.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use hearthlink_app::bridge::InboundUpdate;
use hearthlink_domain::id::DeviceId;
use hearthlink_domain::payload::LanPayload;
use hearthlink_domain::update::{RawUpdate, UpdateSource};

use crate::error::LanError;

const CMD_SCAN: &str = "scan";
const CMD_STATUS: &str = "devStatus";

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    msg: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    cmd: &'a str,
    data: &'a Value,
}

#[derive(Debug, Deserialize)]
struct Reply {
    msg: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    cmd: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ScanReply {
    device: String,
    ip: Option<String>,
    sku: Option<String>,
}

fn encode(cmd: &str, data: &Value) -> Result<Vec<u8>, LanError> {
    serde_json::to_vec(&Envelope {
        msg: Message { cmd, data },
    })
    .map_err(LanError::Encode)
}

/// Encode a device command.
///
/// # Errors
///
/// Returns [`LanError::Encode`] if the payload data cannot be serialised.
pub fn command(payload: &LanPayload) -> Result<Vec<u8>, LanError> {
    encode(&payload.cmd, &payload.data)
}

/// Encode the multicast discovery request.
///
/// # Errors
///
/// Returns [`LanError::Encode`] if serialisation fails.
pub fn scan_request() -> Result<Vec<u8>, LanError> {
    encode(CMD_SCAN, &json!({"account_topic": "reserve"}))
}

/// Encode a status request.
///
/// # Errors
///
/// Returns [`LanError::Encode`] if serialisation fails.
pub fn status_request() -> Result<Vec<u8>, LanError> {
    encode(CMD_STATUS, &json!({}))
}

/// Decode a datagram received from `from`.
///
/// Scan replies become [`InboundUpdate::LanSeen`], status replies
/// [`InboundUpdate::LanStatus`]; anything else yields `None`.
///
/// # Errors
///
/// Returns [`LanError::PayloadParse`] when the datagram is not a protocol
/// message.
pub fn parse_reply(datagram: &[u8], from: IpAddr) -> Result<Option<InboundUpdate>, LanError> {
    let reply: Reply = serde_json::from_slice(datagram).map_err(LanError::PayloadParse)?;

    match reply.msg.cmd.as_str() {
        CMD_SCAN => {
            let scan: ScanReply =
                serde_json::from_value(reply.msg.data).map_err(LanError::PayloadParse)?;
            let Ok(id) = DeviceId::parse(&scan.device) else {
                return Ok(None);
            };
            let ip = scan
                .ip
                .as_deref()
                .and_then(|ip| ip.parse().ok())
                .unwrap_or(from);
            tracing::debug!(device = %id, %ip, sku = ?scan.sku, "device answered scan");
            Ok(Some(InboundUpdate::LanSeen { id, ip }))
        }
        CMD_STATUS => {
            let raw = RawUpdate::from_json(UpdateSource::Lan, json!({"state": reply.msg.data}))
                .map_err(LanError::PayloadParse)?;
            Ok(Some(InboundUpdate::LanStatus { ip: from, raw }))
        }
        other => {
            tracing::trace!(cmd = other, %from, "ignoring local message");
            Ok(None)
        }
    }
}
