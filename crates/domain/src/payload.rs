//! Transport payloads produced by the codec.
//!
//! The dispatcher treats these as opaque: it only routes them to the
//! transport they were built for.

use serde::Serialize;
use serde_json::Value;

use crate::codec::frame;

/// Cloud message body: `{ cmd, data }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudPayload {
    pub cmd: String,
    pub data: Value,
}

impl CloudPayload {
    #[must_use]
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
        }
    }
}

/// Local-network message body: `{ cmd, data }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanPayload {
    pub cmd: String,
    pub data: Value,
}

impl LanPayload {
    #[must_use]
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
        }
    }
}

/// Wireless write payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirelessPayload {
    /// Opcode with arguments, framed as `0x33 cmd data…` plus checksum.
    Opcode { cmd: u8, data: Vec<u8> },
    /// A complete pre-encoded frame.
    Raw(Vec<u8>),
}

impl WirelessPayload {
    /// Bytes written to the control characteristic.
    #[must_use]
    pub fn to_frame(&self) -> Vec<u8> {
        match self {
            Self::Opcode { cmd, data } => {
                let mut values = Vec::with_capacity(data.len() + 2);
                values.push(frame::COMMAND_PREFIX);
                values.push(*cmd);
                values.extend_from_slice(data);
                frame::build(&values).to_vec()
            }
            Self::Raw(bytes) => bytes.clone(),
        }
    }
}

/// Up to one payload per transport, derived from a single command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadBundle {
    pub lan: Option<LanPayload>,
    pub cloud: Option<CloudPayload>,
    pub wireless: Option<WirelessPayload>,
}

impl PayloadBundle {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lan.is_none() && self.cloud.is_none() && self.wireless.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_frame_opcode_with_prefix_and_checksum() {
        let payload = WirelessPayload::Opcode {
            cmd: 0x01,
            data: vec![0x01],
        };
        let frame = payload.to_frame();
        assert_eq!(frame.len(), 20);
        assert_eq!(&frame[..3], &[0x33, 0x01, 0x01]);
        assert_eq!(frame[19], 0x33);
    }

    #[test]
    fn should_pass_raw_frame_through() {
        let payload = WirelessPayload::Raw(vec![0xAA, 0x19]);
        assert_eq!(payload.to_frame(), vec![0xAA, 0x19]);
    }

    #[test]
    fn should_report_empty_bundle() {
        assert!(PayloadBundle::default().is_empty());
    }
}
