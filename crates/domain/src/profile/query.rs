//! Status frames (`0xAA …`) reported by appliances in their `commands`
//! list.

use crate::codec::frame::QUERY_PREFIX;
use crate::command::Rgb;

/// How a profile interprets status frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDecoder {
    /// Status frames are not interpreted.
    None,
    /// Fan family: speed, mode, swing, night light, sensor.
    Fan,
    /// Ice maker: power.
    IceMaker,
}

/// A decoded status frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCode {
    FanSpeed(u8),
    FanMode(u8),
    SensorAttached(bool),
    NightLight { on: bool, brightness: u8 },
    NightLightColour(Rgb),
    /// Oscillation state; the full frame is kept to build the next swing
    /// command from it.
    Swing { on: bool, frame: Vec<u8> },
    IceMakerPower(bool),
    /// A status frame this decoder does not know.
    Unknown(Vec<u8>),
}

impl QueryDecoder {
    /// Decode a status frame.
    ///
    /// Returns `None` when `bytes` is not a status frame or the decoder does
    /// not interpret status frames.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<QueryCode> {
        if bytes.first() != Some(&QUERY_PREFIX) {
            return None;
        }
        let at = |index: usize| bytes.get(index).copied().unwrap_or_default();

        match self {
            Self::None => None,
            Self::Fan => {
                if at(1) == 0x08 {
                    let attached = bytes.get(2..8).is_some_and(|dev| dev.iter().any(|b| *b != 0));
                    return Some(QueryCode::SensorAttached(attached));
                }
                Some(match (at(1), at(2)) {
                    (0x05, 0x01) => QueryCode::FanSpeed(at(3)),
                    (0x05, 0x00) => QueryCode::FanMode(at(3)),
                    (0x1B, 0x01) => QueryCode::NightLight {
                        on: at(3) == 0x01,
                        brightness: at(4),
                    },
                    (0x1B, 0x05) => QueryCode::NightLightColour(Rgb::new(at(4), at(5), at(6))),
                    (0x1D, flag @ (0x00 | 0x01)) => QueryCode::Swing {
                        on: flag == 0x01,
                        frame: bytes.to_vec(),
                    },
                    _ => QueryCode::Unknown(bytes.to_vec()),
                })
            }
            Self::IceMaker => Some(match at(1) {
                0x19 => QueryCode::IceMakerPower(at(2) == 0x01),
                _ => QueryCode::Unknown(bytes.to_vec()),
            }),
        }
    }
}
