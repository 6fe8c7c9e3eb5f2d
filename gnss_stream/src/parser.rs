use core::{fmt, str::FromStr};

use crate::{error::ConfigError, error::Condition, frame::DecodedFrame};

pub(crate) mod checksum;
pub(crate) mod nmea;
pub(crate) mod oem6;

/// What a decoder found at the head of the buffered bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The first N bytes cannot start a frame
    Garbage(usize),

    /// There may be a frame, but not enough bytes have arrived to be sure
    Incomplete,

    /// The first `consumed` bytes are a valid frame
    Frame { frame: DecodedFrame, consumed: usize },

    /// The first `consumed` bytes failed validation and must be dropped
    Rejected {
        condition: Condition,
        consumed: usize,
    },
}

/// Wire protocol spoken by the receiver, fixed for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParserSelection {
    #[default]
    Nmea,
    NovatelOem6,
}

impl ParserSelection {
    /// Looks at the head of `buf` with the selected decoder.
    pub fn decode(self, buf: &[u8]) -> Step {
        match self {
            ParserSelection::Nmea => nmea::decode(buf),
            ParserSelection::NovatelOem6 => oem6::decode(buf),
        }
    }
}

impl FromStr for ParserSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NMEA" => Ok(ParserSelection::Nmea),
            "NOVATEL_OEM6" | "NOVATEL-OEM6" => Ok(ParserSelection::NovatelOem6),
            _ => Err(ConfigError::UnknownParser(s.to_string())),
        }
    }
}

impl fmt::Display for ParserSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserSelection::Nmea => f.write_str("NMEA"),
            ParserSelection::NovatelOem6 => f.write_str("NOVATEL_OEM6"),
        }
    }
}
