use core::fmt;

use crate::device::DeviceMode;

/// Fatal errors detected while setting up a session. Nothing is decoded
/// once one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownParser(String),
    UnknownCustomInit(String),
    BufferTooSmall { capacity: usize, required: usize },
    /// Advanced input mode was requested but no vendor init strategy supports it.
    AimWithoutCustomInit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownParser(tag) => write!(f, "unknown parser '{tag}'"),
            ConfigError::UnknownCustomInit(tag) => write!(f, "unknown custom init '{tag}'"),
            ConfigError::BufferTooSmall { capacity, required } => write!(
                f,
                "buffer capacity {capacity} is below the required minimum of {required} bytes"
            ),
            ConfigError::AimWithoutCustomInit => {
                f.write_str("advanced input mode requires a vendor custom init")
            },
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error returned by [`parse_nmea_line`](crate::parse_nmea_line)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmeaError {
    ChecksumMismatch { expect: u8, got: u8 },
    Malformed(&'static str),
    Unrecognized(String),
}

impl fmt::Display for NmeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NmeaError::ChecksumMismatch { expect, got } => write!(
                f,
                "Not valid sentence checksum, expect {expect:02X}, got {got:02X}"
            ),
            NmeaError::Malformed(reason) => write!(f, "Malformed sentence: {reason}"),
            NmeaError::Unrecognized(id) => write!(f, "Unrecognized sentence {id}"),
        }
    }
}

impl std::error::Error for NmeaError {}

impl From<NmeaError> for Condition {
    fn from(err: NmeaError) -> Self {
        match err {
            NmeaError::ChecksumMismatch { expect, got } => {
                Condition::ChecksumMismatch { expect, got }
            },
            NmeaError::Malformed(reason) => Condition::MalformedSentence(reason),
            NmeaError::Unrecognized(id) => Condition::UnrecognizedSentence(id),
        }
    }
}

/// Rejected device mode requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    /// The configured custom init has no advanced input mode.
    Unsupported,
    /// A transition in the other direction is still waiting for the receiver.
    Busy(DeviceMode),
    NotInAim,
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeError::Unsupported => {
                f.write_str("advanced input mode is not supported by this receiver setup")
            },
            ModeError::Busy(mode) => write!(f, "device mode transition in progress ({mode:?})"),
            ModeError::NotInAim => f.write_str("device is not in advanced input mode"),
        }
    }
}

impl std::error::Error for ModeError {}

/// Non-fatal condition observed while processing the stream. Conditions
/// are reported next to the decoded data and never stop the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    ChecksumMismatch { expect: u8, got: u8 },
    CrcMismatch { expect: u32, got: u32 },
    MalformedSentence(&'static str),
    UnrecognizedSentence(String),
    /// Oldest unconsumed bytes were dropped to stay within capacity.
    BufferOverflow { dropped: usize },
    /// The receiver did not acknowledge the AIM command sequence in time.
    AimTimeout { mode: DeviceMode },
    /// The receiver answered the AIM command sequence with an error reply.
    AimRejected,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::ChecksumMismatch { expect, got } => write!(
                f,
                "NMEA checksum mismatch, expect {expect:02X}, got {got:02X}"
            ),
            Condition::CrcMismatch { expect, got } => {
                write!(f, "OEM6 CRC mismatch, expect {expect:08x}, got {got:08x}")
            },
            Condition::MalformedSentence(reason) => write!(f, "malformed sentence: {reason}"),
            Condition::UnrecognizedSentence(id) => write!(f, "unrecognized sentence {id}"),
            Condition::BufferOverflow { dropped } => {
                write!(f, "buffer overflow, dropped {dropped} bytes")
            },
            Condition::AimTimeout { mode } => {
                write!(f, "no acknowledgement while {mode:?}, back to Normal")
            },
            Condition::AimRejected => f.write_str("receiver rejected advanced input mode"),
        }
    }
}
