pub const NMEA_SYNC_CHAR: u8 = 0x24; // '$'
pub const NMEA_CHECKSUM_CHAR: u8 = 0x2a; // '*'
pub const NMEA_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const NMEA_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)
pub(crate) const NMEA_ADDRESS_LEN: usize = 5; // talker (2) + sentence id (3)
/// Longest candidate we wait on before giving up on a `$` without terminator.
/// The standard says 82, receivers in the wild emit longer proprietary lines.
pub(crate) const NMEA_MAX_SENTENCE_LENGTH: usize = 256;

pub const OEM6_SYNC_CHAR_1: u8 = 0xaa;
pub const OEM6_SYNC_CHAR_2: u8 = 0x44;
pub const OEM6_SYNC_CHAR_3: u8 = 0x12;
pub(crate) const OEM6_SYNC: [u8; 3] = [OEM6_SYNC_CHAR_1, OEM6_SYNC_CHAR_2, OEM6_SYNC_CHAR_3];
pub(crate) const OEM6_MIN_HEADER_LEN: usize = 28;
pub(crate) const OEM6_CRC_LEN: usize = 4;
pub const OEM6_MAX_PAYLOAD_LEN: usize = 8192;

pub(crate) const OEM6_HEADER_LEN_OFFSET: usize = 3;
pub(crate) const OEM6_MSG_ID_OFFSET: usize = 4;
pub(crate) const OEM6_MSG_TYPE_OFFSET: usize = 6;
pub(crate) const OEM6_PORT_OFFSET: usize = 7;
pub(crate) const OEM6_LENGTH_OFFSET: usize = 8;
pub(crate) const OEM6_SEQUENCE_OFFSET: usize = 10;
pub(crate) const OEM6_TIME_STATUS_OFFSET: usize = 13;
pub(crate) const OEM6_WEEK_OFFSET: usize = 14;
pub(crate) const OEM6_MS_OFFSET: usize = 16;
pub(crate) const OEM6_RX_STATUS_OFFSET: usize = 20;

pub const OEM6_BESTPOS_ID: u16 = 42;
pub const OEM6_BESTVEL_ID: u16 = 99;

/// GPS time runs ahead of UTC by the accumulated leap seconds (18 since 2017-01-01).
pub const GPS_UTC_LEAP_SECONDS: i64 = 18;

/// Smallest buffer able to hold the largest frame either decoder accepts.
pub const MIN_BUFFER_CAPACITY: usize = 255 + OEM6_MAX_PAYLOAD_LEN + OEM6_CRC_LEN;
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;
pub const DEFAULT_AIM_ACK_TIMEOUT_POLLS: u32 = 20;

/// Prefix marking tunnelled RTK correction bytes while in advanced input mode.
pub const AIM_PREFIX: [u8; 2] = *b">>";

pub(crate) const KNOTS_TO_MPS: f64 = 1852.0 / 3600.0;
