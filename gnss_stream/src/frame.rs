use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::constants::GPS_UTC_LEAP_SECONDS;

/// GGA fix quality indicator. OEM6 position types are mapped onto the same scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FixQuality {
    #[default]
    Invalid,
    Gps,
    Dgps,
    Pps,
    RtkFixed,
    RtkFloat,
    Estimated,
    Manual,
    Simulation,
}

impl FixQuality {
    /// Whether the receiver reports some kind of position solution.
    pub fn is_valid(self) -> bool {
        self != FixQuality::Invalid
    }

    /// Maps a Novatel position/velocity type onto the GGA scale.
    pub fn from_oem6_position_type(position_type: u32) -> Self {
        match position_type {
            1 => FixQuality::Manual,           // FIXEDPOS
            16 => FixQuality::Gps,             // SINGLE
            17 | 18 => FixQuality::Dgps,       // PSRDIFF, WAAS
            19 => FixQuality::Estimated,       // PROPAGATED
            32..=34 => FixQuality::RtkFloat,   // L1_FLOAT, IONOFREE_FLOAT, NARROW_FLOAT
            48..=50 => FixQuality::RtkFixed,   // L1_INT, WIDE_INT, NARROW_INT
            _ => FixQuality::Invalid,
        }
    }
}

impl TryFrom<u8> for FixQuality {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => FixQuality::Invalid,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::Estimated,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulation,
            _ => return Err(v),
        })
    }
}

/// GGA: global positioning system fix data. Every field is optional because
/// receivers leave them empty until they have a fix.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GgaSentence {
    pub talker: String,
    pub time: Option<NaiveTime>,
    /// Signed decimal degrees, north positive
    pub latitude: Option<f64>,
    /// Signed decimal degrees, east positive
    pub longitude: Option<f64>,
    pub fix_quality: Option<FixQuality>,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    /// Antenna altitude above mean sea level [m]
    pub altitude: Option<f64>,
    /// Geoid separation [m]
    pub geoid_separation: Option<f64>,
    /// Age of differential corrections [s]
    pub dgps_age: Option<f32>,
    pub dgps_station: Option<u16>,
}

/// RMC: recommended minimum navigation information.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RmcSentence {
    pub talker: String,
    pub time: Option<NaiveTime>,
    /// `A` (valid) / `V` (warning) status
    pub valid: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    /// Course over ground, degrees true
    pub course: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Degrees, east positive
    pub magnetic_variation: Option<f64>,
    pub mode: Option<char>,
}

/// A CRC-validated Novatel OEM6 binary message (long header).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Oem6Message {
    pub message_id: u16,
    pub message_type: u8,
    pub port_address: u8,
    pub sequence: u16,
    pub time_status: u8,
    pub week: u16,
    pub milliseconds: u32,
    pub receiver_status: u32,
    pub payload: Vec<u8>,
    pub crc_valid: bool,
}

impl Oem6Message {
    /// Bit 7 of the message type flags a response to a command.
    pub fn is_response(&self) -> bool {
        self.message_type & 0x80 != 0
    }

    /// Header GPS time converted to UTC. `None` while the receiver has no week number.
    pub fn utc_time(&self) -> Option<NaiveDateTime> {
        if self.week == 0 {
            return None;
        }
        let gps_epoch = NaiveDate::from_ymd_opt(1980, 1, 6)?.and_hms_opt(0, 0, 0)?;
        let since_epoch = Duration::try_weeks(i64::from(self.week))?
            + Duration::try_milliseconds(i64::from(self.milliseconds))?
            - Duration::try_seconds(GPS_UTC_LEAP_SECONDS)?;
        gps_epoch.checked_add_signed(since_epoch)
    }
}

/// BESTPOS (id 42) fields used to populate observations.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPos {
    pub solution_status: u32,
    pub position_type: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Height above mean sea level [m]
    pub height: f64,
    pub undulation: f32,
    pub latitude_std: f32,
    pub longitude_std: f32,
    pub height_std: f32,
    pub differential_age: f32,
    pub solution_age: f32,
    pub satellites_tracked: u8,
    pub satellites_in_solution: u8,
}

/// BESTVEL (id 99) fields used to populate observations.
#[derive(Debug, Clone, PartialEq)]
pub struct BestVel {
    pub solution_status: u32,
    pub velocity_type: u32,
    pub latency: f32,
    pub age: f32,
    /// [m/s]
    pub horizontal_speed: f64,
    /// Degrees from true north
    pub track_over_ground: f64,
    /// [m/s], positive up
    pub vertical_speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodedFrame {
    NmeaGga(GgaSentence),
    NmeaRmc(RmcSentence),
    Oem6Message(Oem6Message),
    /// A valid NMEA sentence of a type we do not interpret.
    Unrecognized { sentence_id: String, raw: String },
}
