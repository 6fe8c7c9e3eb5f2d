use std::collections::VecDeque;

use bitflags::bitflags;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::{
    config::SensorPose,
    constants::{KNOTS_TO_MPS, OEM6_BESTPOS_ID, OEM6_BESTVEL_ID},
    frame::{BestPos, BestVel, DecodedFrame, FixQuality, GgaSentence, Oem6Message, RmcSentence},
};

bitflags! {
    /// Field groups written into an observation since it was started.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FieldGroups: u8 {
        const TIME = 0x01;
        const DATE = 0x02;
        const POSITION = 0x04;
        const ALTITUDE = 0x08;
        /// Fix quality, satellite count and HDOP
        const FIX = 0x10;
        /// Ground speed and course
        const VELOCITY = 0x20;
    }
}

/// Navigation fields carried by one frame. Anything the frame left empty is `None`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationFields {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub fix_quality: Option<FixQuality>,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    /// [m/s]
    pub ground_speed: Option<f64>,
    /// Degrees from true north
    pub course: Option<f64>,
}

impl ObservationFields {
    /// Groups that would be written by merging these fields.
    pub fn groups(&self) -> FieldGroups {
        let mut groups = FieldGroups::empty();
        groups.set(FieldGroups::TIME, self.time.is_some());
        groups.set(FieldGroups::DATE, self.date.is_some());
        groups.set(
            FieldGroups::POSITION,
            self.latitude.is_some() && self.longitude.is_some(),
        );
        groups.set(FieldGroups::ALTITUDE, self.altitude.is_some());
        groups.set(
            FieldGroups::FIX,
            self.fix_quality.is_some() || self.satellites.is_some() || self.hdop.is_some(),
        );
        groups.set(
            FieldGroups::VELOCITY,
            self.ground_speed.is_some() || self.course.is_some(),
        );
        groups
    }

    fn with_utc(mut self, message: &Oem6Message) -> Self {
        if let Some(utc) = message.utc_time() {
            self.date = Some(utc.date());
            self.time = Some(utc.time());
        }
        self
    }

    /// Fields of a BESTPOS message, timestamped from the message header.
    pub fn from_bestpos(message: &Oem6Message, pos: &BestPos) -> Self {
        Self {
            latitude: Some(pos.latitude),
            longitude: Some(pos.longitude),
            altitude: Some(pos.height),
            fix_quality: Some(FixQuality::from_oem6_position_type(pos.position_type)),
            satellites: Some(pos.satellites_tracked),
            ..Default::default()
        }
        .with_utc(message)
    }

    /// Fields of a BESTVEL message, timestamped from the message header.
    pub fn from_bestvel(message: &Oem6Message, vel: &BestVel) -> Self {
        Self {
            ground_speed: Some(vel.horizontal_speed),
            course: Some(vel.track_over_ground),
            ..Default::default()
        }
        .with_utc(message)
    }
}

/// Position, altitude, fix quality, satellites, HDOP and time-of-day
impl From<&GgaSentence> for ObservationFields {
    fn from(gga: &GgaSentence) -> Self {
        Self {
            time: gga.time,
            latitude: gga.latitude,
            longitude: gga.longitude,
            altitude: gga.altitude,
            fix_quality: gga.fix_quality,
            satellites: gga.satellites,
            hdop: gga.hdop,
            ..Default::default()
        }
    }
}

/// Date, speed, course and time-of-day
impl From<&RmcSentence> for ObservationFields {
    fn from(rmc: &RmcSentence) -> Self {
        Self {
            date: rmc.date,
            time: rmc.time,
            ground_speed: rmc.speed_knots.map(|knots| knots * KNOTS_TO_MPS),
            course: rmc.course,
            ..Default::default()
        }
    }
}

/// One assembled navigation record.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// Signed decimal degrees
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// [m]
    pub altitude: Option<f64>,
    pub fix_quality: Option<FixQuality>,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    /// [m/s]
    pub ground_speed: Option<f64>,
    pub course: Option<f64>,
    pub sensor_pose: SensorPose,
    pub dirty: FieldGroups,
}

impl Observation {
    /// UTC date and time, once both halves are known.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }

    pub fn has_position(&self) -> bool {
        self.dirty.contains(FieldGroups::POSITION)
    }

    fn starts_new_slot(&self, fields: &ObservationFields) -> bool {
        let time_changed = matches!((self.time, fields.time), (Some(a), Some(b)) if a != b);
        let date_changed = matches!((self.date, fields.date), (Some(a), Some(b)) if a != b);
        time_changed || date_changed
    }

    fn merge(&mut self, fields: &ObservationFields) {
        fn put<T: Copy>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        put(&mut self.time, fields.time);
        put(&mut self.date, fields.date);
        if let (Some(lat), Some(lon)) = (fields.latitude, fields.longitude) {
            self.latitude = Some(lat);
            self.longitude = Some(lon);
        }
        put(&mut self.altitude, fields.altitude);
        put(&mut self.fix_quality, fields.fix_quality);
        put(&mut self.satellites, fields.satellites);
        put(&mut self.hdop, fields.hdop);
        put(&mut self.ground_speed, fields.ground_speed);
        put(&mut self.course, fields.course);
        self.dirty |= fields.groups();
    }
}

/// Merges frames belonging to the same time slot into one [`Observation`].
///
/// An observation is complete when a frame with a different time-of-day (or
/// date) arrives, or when a whole tick passes without any merge. Only
/// observations holding a position are emitted; the rest are dropped.
#[derive(Debug)]
pub struct Assembler {
    pose: SensorPose,
    current: Observation,
    merged_since_tick: bool,
    completed: VecDeque<Observation>,
}

impl Assembler {
    pub fn new(pose: SensorPose) -> Self {
        Self {
            pose,
            current: Observation {
                sensor_pose: pose,
                ..Default::default()
            },
            merged_since_tick: false,
            completed: VecDeque::new(),
        }
    }

    /// Feeds a decoded frame. Returns `false` for frames that carry no
    /// observation fields; those leave the assembler untouched.
    pub fn push_frame(&mut self, frame: &DecodedFrame) -> bool {
        let fields = match frame {
            DecodedFrame::NmeaGga(gga) => ObservationFields::from(gga),
            DecodedFrame::NmeaRmc(rmc) => ObservationFields::from(rmc),
            DecodedFrame::Oem6Message(msg) => match msg.message_id {
                OEM6_BESTPOS_ID => match BestPos::from_message(msg) {
                    Some(pos) => ObservationFields::from_bestpos(msg, &pos),
                    None => return false,
                },
                OEM6_BESTVEL_ID => match BestVel::from_message(msg) {
                    Some(vel) => ObservationFields::from_bestvel(msg, &vel),
                    None => return false,
                },
                _ => return false,
            },
            DecodedFrame::Unrecognized { .. } => return false,
        };
        self.merge(&fields);
        true
    }

    pub fn merge(&mut self, fields: &ObservationFields) {
        if self.current.starts_new_slot(fields) {
            self.close();
        }
        self.current.merge(fields);
        self.merged_since_tick = true;
    }

    /// End of a polling cycle.
    pub fn tick(&mut self) {
        if !self.merged_since_tick && self.current.has_position() {
            self.close();
        }
        self.merged_since_tick = false;
    }

    /// Oldest completed observation, if any.
    pub fn pop(&mut self) -> Option<Observation> {
        self.completed.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.completed.len()
    }

    /// The observation being assembled.
    pub fn in_progress(&self) -> &Observation {
        &self.current
    }

    /// Drops the in-progress observation and everything not yet popped.
    pub fn discard(&mut self) {
        self.current = self.fresh();
        self.completed.clear();
        self.merged_since_tick = false;
    }

    fn fresh(&self) -> Observation {
        Observation {
            sensor_pose: self.pose,
            ..Default::default()
        }
    }

    fn close(&mut self) {
        let fresh = self.fresh();
        let done = core::mem::replace(&mut self.current, fresh);
        if done.has_position() {
            self.completed.push_back(done);
        } else if !done.dirty.is_empty() {
            log::debug!("dropping observation without position ({:?})", done.dirty);
        }
    }
}
