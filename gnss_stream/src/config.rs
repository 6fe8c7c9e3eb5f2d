use crate::{
    constants::{DEFAULT_AIM_ACK_TIMEOUT_POLLS, DEFAULT_BUFFER_CAPACITY, MIN_BUFFER_CAPACITY},
    device::{CustomInit, JavadConfig},
    error::ConfigError,
    parser::ParserSelection,
};

/// Antenna mounting offset on the vehicle [m]. Copied into every observation as is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Everything a [`Session`](crate::Session) needs, handed over once at start.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    pub parser: ParserSelection,
    pub sensor_pose: SensorPose,
    /// Used by whoever writes raw dumps; the session itself ignores it.
    pub raw_dump_file_prefix: Option<String>,
    pub custom_init: CustomInit,
    pub javad: JavadConfig,
    pub buffer_capacity: usize,
    /// Polls to wait for the receiver to acknowledge an AIM transition.
    pub aim_ack_timeout_polls: u32,
    /// Per-frame debug logging.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            parser: ParserSelection::default(),
            sensor_pose: SensorPose::default(),
            raw_dump_file_prefix: None,
            custom_init: CustomInit::default(),
            javad: JavadConfig::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            aim_ack_timeout_polls: DEFAULT_AIM_ACK_TIMEOUT_POLLS,
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Checks the combination of options before any byte is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(ConfigError::BufferTooSmall {
                capacity: self.buffer_capacity,
                required: MIN_BUFFER_CAPACITY,
            });
        }
        if self.javad.use_aim_mode && self.custom_init == CustomInit::None {
            return Err(ConfigError::AimWithoutCustomInit);
        }
        Ok(())
    }
}
