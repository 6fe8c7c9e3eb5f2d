//! # gnss_stream
//!
//! Turns the raw byte stream of a GNSS receiver into timestamped position
//! observations. The receiver speaks either NMEA 0183 (GGA and RMC are
//! interpreted) or Novatel OEM6 binary frames (BESTPOS and BESTVEL are
//! interpreted); the protocol is picked once per session.
//!
//! The crate does no I/O. Whoever owns the serial port or log file pushes the
//! bytes into a [`Session`], polls it, and writes any command bytes the
//! session queued back to the receiver.
//!
//! Streaming
//! =========
//!
//! ```
//! use gnss_stream::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default()).unwrap();
//! session.push_bytes(b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n");
//!
//! // the sentence is decoded right away ...
//! let poll = session.poll();
//! assert_eq!(poll.frames.len(), 1);
//! assert!(poll.observation.is_none());
//!
//! // ... and the observation comes out once a poll passes without new data for it
//! let observation = session.poll().observation.unwrap();
//! assert_eq!(observation.altitude, Some(545.4));
//! ```
//!
//! Frames split across any number of `push_bytes` calls decode the same way,
//! and noise between frames is skipped. Problems such as checksum failures or
//! buffer overflows never stop the stream: they are reported in
//! [`Poll::conditions`] and counted in [`SessionStats`]. A poll hands out at
//! most one observation and stops decoding behind it; poll again while
//! [`Poll::backlog`] is set.
//!
//! Advanced input mode
//! ===================
//!
//! Javad / TopCon receivers can take RTK corrections on their primary port
//! once switched to advanced input mode (AIM). With
//! [`CustomInit::Javad`] configured, [`Session::request_aim`] queues the
//! command sequence, tagged replies found in the stream complete the
//! transition, and [`Session::send_correction`] wraps correction bytes for
//! the receiver.
//!
//! Storage
//! =======
//!
//! The session buffer defaults to a `Vec<u8>`. [`Session::with_buffer`] takes
//! any [`UnderlyingBuffer`], for example a [`FixedBuffer`] of at least
//! [`constants::MIN_BUFFER_CAPACITY`] bytes.

#[cfg(feature = "serde")]
extern crate serde;

pub use crate::{
    buffer::{FixedBuffer, FrameBuffer, Peek, UnderlyingBuffer},
    config::{SensorPose, SessionConfig},
    device::{
        javad_aim_enter_commands, javad_aim_exit_commands, javad_init_commands, CustomInit,
        DeviceMode, JavadConfig, ModeController, Reply, ReplyKind, ReplyScanner,
    },
    error::{Condition, ConfigError, ModeError, NmeaError},
    frame::{
        BestPos, BestVel, DecodedFrame, FixQuality, GgaSentence, Oem6Message, RmcSentence,
    },
    observation::{Assembler, FieldGroups, Observation, ObservationFields},
    parser::{
        checksum::{nmea_checksum, oem6_crc32},
        nmea::parse_nmea_line,
        ParserSelection, Step,
    },
    session::{ObservationSource, Poll, Session, SessionStats},
};

pub mod constants;

mod buffer;
mod config;
mod device;
mod error;
mod frame;
mod observation;
mod parser;
mod session;
