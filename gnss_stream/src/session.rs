use log::{debug, info, trace, warn};

use crate::{
    buffer::{FrameBuffer, UnderlyingBuffer},
    config::SessionConfig,
    constants::{MIN_BUFFER_CAPACITY, NMEA_END_CHAR_1, NMEA_END_CHAR_2},
    device::{DeviceMode, ModeController},
    error::{Condition, ConfigError, ModeError},
    frame::{BestPos, DecodedFrame, FixQuality},
    observation::{Assembler, Observation},
    parser::{ParserSelection, Step},
};

/// Result of one [`Session::poll`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Poll {
    /// Every frame decoded in this poll, in stream order
    pub frames: Vec<DecodedFrame>,
    /// Non-fatal problems seen since the previous poll
    pub conditions: Vec<Condition>,
    pub observation: Option<Observation>,
    /// Bytes the transport should write to the receiver
    pub outgoing: Vec<u8>,
    /// Decoding stopped early behind a completed observation. Poll again
    /// before pushing more bytes.
    pub backlog: bool,
}

/// Running counters, mostly useful for diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionStats {
    pub bytes_received: u64,
    pub bytes_dropped: u64,
    pub garbage_bytes: u64,
    pub gga_sentences: u64,
    pub rmc_sentences: u64,
    pub oem6_messages: u64,
    pub unrecognized_sentences: u64,
    pub checksum_errors: u64,
    pub crc_errors: u64,
    pub malformed_sentences: u64,
    pub overflows: u64,
    pub aim_timeouts: u64,
    pub aim_rejections: u64,
    pub observations: u64,
}

impl SessionStats {
    fn record_frame(&mut self, frame: &DecodedFrame) {
        match frame {
            DecodedFrame::NmeaGga(_) => self.gga_sentences += 1,
            DecodedFrame::NmeaRmc(_) => self.rmc_sentences += 1,
            DecodedFrame::Oem6Message(_) => self.oem6_messages += 1,
            DecodedFrame::Unrecognized { .. } => {},
        }
    }

    fn record_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::ChecksumMismatch { .. } => self.checksum_errors += 1,
            Condition::CrcMismatch { .. } => self.crc_errors += 1,
            Condition::MalformedSentence(_) => self.malformed_sentences += 1,
            Condition::UnrecognizedSentence(_) => self.unrecognized_sentences += 1,
            Condition::BufferOverflow { dropped } => {
                self.overflows += 1;
                self.bytes_dropped += *dropped as u64;
            },
            Condition::AimTimeout { .. } => self.aim_timeouts += 1,
            Condition::AimRejected => self.aim_rejections += 1,
        }
    }
}

/// Anything that turns pushed bytes into observations.
pub trait ObservationSource {
    /// Returns the number of buffered bytes dropped to make room.
    fn push_bytes(&mut self, bytes: &[u8]) -> usize;

    fn poll(&mut self) -> Poll;
}

/// One receiver stream, from raw bytes to observations and back to receiver commands.
///
/// The session never does I/O: the caller pushes whatever the transport
/// delivered, calls [`poll`](Session::poll) and writes [`Poll::outgoing`]
/// back to the receiver.
pub struct Session<B: UnderlyingBuffer = Vec<u8>> {
    parser: ParserSelection,
    buffer: FrameBuffer<B>,
    assembler: Assembler,
    device: ModeController,
    pending_conditions: Vec<Condition>,
    last_raw: Option<String>,
    connected: bool,
    signal_acquired: bool,
    stats: SessionStats,
    verbose: bool,
}

impl Session<Vec<u8>> {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_buffer(config, Vec::new())
    }
}

impl<B: UnderlyingBuffer> Session<B> {
    /// Starts a session storing bytes in `storage`. Vendor start-up commands
    /// are queued right away and come out of the first poll.
    pub fn with_buffer(config: SessionConfig, storage: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = FrameBuffer::new(storage, config.buffer_capacity);
        if buffer.capacity() < MIN_BUFFER_CAPACITY {
            return Err(ConfigError::BufferTooSmall {
                capacity: buffer.capacity(),
                required: MIN_BUFFER_CAPACITY,
            });
        }

        let mut device = ModeController::new(
            config.custom_init,
            config.javad,
            config.aim_ack_timeout_polls,
        );
        device.start().map_err(|_| ConfigError::AimWithoutCustomInit)?;

        info!(
            "session started: parser {}, custom init '{}', buffer {} bytes",
            config.parser,
            config.custom_init,
            buffer.capacity()
        );
        Ok(Self {
            parser: config.parser,
            buffer,
            assembler: Assembler::new(config.sensor_pose),
            device,
            pending_conditions: Vec::new(),
            last_raw: None,
            connected: false,
            signal_acquired: false,
            stats: SessionStats::default(),
            verbose: config.verbose,
        })
    }

    pub fn parser(&self) -> ParserSelection {
        self.parser
    }

    /// Appends transport bytes. Returns how many old bytes were dropped to make room.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        self.stats.bytes_received += bytes.len() as u64;
        let dropped = self.buffer.append(bytes);
        if dropped > 0 {
            warn!("buffer full, dropped {dropped} unprocessed bytes");
            self.pending_conditions.push(Condition::BufferOverflow { dropped });
        }
        dropped
    }

    /// Decodes complete frames and hands out at most one observation.
    ///
    /// Decoding stops as soon as an observation is completed, leaving later
    /// bytes in the bounded buffer; [`Poll::backlog`] then asks for another
    /// poll. Only a poll that drains the buffer ends a polling cycle.
    pub fn poll(&mut self) -> Poll {
        let mut frames = Vec::new();
        let mut conditions = core::mem::take(&mut self.pending_conditions);
        let mut backlog = false;

        loop {
            if self.assembler.queued() > 0 && !self.buffer.is_empty() {
                backlog = true;
                break;
            }
            match self.parser.decode(self.buffer.as_slice()) {
                Step::Incomplete => break,
                Step::Garbage(n) => {
                    let bytes = &self.buffer.as_slice()[..n];
                    if self.verbose {
                        trace!("skipping {n} bytes of garbage");
                    }
                    self.device.observe(bytes, &mut conditions);
                    self.stats.garbage_bytes += n as u64;
                    self.buffer.consume(n);
                },
                Step::Rejected {
                    condition,
                    consumed,
                } => {
                    warn!("discarding {consumed} bytes: {condition}");
                    conditions.push(condition);
                    self.buffer.consume(consumed);
                },
                Step::Frame { frame, consumed } => {
                    if let DecodedFrame::NmeaGga(_) = frame {
                        let line = &self.buffer.as_slice()[..consumed];
                        let line = line.strip_suffix(&[NMEA_END_CHAR_2]).unwrap_or(line);
                        let line = line.strip_suffix(&[NMEA_END_CHAR_1]).unwrap_or(line);
                        self.last_raw = Some(String::from_utf8_lossy(line).into_owned());
                    }
                    self.buffer.consume(consumed);
                    self.handle_frame(&frame, &mut conditions);
                    frames.push(frame);
                },
            }
        }

        if !backlog {
            self.device.tick(&mut conditions);
            self.assembler.tick();
        }
        let observation = self.assembler.pop();
        if observation.is_some() {
            self.stats.observations += 1;
        }
        for condition in &conditions {
            self.stats.record_condition(condition);
        }

        Poll {
            frames,
            conditions,
            observation,
            outgoing: self.device.take_outgoing(),
            backlog,
        }
    }

    fn handle_frame(&mut self, frame: &DecodedFrame, conditions: &mut Vec<Condition>) {
        if self.verbose {
            debug!("{frame:?}");
        }
        self.connected = true;
        self.stats.record_frame(frame);

        match frame {
            DecodedFrame::NmeaGga(gga) => {
                if let Some(quality) = gga.fix_quality {
                    self.signal_acquired = quality.is_valid();
                }
            },
            DecodedFrame::Oem6Message(msg) => {
                if let Some(pos) = BestPos::from_message(msg) {
                    self.signal_acquired =
                        FixQuality::from_oem6_position_type(pos.position_type).is_valid();
                }
            },
            DecodedFrame::Unrecognized { sentence_id, .. } => {
                conditions.push(Condition::UnrecognizedSentence(sentence_id.clone()));
            },
            DecodedFrame::NmeaRmc(_) => {},
        }
        self.assembler.push_frame(frame);
    }

    /// Asks for advanced input mode on or off; the outcome shows up in later polls.
    pub fn request_aim(&mut self, enable: bool) -> Result<(), ModeError> {
        self.device.request(enable)
    }

    /// Queues RTK correction bytes for the receiver. Only valid in [`DeviceMode::Aim`].
    pub fn send_correction(&mut self, bytes: &[u8]) -> Result<(), ModeError> {
        self.device.send_correction(bytes)
    }

    /// The transport reported an error: drop back to plain command mode.
    pub fn transport_failed(&mut self) {
        warn!("transport failure while {:?}", self.device.mode());
        self.device.fall_back();
    }

    /// Bytes queued for the receiver since the last poll.
    pub fn take_outgoing(&mut self) -> Vec<u8> {
        self.device.take_outgoing()
    }

    /// Most recent complete GGA line, without line terminator. With `reset`
    /// the line is handed out once and later calls return `None` until a new
    /// one arrives.
    pub fn last_raw_sentence(&mut self, reset: bool) -> Option<String> {
        if reset {
            self.last_raw.take()
        } else {
            self.last_raw.clone()
        }
    }

    pub fn device_mode(&self) -> DeviceMode {
        self.device.mode()
    }

    /// Whether at least one valid frame was ever decoded.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the latest fix report carried a usable fix.
    pub fn is_signal_acquired(&self) -> bool {
        self.signal_acquired
    }

    /// Completed observations waiting to be handed out. At most one.
    pub fn queued_observations(&self) -> usize {
        self.assembler.queued()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Ends the session. The observation being assembled and any not yet
    /// polled are dropped; the returned bytes hold a best-effort AIM exit.
    pub fn shutdown(mut self) -> Vec<u8> {
        self.assembler.discard();
        self.buffer.clear();
        let outgoing = self.device.shutdown();
        info!(
            "session stopped after {} bytes, {} observations",
            self.stats.bytes_received, self.stats.observations
        );
        outgoing
    }
}

impl<B: UnderlyingBuffer> ObservationSource for Session<B> {
    fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        Session::push_bytes(self, bytes)
    }

    fn poll(&mut self) -> Poll {
        Session::poll(self)
    }
}
