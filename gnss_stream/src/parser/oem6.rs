use crate::{
    constants::{
        OEM6_BESTPOS_ID, OEM6_BESTVEL_ID, OEM6_CRC_LEN, OEM6_HEADER_LEN_OFFSET,
        OEM6_LENGTH_OFFSET, OEM6_MAX_PAYLOAD_LEN, OEM6_MIN_HEADER_LEN, OEM6_MSG_ID_OFFSET,
        OEM6_MSG_TYPE_OFFSET, OEM6_MS_OFFSET, OEM6_PORT_OFFSET, OEM6_RX_STATUS_OFFSET,
        OEM6_SEQUENCE_OFFSET, OEM6_SYNC, OEM6_TIME_STATUS_OFFSET, OEM6_WEEK_OFFSET,
    },
    frame::{BestPos, BestVel, DecodedFrame, Oem6Message},
    parser::{
        checksum::{oem6_crc32, Oem6CrcCalc},
        Step,
    },
};

const BESTPOS_MIN_PAYLOAD_LEN: usize = 66;
const BESTVEL_MIN_PAYLOAD_LEN: usize = 40;

fn le_bytes<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(le_bytes(bytes, offset))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(le_bytes(bytes, offset))
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(le_bytes(bytes, offset))
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(le_bytes(bytes, offset))
}

/// Number of trailing bytes that could be the start of a sync sequence.
fn partial_sync_len(buf: &[u8]) -> usize {
    (1..OEM6_SYNC.len())
        .rev()
        .find(|&n| buf.ends_with(&OEM6_SYNC[..n]))
        .unwrap_or(0)
}

pub(crate) fn decode(buf: &[u8]) -> Step {
    if buf.is_empty() {
        return Step::Incomplete;
    }
    let start = match buf.windows(OEM6_SYNC.len()).position(|w| w == OEM6_SYNC) {
        Some(start) => start,
        None => {
            let garbage = buf.len() - partial_sync_len(buf);
            return if garbage > 0 {
                Step::Garbage(garbage)
            } else {
                Step::Incomplete
            };
        },
    };
    if start > 0 {
        return Step::Garbage(start);
    }

    if buf.len() <= OEM6_HEADER_LEN_OFFSET {
        return Step::Incomplete;
    }
    let header_len = usize::from(buf[OEM6_HEADER_LEN_OFFSET]);
    if header_len < OEM6_MIN_HEADER_LEN {
        // Sync bytes that happen to show up inside other data
        return Step::Garbage(1);
    }
    if buf.len() < OEM6_LENGTH_OFFSET + 2 {
        return Step::Incomplete;
    }
    let payload_len = usize::from(read_u16(buf, OEM6_LENGTH_OFFSET));
    if payload_len > OEM6_MAX_PAYLOAD_LEN {
        return Step::Garbage(1);
    }

    let crc_offset = header_len + payload_len;
    let total = crc_offset + OEM6_CRC_LEN;
    if buf.len() < total {
        return Step::Incomplete;
    }

    let mut calc = Oem6CrcCalc::new();
    calc.update(&buf[..crc_offset]);
    if let Err(condition) = calc.validate_result(read_u32(buf, crc_offset)) {
        // Skip only the sync so a real frame hidden inside can still be found
        return Step::Rejected {
            condition,
            consumed: 1,
        };
    }

    let message = Oem6Message {
        message_id: read_u16(buf, OEM6_MSG_ID_OFFSET),
        message_type: buf[OEM6_MSG_TYPE_OFFSET],
        port_address: buf[OEM6_PORT_OFFSET],
        sequence: read_u16(buf, OEM6_SEQUENCE_OFFSET),
        time_status: buf[OEM6_TIME_STATUS_OFFSET],
        week: read_u16(buf, OEM6_WEEK_OFFSET),
        milliseconds: read_u32(buf, OEM6_MS_OFFSET),
        receiver_status: read_u32(buf, OEM6_RX_STATUS_OFFSET),
        payload: buf[header_len..crc_offset].to_vec(),
        crc_valid: true,
    };
    Step::Frame {
        frame: DecodedFrame::Oem6Message(message),
        consumed: total,
    }
}

impl Oem6Message {
    /// Serializes the message with a 28 byte long header and a freshly
    /// computed CRC. Reserved header fields are written as zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OEM6_MIN_HEADER_LEN + self.payload.len() + OEM6_CRC_LEN);
        out.extend_from_slice(&OEM6_SYNC);
        out.push(OEM6_MIN_HEADER_LEN as u8);
        out.extend_from_slice(&self.message_id.to_le_bytes());
        out.push(self.message_type);
        out.push(self.port_address);
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.push(0); // idle time
        out.push(self.time_status);
        out.extend_from_slice(&self.week.to_le_bytes());
        out.extend_from_slice(&self.milliseconds.to_le_bytes());
        out.extend_from_slice(&self.receiver_status.to_le_bytes());
        out.extend_from_slice(&[0; 4]); // reserved, software version
        out.extend_from_slice(&self.payload);
        let crc = oem6_crc32(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }
}

impl BestPos {
    /// Interprets a BESTPOS message; `None` for other ids or short payloads.
    pub fn from_message(message: &Oem6Message) -> Option<Self> {
        let p = &message.payload;
        if message.message_id != OEM6_BESTPOS_ID || p.len() < BESTPOS_MIN_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            solution_status: read_u32(p, 0),
            position_type: read_u32(p, 4),
            latitude: read_f64(p, 8),
            longitude: read_f64(p, 16),
            height: read_f64(p, 24),
            undulation: read_f32(p, 32),
            latitude_std: read_f32(p, 40),
            longitude_std: read_f32(p, 44),
            height_std: read_f32(p, 48),
            differential_age: read_f32(p, 56),
            solution_age: read_f32(p, 60),
            satellites_tracked: p[64],
            satellites_in_solution: p[65],
        })
    }
}

impl BestVel {
    /// Interprets a BESTVEL message; `None` for other ids or short payloads.
    pub fn from_message(message: &Oem6Message) -> Option<Self> {
        let p = &message.payload;
        if message.message_id != OEM6_BESTVEL_ID || p.len() < BESTVEL_MIN_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            solution_status: read_u32(p, 0),
            velocity_type: read_u32(p, 4),
            latency: read_f32(p, 8),
            age: read_f32(p, 12),
            horizontal_speed: read_f64(p, 16),
            track_over_ground: read_f64(p, 24),
            vertical_speed: read_f64(p, 32),
        })
    }
}
