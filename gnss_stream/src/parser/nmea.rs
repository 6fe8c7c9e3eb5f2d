//! NMEA 0183 sentence framing and GGA/RMC field extraction

use chrono::{NaiveDate, NaiveTime};

use crate::{
    constants::{
        NMEA_ADDRESS_LEN, NMEA_CHECKSUM_CHAR, NMEA_END_CHAR_1, NMEA_END_CHAR_2,
        NMEA_MAX_SENTENCE_LENGTH, NMEA_SYNC_CHAR,
    },
    error::NmeaError,
    frame::{DecodedFrame, FixQuality, GgaSentence, RmcSentence},
    observation::ObservationFields,
    parser::{
        checksum::{parse_hex_checksum, NmeaChecksumCalc},
        Step,
    },
};

pub(crate) fn decode(buf: &[u8]) -> Step {
    if buf.is_empty() {
        return Step::Incomplete;
    }
    match buf.iter().position(|&b| b == NMEA_SYNC_CHAR) {
        Some(0) => {},
        Some(start) => return Step::Garbage(start),
        None => return Step::Garbage(buf.len()),
    }

    let mut end = None;
    for (i, &b) in buf.iter().enumerate().skip(1) {
        if b == NMEA_END_CHAR_2 {
            end = Some(i + 1);
            break;
        }
        if b == NMEA_SYNC_CHAR {
            // Truncated sentence, the next one starts here
            return Step::Garbage(i);
        }
        if i >= NMEA_MAX_SENTENCE_LENGTH {
            return Step::Garbage(1);
        }
    }
    let Some(end) = end else {
        return Step::Incomplete;
    };

    match parse_sentence(&buf[..end]) {
        Ok(frame) => Step::Frame {
            frame,
            consumed: end,
        },
        Err(err) => Step::Rejected {
            condition: err.into(),
            consumed: end,
        },
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[NMEA_END_CHAR_2]).unwrap_or(line);
    line.strip_suffix(&[NMEA_END_CHAR_1]).unwrap_or(line)
}

/// Validates one complete sentence (with or without line terminator) and
/// splits it into a typed frame.
pub(crate) fn parse_sentence(line: &[u8]) -> Result<DecodedFrame, NmeaError> {
    let line = strip_terminator(line);
    if line.first() != Some(&NMEA_SYNC_CHAR) {
        return Err(NmeaError::Malformed("missing '$'"));
    }
    let star = line
        .iter()
        .rposition(|&b| b == NMEA_CHECKSUM_CHAR)
        .ok_or(NmeaError::Malformed("missing checksum"))?;
    let expect = parse_hex_checksum(&line[star + 1..])
        .ok_or(NmeaError::Malformed("bad checksum digits"))?;

    let body = &line[1..star];
    let mut calc = NmeaChecksumCalc::new();
    calc.update(body);
    let got = calc.result();
    if got != expect {
        return Err(NmeaError::ChecksumMismatch { expect, got });
    }

    if !body.is_ascii() {
        return Err(NmeaError::Malformed("non-ASCII content"));
    }
    let text = core::str::from_utf8(body).map_err(|_| NmeaError::Malformed("non-ASCII content"))?;
    let fields: Vec<&str> = text.split(',').collect();
    let address = fields[0];

    if address.len() == NMEA_ADDRESS_LEN {
        let (talker, sentence) = address.split_at(2);
        match sentence {
            "GGA" => return Ok(DecodedFrame::NmeaGga(parse_gga(talker, &fields))),
            "RMC" => return Ok(DecodedFrame::NmeaRmc(parse_rmc(talker, &fields))),
            _ => {},
        }
    }
    Ok(DecodedFrame::Unrecognized {
        sentence_id: address.to_string(),
        raw: core::str::from_utf8(line).unwrap_or_default().to_string(),
    })
}

/// Parses one line of NMEA text outside of any stream, returning the
/// observation fields it carries. Recognised sentences are GGA and RMC.
///
/// ```
/// let fields = gnss_stream::parse_nmea_line(
///     "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
/// )
/// .unwrap();
/// assert!((fields.latitude.unwrap() - 48.1173).abs() < 1e-4);
/// assert_eq!(fields.satellites, Some(8));
/// ```
pub fn parse_nmea_line(line: &str) -> Result<ObservationFields, NmeaError> {
    match parse_sentence(line.trim().as_bytes())? {
        DecodedFrame::NmeaGga(gga) => Ok(ObservationFields::from(&gga)),
        DecodedFrame::NmeaRmc(rmc) => Ok(ObservationFields::from(&rmc)),
        DecodedFrame::Unrecognized { sentence_id, .. } => {
            Err(NmeaError::Unrecognized(sentence_id))
        },
        DecodedFrame::Oem6Message(_) => Err(NmeaError::Malformed("binary frame")),
    }
}

fn field<'a>(fields: &[&'a str], idx: usize) -> &'a str {
    fields.get(idx).copied().unwrap_or_default()
}

fn parse_opt<T: core::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() {
        None
    } else {
        s.parse().ok()
    }
}

/// `hhmmss[.sss]`
fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.len() < 6 || !s.is_char_boundary(6) {
        return None;
    }
    let (hms, frac) = s.split_at(6);
    let hour: u32 = hms[0..2].parse().ok()?;
    let min: u32 = hms[2..4].parse().ok()?;
    let sec: u32 = hms[4..6].parse().ok()?;

    let mut nano = 0u32;
    if let Some(digits) = frac.strip_prefix('.') {
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut scale = 100_000_000u32;
        for b in digits.bytes().take(9) {
            nano += u32::from(b - b'0') * scale;
            scale /= 10;
        }
    } else if !frac.is_empty() {
        return None;
    }

    // Leap second: chrono keeps it as second 59 with an overflowing fraction
    if sec == 60 {
        return NaiveTime::from_hms_nano_opt(hour, min, 59, 1_000_000_000 + nano);
    }
    NaiveTime::from_hms_nano_opt(hour, min, sec, nano)
}

/// `ddmmyy`, two-digit years pivot at 1980
fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let day: u32 = s[0..2].parse().ok()?;
    let month: u32 = s[2..4].parse().ok()?;
    let yy: i32 = s[4..6].parse().ok()?;
    let year = if yy < 80 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Degrees + decimal minutes (`ddmm.mmmm` / `dddmm.mmmm`) with hemisphere
/// letter into signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    let raw: f64 = parse_opt(value)?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

fn parse_gga(talker: &str, fields: &[&str]) -> GgaSentence {
    GgaSentence {
        talker: talker.to_string(),
        time: parse_time(field(fields, 1)),
        latitude: parse_coordinate(field(fields, 2), field(fields, 3)),
        longitude: parse_coordinate(field(fields, 4), field(fields, 5)),
        fix_quality: parse_opt::<u8>(field(fields, 6)).and_then(|q| FixQuality::try_from(q).ok()),
        satellites: parse_opt(field(fields, 7)),
        hdop: parse_opt(field(fields, 8)),
        altitude: parse_opt(field(fields, 9)),
        geoid_separation: parse_opt(field(fields, 11)),
        dgps_age: parse_opt(field(fields, 13)),
        dgps_station: parse_opt(field(fields, 14)),
    }
}

fn parse_rmc(talker: &str, fields: &[&str]) -> RmcSentence {
    let magnetic_variation =
        parse_opt::<f64>(field(fields, 10)).and_then(|v| match field(fields, 11) {
            "E" => Some(v),
            "W" => Some(-v),
            _ => None,
        });
    RmcSentence {
        talker: talker.to_string(),
        time: parse_time(field(fields, 1)),
        valid: match field(fields, 2) {
            "A" => Some(true),
            "V" => Some(false),
            _ => None,
        },
        latitude: parse_coordinate(field(fields, 3), field(fields, 4)),
        longitude: parse_coordinate(field(fields, 5), field(fields, 6)),
        speed_knots: parse_opt(field(fields, 7)),
        course: parse_opt(field(fields, 8)),
        date: parse_date(field(fields, 9)),
        magnetic_variation,
        mode: field(fields, 12).chars().next(),
    }
}
