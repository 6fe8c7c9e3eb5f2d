//! A proptest generator for NMEA GGA sentences.
//!
//! Sentences are rendered from random but plausible fix data, with the
//! checksum computed here independently of the crate under test.

use gnss_stream::{
    parse_nmea_line, DecodedFrame, FixQuality, NmeaError, ParserSelection, Session, SessionConfig,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
pub struct GgaFields {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub latitude: f64,  // signed decimal degrees
    pub longitude: f64, // signed decimal degrees
    pub quality: u8,
    pub satellites: u8,
    pub hdop: f32,
    pub altitude: f64,
}

fn xor_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |ck, b| ck ^ b)
}

fn ddmm(value: f64, degree_digits: usize) -> String {
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    format!(
        "{:0width$}{:08.5}",
        degrees as u32,
        minutes,
        width = degree_digits
    )
}

impl GgaFields {
    pub fn body(&self) -> String {
        format!(
            "GPGGA,{:02}{:02}{:02}.00,{},{},{},{},{},{:02},{:.1},{:.2},M,46.9,M,,",
            self.hour,
            self.minute,
            self.second,
            ddmm(self.latitude, 2),
            if self.latitude < 0.0 { 'S' } else { 'N' },
            ddmm(self.longitude, 3),
            if self.longitude < 0.0 { 'W' } else { 'E' },
            self.quality,
            self.satellites,
            self.hdop,
            self.altitude,
        )
    }

    pub fn sentence(&self) -> String {
        let body = self.body();
        format!("${body}*{:02X}\r\n", xor_checksum(&body))
    }
}

fn gga_strategy() -> impl Strategy<Value = GgaFields> {
    (
        (0u32..24, 0u32..60, 0u32..60),
        -89.9f64..89.9,
        -179.9f64..179.9,
        0u8..=8,
        0u8..40,
        0.5f32..20.0,
        -100.0f64..9000.0,
    )
        .prop_map(
            |((hour, minute, second), latitude, longitude, quality, satellites, hdop, altitude)| {
                GgaFields {
                    hour,
                    minute,
                    second,
                    latitude,
                    longitude,
                    quality,
                    satellites,
                    hdop,
                    altitude,
                }
            },
        )
}

fn decode_all(chunks: &[&[u8]]) -> Vec<DecodedFrame> {
    let mut session = Session::new(SessionConfig {
        parser: ParserSelection::Nmea,
        ..Default::default()
    })
    .unwrap();
    let mut frames = Vec::new();
    for chunk in chunks {
        session.push_bytes(chunk);
        loop {
            let poll = session.poll();
            frames.extend(poll.frames);
            if !poll.backlog {
                break;
            }
        }
    }
    frames
}

proptest! {
    #[test]
    fn test_parse_generated_gga(fields in gga_strategy()) {
        let sentence = fields.sentence();
        let parsed = parse_nmea_line(&sentence).unwrap();

        prop_assert!((parsed.latitude.unwrap() - fields.latitude).abs() < 1e-6);
        prop_assert!((parsed.longitude.unwrap() - fields.longitude).abs() < 1e-6);
        prop_assert!((parsed.altitude.unwrap() - fields.altitude).abs() < 0.006);
        prop_assert_eq!(parsed.fix_quality, Some(FixQuality::try_from(fields.quality).unwrap()));
        prop_assert_eq!(parsed.satellites, Some(fields.satellites));
    }

    #[test]
    fn test_single_bit_flip_fails_checksum(
        fields in gga_strategy(),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let sentence = fields.sentence();
        let star = sentence.rfind('*').unwrap();
        // somewhere between '$' and '*'
        let idx = 1 + pos.index(star - 1);
        let mut bytes = sentence.into_bytes();
        bytes[idx] ^= 1 << bit;
        let flipped = String::from_utf8_lossy(&bytes).into_owned();
        // lossy conversion may widen a non-ASCII byte, still a mismatch
        let res = parse_nmea_line(&flipped);
        prop_assert!(matches!(res, Err(NmeaError::ChecksumMismatch { .. })), "{:?}", res);
    }

    #[test]
    fn test_split_invariance(fields in gga_strategy(), split in any::<prop::sample::Index>()) {
        let sentence = fields.sentence().into_bytes();
        let at = split.index(sentence.len() + 1);
        let whole = decode_all(&[&sentence]);
        let split = decode_all(&[&sentence[..at], &sentence[at..]]);
        prop_assert_eq!(whole.len(), 1);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn test_byte_at_a_time(fields in gga_strategy()) {
        let sentence = fields.sentence().into_bytes();
        let chunks: Vec<&[u8]> = sentence.chunks(1).collect();
        prop_assert_eq!(decode_all(&chunks), decode_all(&[&sentence]));
    }

    #[test]
    fn test_noise_before_sentence(
        noise in prop::collection::vec(any::<u8>().prop_filter("no sync", |b| *b != b'$'), 0..300),
        fields in gga_strategy(),
    ) {
        let mut data = noise;
        data.extend_from_slice(fields.sentence().as_bytes());
        let frames = decode_all(&[&data]);
        prop_assert_eq!(frames.len(), 1);
        let is_gga = matches!(frames[0], DecodedFrame::NmeaGga(_));
        prop_assert!(is_gga);
    }
}

#[test]
fn test_reference_sentence() {
    let sentence = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    assert_eq!(
        xor_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,"),
        0x47
    );
    let fields = parse_nmea_line(sentence).unwrap();
    assert!((fields.latitude.unwrap() - 48.1173).abs() < 1e-4);
    assert!((fields.longitude.unwrap() - 11.5167).abs() < 1e-4);
    assert_eq!(fields.altitude, Some(545.4));
    assert_eq!(fields.fix_quality, Some(FixQuality::Gps));
    assert_eq!(fields.satellites, Some(8));
}
