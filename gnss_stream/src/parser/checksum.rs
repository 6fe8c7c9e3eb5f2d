use crate::error::Condition;

/// NMEA 0183 checksum: XOR of every byte between `$` and `*`, both exclusive.
#[derive(Default)]
pub(crate) struct NmeaChecksumCalc {
    ck: u8,
}

impl NmeaChecksumCalc {
    pub(crate) const fn new() -> Self {
        Self { ck: 0 }
    }

    pub(crate) const fn update(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            self.ck ^= bytes[i];
            i += 1;
        }
    }

    pub(crate) const fn result(self) -> u8 {
        self.ck
    }
}

/// Parses the two hex digits after `*`, accepting either case.
pub(crate) fn parse_hex_checksum(digits: &[u8]) -> Option<u8> {
    match digits {
        [hi, lo] => Some(hex_value(*hi)? << 4 | hex_value(*lo)?),
        _ => None,
    }
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const OEM6_CRC32_POLYNOMIAL: u32 = 0xedb8_8320;

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ OEM6_CRC32_POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static OEM6_CRC32_TABLE: [u32; 256] = crc32_table();

/// Novatel OEM6 32-bit CRC (reflected 0xEDB88320, initial value 0, no final xor),
/// computed over sync, header and payload.
#[derive(Default)]
pub(crate) struct Oem6CrcCalc {
    crc: u32,
}

impl Oem6CrcCalc {
    pub(crate) const fn new() -> Self {
        Self { crc: 0 }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            let idx = ((self.crc ^ u32::from(*byte)) & 0xff) as usize;
            self.crc = (self.crc >> 8) ^ OEM6_CRC32_TABLE[idx];
        }
    }

    pub(crate) const fn result(self) -> u32 {
        self.crc
    }

    pub(crate) const fn validate_result(self, received: u32) -> Result<(), Condition> {
        if self.crc == received {
            Ok(())
        } else {
            Err(Condition::CrcMismatch {
                expect: received,
                got: self.crc,
            })
        }
    }
}

/// Single-shot CRC, used when building frames.
pub fn oem6_crc32(bytes: &[u8]) -> u32 {
    let mut calc = Oem6CrcCalc::new();
    calc.update(bytes);
    calc.result()
}

/// Single-shot NMEA checksum over the text between `$` and `*`.
pub fn nmea_checksum(body: &[u8]) -> u8 {
    let mut calc = NmeaChecksumCalc::new();
    calc.update(body);
    calc.result()
}
