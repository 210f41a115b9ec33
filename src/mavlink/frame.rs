//! MAVLink frame layout and checksum
//!
//! ```text
//! v1: | 0xFE | len | seq | sys | comp | msgid |            payload | crc16 |
//! v2: | 0xFD | len | incompat | compat | seq | sys | comp | msgid[3] | payload | crc16 | signature[13]? |
//! ```
//!
//! The checksum covers every byte after the magic through the end of the
//! payload, then the message's `crc_extra` byte from the dictionary.

/// Start byte of a MAVLink 1 frame
pub const MAGIC_V1: u8 = 0xFE;
/// Start byte of a MAVLink 2 frame
pub const MAGIC_V2: u8 = 0xFD;
/// Header length of a v1 frame, magic included
pub const V1_HEADER_LEN: usize = 6;
/// Header length of a v2 frame, magic included
pub const V2_HEADER_LEN: usize = 10;
/// Trailing checksum length
pub const CHECKSUM_LEN: usize = 2;
/// Length of the optional v2 signature block
pub const SIGNATURE_LEN: usize = 13;
/// Incompatibility flag marking a signed v2 frame
pub const INCOMPAT_SIGNED: u8 = 0x01;
/// Length of the big-endian microsecond prefix in `.tlog` captures
pub const TIMESTAMP_PREFIX_LEN: usize = 8;

/// Protocol version of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: Version,
    pub payload_len: usize,
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
}

impl FrameHeader {
    /// Parse a header from bytes starting at the magic byte.
    ///
    /// Returns `None` when the first byte is not a magic byte or the header is
    /// cut off.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match *bytes.first()? {
            MAGIC_V1 => {
                let h = bytes.get(..V1_HEADER_LEN)?;
                Some(Self {
                    version: Version::V1,
                    payload_len: h[1] as usize,
                    incompat_flags: 0,
                    compat_flags: 0,
                    sequence: h[2],
                    system_id: h[3],
                    component_id: h[4],
                    message_id: h[5] as u32,
                })
            }
            MAGIC_V2 => {
                let h = bytes.get(..V2_HEADER_LEN)?;
                Some(Self {
                    version: Version::V2,
                    payload_len: h[1] as usize,
                    incompat_flags: h[2],
                    compat_flags: h[3],
                    sequence: h[4],
                    system_id: h[5],
                    component_id: h[6],
                    message_id: u32::from_le_bytes([h[7], h[8], h[9], 0]),
                })
            }
            _ => None,
        }
    }

    pub fn header_len(&self) -> usize {
        match self.version {
            Version::V1 => V1_HEADER_LEN,
            Version::V2 => V2_HEADER_LEN,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.version == Version::V2 && self.incompat_flags & INCOMPAT_SIGNED != 0
    }

    /// Total frame length, magic through checksum (and signature when present).
    pub fn frame_len(&self) -> usize {
        let signature = if self.is_signed() { SIGNATURE_LEN } else { 0 };
        self.header_len() + self.payload_len + CHECKSUM_LEN + signature
    }

    /// Checksum stored in a complete frame.
    pub fn stored_checksum(&self, frame: &[u8]) -> Option<u16> {
        let at = self.header_len() + self.payload_len;
        let bytes = frame.get(at..at + CHECKSUM_LEN)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Checksum computed over a complete frame with the message's `crc_extra`.
    pub fn computed_checksum(&self, frame: &[u8], crc_extra: u8) -> Option<u16> {
        let covered = frame.get(1..self.header_len() + self.payload_len)?;
        let mut crc = X25::new();
        crc.update(covered);
        crc.push(crc_extra);
        Some(crc.value())
    }

    pub fn payload<'a>(&self, frame: &'a [u8]) -> Option<&'a [u8]> {
        frame.get(self.header_len()..self.header_len() + self.payload_len)
    }
}

/// CRC-16/MCRF4XX accumulator (X.25 polynomial, seed 0xFFFF, no final XOR).
#[derive(Debug, Clone, Copy)]
pub struct X25 {
    crc: u16,
}

impl Default for X25 {
    fn default() -> Self {
        Self::new()
    }
}

impl X25 {
    pub const fn new() -> Self {
        Self { crc: 0xFFFF }
    }

    pub fn push(&mut self, byte: u8) {
        let mut tmp = byte ^ (self.crc & 0xFF) as u8;
        tmp ^= tmp << 4;
        let tmp = tmp as u16;
        self.crc = (self.crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4);
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    pub fn value(&self) -> u16 {
        self.crc
    }
}

/// Checksum of a byte slice.
pub fn x25(bytes: &[u8]) -> u16 {
    let mut crc = X25::new();
    crc.update(bytes);
    crc.value()
}
