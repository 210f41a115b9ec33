//! MAVLink telemetry logs and streams
//!
//! Frames are located by their magic byte, checked against the X.25 checksum
//! seeded with the message's `crc_extra`, and decoded with the layout from a
//! [`MessageDictionary`]. `.tlog` captures put an 8-byte big-endian
//! microsecond timestamp in front of every frame; raw streams do not.
//!
//! Corrupt frames are dropped and decoding resumes at the next magic byte.
//! Frames with ids missing from the dictionary are skipped by length.
//! Sequence numbers only feed the dropped-frame counter.

mod dictionary;
mod frame;
mod reader;

pub use dictionary::{MessageDefinition, MessageDictionary};
pub use frame::{
    CHECKSUM_LEN, FrameHeader, INCOMPAT_SIGNED, MAGIC_V1, MAGIC_V2, SIGNATURE_LEN,
    TIMESTAMP_PREFIX_LEN, V1_HEADER_LEN, V2_HEADER_LEN, Version, X25, x25,
};
pub use reader::MavlinkDecoder;

/// Message id of status text records
pub const STATUSTEXT_ID: u32 = 253;
