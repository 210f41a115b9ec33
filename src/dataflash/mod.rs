//! Self-describing dataflash binary logs
//!
//! A dataflash log carries its own schema. FMT records define each message
//! type (id, record length, name, one format character per field and the
//! column names) and every later record of that id is decoded with that
//! layout. All multi-byte values are little-endian.
//!
//! ## Format Characters
//!
//! | Char | Type | Notes |
//! |------|------|-------|
//! | `b` `B` | int8 / uint8 | |
//! | `h` `H` | int16 / uint16 | |
//! | `i` `I` | int32 / uint32 | |
//! | `q` `Q` | int64 / uint64 | |
//! | `f` `d` | float / double | |
//! | `n` `N` `Z` | char[4] / char[16] / char[64] | NUL-padded text |
//! | `c` `C` | int16 / uint16 | multiplier 0.01 |
//! | `e` `E` | int32 / uint32 | multiplier 0.01 |
//! | `L` | int32 | latitude/longitude, multiplier 1e-7 |
//! | `M` | uint8 | flight mode |
//! | `a` | int16[32] | |
//!
//! Multipliers are attached to the field descriptors; decoded values are
//! always the raw integers.
//!
//! ## Recovery
//!
//! Bytes that do not start with the sync marker, and records whose type id
//! has not been defined, trigger a scan for the next sync marker. A record
//! cut off by the end of the buffer ends the pass.

mod format;
mod reader;

pub use format::{
    DescriptorRegistry, FMT_LENGTH, FMT_TYPE, FmtRecord, FormatChar, HEAD_BYTE1, HEAD_BYTE2,
    HEADER_SIZE, SYNC_MARKER, format_char,
};
pub use reader::DataflashDecoder;
