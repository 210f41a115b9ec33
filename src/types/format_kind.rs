//! Log format selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Decoding strategy for a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    /// Self-describing dataflash binary log (`.bin`, `.log`)
    Dataflash,
    /// MAVLink telemetry log (`.tlog`) or raw MAVLink stream
    Mavlink,
    /// Fixed-layout vendor flight record (`.dat`)
    Vendor,
}

impl FormatKind {
    /// Resolve a caller-supplied hint.
    ///
    /// Accepts a file extension (with or without the leading dot), a file name or
    /// path, or an explicit format name. Matching is case-insensitive.
    pub fn from_hint(hint: &str) -> crate::Result<Self> {
        let trimmed = hint.trim();
        let candidate = Path::new(trimmed)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(trimmed.trim_start_matches('.'));

        match candidate.to_ascii_lowercase().as_str() {
            "bin" | "log" | "dataflash" => Ok(FormatKind::Dataflash),
            "tlog" | "mavlink" => Ok(FormatKind::Mavlink),
            "dat" | "vendor" => Ok(FormatKind::Vendor),
            _ => Err(crate::LogError::unsupported_format(hint)),
        }
    }

    /// Whether frames of this hint carry an 8-byte timestamp prefix by default.
    pub(crate) fn default_timestamp_prefix(hint: &str) -> bool {
        !hint.trim().to_ascii_lowercase().ends_with("mavlink")
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Dataflash => write!(f, "dataflash"),
            FormatKind::Mavlink => write!(f, "mavlink"),
            FormatKind::Vendor => write!(f, "vendor"),
        }
    }
}
