//! Error types for flight log decoding.
//!
//! Only two errors ever reach a caller from a decode pass:
//!
//! - [`LogError::UnsupportedFormat`] when the format hint matches no decoder
//! - [`LogError::DecodeAborted`] when the buffer contains nothing recognizable
//!
//! Everything else in this module is either an internal classification that
//! decoders recover from (bad sync markers, checksums, unknown descriptors,
//! reads past the end of the buffer) or belongs to the surrounding plumbing
//! (files, dictionaries, options, background tasks).
//!
//! ```rust
//! use flightlog::LogError;
//!
//! let error = LogError::unsupported_format("csv");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::FormatKind;

/// Result type alias for flight log operations.
pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// Main error type for flight log operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LogError {
    #[error("Unsupported log format hint '{hint}'")]
    UnsupportedFormat { hint: String },

    #[error("Decoding {format} log aborted: {reason}")]
    DecodeAborted { format: FormatKind, reason: String },

    #[error("Read past end of buffer at offset {offset:#x} (needed {needed} bytes, {remaining} remaining)")]
    OutOfBounds { offset: usize, needed: usize, remaining: usize },

    #[error("No descriptor registered for message id {id}")]
    UnknownDescriptor { id: u32 },

    #[error("Invalid descriptor for '{name}': {details}")]
    InvalidDescriptor { name: String, details: String },

    #[error("Message dictionary error in {context}: {details}")]
    Dictionary { context: String, details: String },

    #[error("Invalid decode options: {details}")]
    Config { details: String },

    #[error("Message type '{name}' not found in this log")]
    TypeNotFound { name: String },

    #[error("Log file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background decode task failed: {details}")]
    Task { details: String },
}

impl LogError {
    /// Whether this error is the normal end-of-stream signal of a reader.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, LogError::OutOfBounds { .. })
    }

    /// Whether this error ends a session without any partial output.
    pub fn is_fatal(&self) -> bool {
        match self {
            LogError::UnsupportedFormat { .. } => true,
            LogError::DecodeAborted { .. } => true,
            LogError::File { .. } => true,
            LogError::Dictionary { .. } => true,
            LogError::Config { .. } => true,
            LogError::Task { .. } => true,
            LogError::OutOfBounds { .. } => false,
            LogError::UnknownDescriptor { .. } => false,
            LogError::InvalidDescriptor { .. } => false,
            LogError::TypeNotFound { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LogError::UnsupportedFormat { .. } => vec![
                "Use a .bin/.log extension for dataflash logs",
                "Use a .tlog extension for MAVLink telemetry logs",
                "Use a .dat extension for vendor flight records",
            ],
            LogError::DecodeAborted { .. } => vec![
                "Check that the file matches the selected format",
                "Verify the file is not empty or encrypted",
            ],
            LogError::OutOfBounds { .. } => vec![
                "Treat as end of stream",
                "Check whether the capture was truncated",
            ],
            LogError::UnknownDescriptor { .. } => vec![
                "Check that FMT records precede the data they describe",
                "Extend the message dictionary with the missing id",
            ],
            LogError::InvalidDescriptor { .. } => vec![
                "Verify the format string and declared record length agree",
                "Check the dictionary field types",
            ],
            LogError::Dictionary { .. } => vec![
                "Validate the dictionary YAML against the documented layout",
                "Fall back to the built-in dictionary",
            ],
            LogError::Config { .. } => vec![
                "Check option names and value types",
                "Remove unknown keys from the options file",
            ],
            LogError::TypeNotFound { .. } => vec![
                "Check the message type name spelling",
                "List available types from the session metadata",
            ],
            LogError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            LogError::Task { .. } => vec![
                "Retry the decode with a fresh session",
                "Check the logs for a panic inside the decoder",
            ],
        }
    }

    /// Helper constructor for an unsupported format hint.
    pub fn unsupported_format(hint: impl Into<String>) -> Self {
        LogError::UnsupportedFormat { hint: hint.into() }
    }

    /// Helper constructor for an aborted decode.
    pub fn decode_aborted(format: FormatKind, reason: impl Into<String>) -> Self {
        LogError::DecodeAborted { format, reason: reason.into() }
    }

    /// Helper constructor for reads past the end of a buffer.
    pub fn out_of_bounds(offset: usize, needed: usize, remaining: usize) -> Self {
        LogError::OutOfBounds { offset, needed, remaining }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LogError::File { path, source }
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<tokio::task::JoinError> for LogError {
    fn from(err: tokio::task::JoinError) -> Self {
        LogError::Task { details: err.to_string() }
    }
}
