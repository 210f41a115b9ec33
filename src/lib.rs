//! Incremental decoder for drone flight logs.
//!
//! Flightlog turns the raw bytes of a flight log into a per-type index of
//! normalized records, without blocking the caller while it works.
//!
//! # Formats
//!
//! - **Dataflash**: self-describing onboard logs (`.bin`, `.log`), message
//!   layouts discovered from in-stream FMT records
//! - **MAVLink**: telemetry captures (`.tlog`) and raw MAVLink v1/v2 streams,
//!   decoded with a YAML message dictionary
//! - **Vendor**: fixed-layout `FLTREC` flight records (`.dat`)
//!
//! Corruption inside a log is recovered from locally by resynchronizing at the
//! next record boundary. Only an unknown format hint or a buffer with nothing
//! recognizable in it fails a decode.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flightlog::{DecodeOptions, FlightLog, ParseEvent};
//!
//! #[tokio::main]
//! async fn main() -> flightlog::Result<()> {
//!     let mut task = FlightLog::open("00000042.BIN", DecodeOptions::default()).await?;
//!
//!     while let Some(event) = task.next_event().await {
//!         if let ParseEvent::AvailableTypes(types) = event {
//!             println!("types so far: {}", types.join(", "));
//!         }
//!     }
//!
//!     let session = task.finish().await?;
//!     println!("{} records", session.metadata().message_count);
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod cursor;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoders
pub mod dataflash;
pub mod decoder;
pub mod dispatch;
pub mod mavlink;
pub mod vendor;

// Decoded data and background processing
pub mod driver;
pub mod index;
pub mod session;
pub mod summary;

// Core exports
pub use error::*;
pub use types::*;

pub use config::DecodeOptions;
pub use cursor::{ByteCursor, Endian};
pub use decoder::{DecodeStats, LogDecoder, RecordSink, SessionClock};
pub use dispatch::{decode_buffer, decoder_for};

// Decoder exports
pub use dataflash::DataflashDecoder;
pub use mavlink::{MavlinkDecoder, MessageDictionary};
pub use vendor::VendorDecoder;

// Main API exports
pub use driver::ParseEvent;
pub use index::{MessageIndex, SessionMetadata};
pub use session::{ParseTask, Session};
pub use summary::FlightSummary;

use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Unified entry point for decoding flight logs.
///
/// Every decode runs on tokio's blocking pool and reports progress through a
/// [`ParseTask`], so these functions must be called from within a tokio
/// runtime.
///
/// # Examples
///
/// ## In-memory buffer
/// ```rust,no_run
/// use flightlog::{DecodeOptions, FlightLog};
///
/// # #[tokio::main]
/// # async fn main() -> flightlog::Result<()> {
/// let bytes = std::fs::read("flight.tlog")?;
/// let session = FlightLog::decode(bytes, "tlog", DecodeOptions::default()).await?;
/// println!("{:?}", session.index().message_counts());
/// # Ok(())
/// # }
/// ```
///
/// ## Only some dataflash types, the rest on demand
/// ```rust,no_run
/// use flightlog::{DecodeOptions, FlightLog};
///
/// # #[tokio::main]
/// # async fn main() -> flightlog::Result<()> {
/// let options = DecodeOptions::default().with_type_filter(["ATT", "GPS"]);
/// let mut session = FlightLog::open("00000042.BIN", options).await?.finish().await?;
/// let baro = session.load_type("BARO").await?;
/// println!("{} BARO records", baro.len());
/// # Ok(())
/// # }
/// ```
pub struct FlightLog;

impl FlightLog {
    /// Start decoding `data` in the background.
    ///
    /// `hint` is a file extension, file name or format name (`dataflash`,
    /// `mavlink`, `vendor`). A raw `mavlink` hint means frames carry no
    /// timestamp prefix unless the options say otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error before anything is spawned if:
    /// - The hint matches no format ([`LogError::UnsupportedFormat`])
    /// - The options are invalid ([`LogError::Config`])
    pub fn parse(data: impl Into<Arc<[u8]>>, hint: &str, options: DecodeOptions) -> Result<ParseTask> {
        session::start(data.into(), hint, options)
    }

    /// Read a log file and start decoding it in the background.
    ///
    /// The format comes from the file's extension and the file name is
    /// reported in the session metadata unless the options name one.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The extension matches no format
    /// - The file cannot be read
    /// - The options are invalid
    pub async fn open<P: AsRef<Path>>(path: P, options: DecodeOptions) -> Result<ParseTask> {
        let path = path.as_ref();
        info!("Opening flight log: {}", path.display());

        let hint = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        FormatKind::from_hint(&hint)?;

        let data = tokio::fs::read(path).await.map_err(|e| LogError::file_error(path.to_path_buf(), e))?;
        let options = if options.file_name.is_none() { options.with_file_name(hint.clone()) } else { options };
        session::start(data.into(), &hint, options)
    }

    /// Decode `data` and wait for the finished session, ignoring progress events.
    pub async fn decode(data: impl Into<Arc<[u8]>>, hint: &str, options: DecodeOptions) -> Result<Session> {
        Self::parse(data, hint, options)?.finish().await
    }
}
