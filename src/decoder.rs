//! Decoder trait shared by every log format
//!
//! A [`LogDecoder`] makes one forward pass over a buffer and pushes what it
//! finds into a [`RecordSink`]: descriptors as they become known, records in
//! stream order. Per-record corruption is recovered inside the pass and only
//! shows up in the returned [`DecodeStats`].

use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::Result;
use crate::types::{FormatKind, MessageTypeDescriptor, Record, Timestamp, Value};

/// Receiver of decoder output.
pub trait RecordSink {
    /// A descriptor became known. Always called before the first record that uses it.
    fn descriptor(&mut self, descriptor: &Arc<MessageTypeDescriptor>);

    /// A record was decoded. Returning `Break` ends the pass early.
    fn record(&mut self, record: Record) -> ControlFlow<()>;
}

/// Collects records and ignores descriptor announcements.
impl RecordSink for Vec<Record> {
    fn descriptor(&mut self, _descriptor: &Arc<MessageTypeDescriptor>) {}

    fn record(&mut self, record: Record) -> ControlFlow<()> {
        self.push(record);
        ControlFlow::Continue(())
    }
}

/// One decoding strategy.
pub trait LogDecoder: Send {
    /// Format this decoder handles.
    fn format(&self) -> FormatKind;

    /// Decode the whole buffer in a single forward pass.
    ///
    /// Returns:
    /// - `Ok(stats)` - Pass finished (end of buffer, truncated tail or sink break)
    /// - `Err(e)` - Nothing in the buffer could be recognized as this format
    fn decode(&mut self, data: &[u8], sink: &mut dyn RecordSink) -> Result<DecodeStats>;
}

/// Counters describing one decode pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Records handed to the sink
    pub records: usize,
    /// Records parsed but withheld by the type filter
    pub filtered: usize,
    /// Descriptors registered or looked up
    pub descriptors: usize,
    /// Regions that needed resynchronization
    pub corrupt_regions: usize,
    /// Bytes skipped while resynchronizing
    pub skipped_bytes: usize,
    /// Frames or blocks referencing an unknown message id
    pub unknown_messages: usize,
    /// Frames dropped for a checksum mismatch
    pub bad_checksums: usize,
    /// Frames missing according to sequence numbers
    pub dropped_frames: usize,
    /// Layout definitions that were rejected as inconsistent
    pub rejected_descriptors: usize,
    /// The buffer ended inside a record
    pub truncated_tail: bool,
    /// A resync scan gave up after the configured distance
    pub resync_limit_hit: bool,
    /// The sink asked to stop before the end of the buffer
    pub stopped_early: bool,
    /// Any valid structure (sync-marked record, valid frame, header) was seen
    pub recognized: bool,
}

impl DecodeStats {
    pub(crate) fn resynced(&mut self, skipped: usize) {
        self.corrupt_regions += 1;
        self.skipped_bytes += skipped;
    }
}

/// Session clock that never runs backwards.
///
/// Records without their own time take the current clock value.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    now: Timestamp,
    origin: Option<u64>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session time.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Observe a session-relative time, clamping it to be non-decreasing.
    pub fn observe(&mut self, time: Timestamp) -> Timestamp {
        self.now = self.now.max(time);
        self.now
    }

    /// Observe an absolute time. The first one seen becomes the session origin.
    pub fn observe_absolute(&mut self, absolute: u64) -> Timestamp {
        let origin = *self.origin.get_or_insert(absolute);
        self.observe(absolute.saturating_sub(origin))
    }

    /// Timestamp for a decoded record: its own time field when the descriptor
    /// has one, the current clock otherwise.
    pub fn stamp(&mut self, descriptor: &MessageTypeDescriptor, values: &[Value]) -> Timestamp {
        let own = descriptor
            .time_field
            .and_then(|(index, unit)| values.get(index)?.as_u64().map(|raw| unit.to_micros(raw)));
        match own {
            Some(time) => self.observe(time),
            None => self.now,
        }
    }
}
