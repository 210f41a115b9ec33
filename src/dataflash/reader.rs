//! Dataflash decoding pass

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::format::{
    DescriptorRegistry, FMT_LENGTH, FMT_TYPE, FmtRecord, HEAD_BYTE1, HEAD_BYTE2, HEADER_SIZE,
    SYNC_MARKER,
};
use crate::config::DecodeOptions;
use crate::cursor::{ByteCursor, Endian};
use crate::decoder::{DecodeStats, LogDecoder, RecordSink, SessionClock};
use crate::types::{FormatKind, Record};
use crate::{LogError, Result};

/// Outcome of decoding at one offset.
enum Step {
    /// Continue at the given offset
    Advance(usize),
    /// No valid record here, resynchronize
    Corrupt,
    /// The buffer ends inside the record at this offset
    Truncated,
    /// The sink asked to stop
    Stopped,
}

/// Decoder for self-describing dataflash logs.
#[derive(Debug, Clone, Default)]
pub struct DataflashDecoder {
    filter: Option<HashSet<String>>,
    max_resync_distance: Option<usize>,
}

impl DataflashDecoder {
    pub fn new(options: &DecodeOptions) -> Self {
        Self {
            filter: options.filter_set(),
            max_resync_distance: options.max_resync_distance,
        }
    }

    fn wants(&self, name: &str) -> bool {
        self.filter.as_ref().is_none_or(|set| set.contains(name))
    }
}

/// Mutable state of one pass.
struct Pass<'a, 's> {
    cursor: ByteCursor<'a>,
    registry: DescriptorRegistry,
    clock: SessionClock,
    stats: DecodeStats,
    sink: &'s mut dyn RecordSink,
}

impl LogDecoder for DataflashDecoder {
    fn format(&self) -> FormatKind {
        FormatKind::Dataflash
    }

    fn decode(&mut self, data: &[u8], sink: &mut dyn RecordSink) -> Result<DecodeStats> {
        let mut pass = Pass {
            cursor: ByteCursor::new(data, Endian::Little),
            registry: DescriptorRegistry::new(),
            clock: SessionClock::new(),
            stats: DecodeStats::default(),
            sink,
        };

        let mut position = 0;
        while position < data.len() {
            pass.cursor.seek(position)?;
            match self.step(&mut pass, position) {
                Step::Advance(next) => position = next,
                Step::Corrupt => match self.resync(&mut pass, position) {
                    Some(next) => position = next,
                    None => break,
                },
                Step::Truncated => {
                    debug!("Log ends inside a record at offset {}", position);
                    pass.stats.truncated_tail = true;
                    break;
                }
                Step::Stopped => {
                    pass.stats.stopped_early = true;
                    break;
                }
            }
        }

        let stats = pass.stats;
        if !stats.recognized {
            return Err(LogError::decode_aborted(
                FormatKind::Dataflash,
                "no sync-marked record could be decoded",
            ));
        }

        debug!(
            "Dataflash pass complete: {} records, {} types, {} corrupt regions",
            stats.records,
            pass.registry.len(),
            stats.corrupt_regions
        );
        Ok(stats)
    }
}

impl DataflashDecoder {
    fn step(&self, pass: &mut Pass<'_, '_>, position: usize) -> Step {
        let header = match pass.cursor.read_bytes(HEADER_SIZE) {
            Ok(header) => header,
            Err(_) => return Step::Truncated,
        };
        if header[0] != HEAD_BYTE1 || header[1] != HEAD_BYTE2 {
            return Step::Corrupt;
        }

        let type_id = header[2];
        if type_id == FMT_TYPE {
            return self.read_fmt(pass, position);
        }

        let Some(entry) = pass.registry.get(type_id) else {
            trace!("Unknown type id {} at offset {}", type_id, position);
            pass.stats.unknown_messages += 1;
            return Step::Corrupt;
        };
        let descriptor = Arc::clone(&entry.descriptor);
        let length = entry.length;

        let body = match pass.cursor.read_bytes(length - HEADER_SIZE) {
            Ok(body) => body,
            Err(_) => return Step::Truncated,
        };
        let values = match ByteCursor::new(body, Endian::Little).read_fields(&descriptor.fields) {
            Ok(values) => values,
            // Registered lengths always cover the fields.
            Err(_) => return Step::Corrupt,
        };
        pass.stats.recognized = true;

        let timestamp = pass.clock.stamp(&descriptor, &values);
        let record = Record::new(timestamp, descriptor, values);

        if let Some(annotated) = pass.registry.absorb_metadata(&record) {
            pass.sink.descriptor(&annotated);
        }

        let next = position + length;
        if !self.wants(record.type_name()) {
            pass.stats.filtered += 1;
            return Step::Advance(next);
        }

        pass.stats.records += 1;
        match pass.sink.record(record) {
            ControlFlow::Continue(()) => Step::Advance(next),
            ControlFlow::Break(()) => Step::Stopped,
        }
    }

    fn read_fmt(&self, pass: &mut Pass<'_, '_>, position: usize) -> Step {
        let fmt = match FmtRecord::parse_from(&mut pass.cursor) {
            Ok(fmt) => fmt,
            Err(_) => return Step::Truncated,
        };
        pass.stats.recognized = true;

        match pass.registry.register(&fmt) {
            Ok(descriptor) => {
                pass.stats.descriptors += 1;
                pass.sink.descriptor(&descriptor);
            }
            Err(e) => {
                warn!("Rejected format definition at offset {}: {}", position, e);
                pass.stats.rejected_descriptors += 1;
            }
        }
        Step::Advance(position + FMT_LENGTH)
    }

    /// Find the next sync marker after a corrupt position.
    ///
    /// Returns `None` when the pass should end.
    fn resync(&self, pass: &mut Pass<'_, '_>, position: usize) -> Option<usize> {
        let data_len = pass.cursor.len();
        let from = position + 1;

        if let Some(next) = pass.cursor.find(&SYNC_MARKER, from, self.max_resync_distance) {
            trace!("Resynchronized at offset {} after {} bytes", next, next - position);
            pass.stats.resynced(next - position);
            return Some(next);
        }

        let remaining = data_len - position;
        pass.stats.resynced(remaining);
        if let Some(limit) = self.max_resync_distance {
            if data_len.saturating_sub(from) > limit {
                warn!(
                    "No sync marker within {} bytes of offset {}, abandoning the remaining {} bytes",
                    limit, position, remaining
                );
                pass.stats.resync_limit_hit = true;
            }
        }
        None
    }
}
