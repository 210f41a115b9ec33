//! MAVLink stream decoding pass

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::dictionary::MessageDictionary;
use super::frame::{FrameHeader, MAGIC_V1, MAGIC_V2, TIMESTAMP_PREFIX_LEN};
use crate::decoder::{DecodeStats, LogDecoder, RecordSink, SessionClock};
use crate::types::{FormatKind, Record};
use crate::{LogError, Result};

/// Outcome of decoding at one offset.
enum Step {
    Advance(usize),
    Corrupt,
    Truncated,
    Stopped,
}

/// Decoder for MAVLink telemetry logs and raw MAVLink streams.
#[derive(Debug, Clone)]
pub struct MavlinkDecoder {
    dictionary: Arc<MessageDictionary>,
    timestamp_prefix: bool,
    max_resync_distance: Option<usize>,
}

/// Mutable state of one pass.
struct Pass<'s> {
    clock: SessionClock,
    stats: DecodeStats,
    announced: HashSet<u32>,
    sequences: HashMap<(u8, u8), u8>,
    /// Set between a corrupt frame and the next frame with a valid checksum
    resyncing: bool,
    sink: &'s mut dyn RecordSink,
}

impl MavlinkDecoder {
    /// Decoder for `.tlog` captures (8-byte timestamp before every frame).
    pub fn new(dictionary: Arc<MessageDictionary>) -> Self {
        Self { dictionary, timestamp_prefix: true, max_resync_distance: None }
    }

    pub fn with_timestamp_prefix(mut self, prefixed: bool) -> Self {
        self.timestamp_prefix = prefixed;
        self
    }

    pub fn with_max_resync_distance(mut self, distance: Option<usize>) -> Self {
        self.max_resync_distance = distance;
        self
    }

    fn prefix_len(&self) -> usize {
        if self.timestamp_prefix { TIMESTAMP_PREFIX_LEN } else { 0 }
    }

    fn step(&self, data: &[u8], pass: &mut Pass<'_>, position: usize) -> Step {
        let frame_start = position + self.prefix_len();
        let Some(&first) = data.get(frame_start) else {
            return Step::Truncated;
        };

        let Some(header) = FrameHeader::parse(&data[frame_start..]) else {
            return if first == MAGIC_V1 || first == MAGIC_V2 { Step::Truncated } else { Step::Corrupt };
        };
        let frame_end = frame_start + header.frame_len();
        let Some(frame) = data.get(frame_start..frame_end) else {
            return Step::Truncated;
        };

        let Some(definition) = self.dictionary.get(header.message_id) else {
            // Unknown frames carry no checksum we can verify, so their length
            // is only trusted on a frame boundary followed by another frame.
            if pass.resyncing || !self.frame_follows(data, frame_end) {
                return Step::Corrupt;
            }
            trace!("Skipping unknown message id {} at offset {}", header.message_id, frame_start);
            pass.stats.unknown_messages += 1;
            return Step::Advance(frame_end);
        };

        let stored = header.stored_checksum(frame);
        let computed = header.computed_checksum(frame, definition.crc_extra);
        if stored.is_none() || stored != computed {
            trace!(
                "Checksum mismatch for {} at offset {}",
                definition.descriptor.name,
                frame_start
            );
            pass.stats.bad_checksums += 1;
            return Step::Corrupt;
        }

        let values = match header.payload(frame).map(|p| definition.decode_payload(p)) {
            Some(Ok(values)) => values,
            _ => return Step::Corrupt,
        };
        pass.stats.recognized = true;
        pass.resyncing = false;
        self.track_sequence(pass, &header);

        let descriptor = Arc::clone(&definition.descriptor);
        if pass.announced.insert(header.message_id) {
            pass.stats.descriptors += 1;
            pass.sink.descriptor(&descriptor);
        }

        let timestamp = if self.timestamp_prefix {
            let prefix: [u8; TIMESTAMP_PREFIX_LEN] = match data[position..frame_start].try_into() {
                Ok(prefix) => prefix,
                Err(_) => return Step::Corrupt,
            };
            pass.clock.observe_absolute(u64::from_be_bytes(prefix))
        } else {
            pass.clock.stamp(&descriptor, &values)
        };

        pass.stats.records += 1;
        match pass.sink.record(Record::new(timestamp, descriptor, values)) {
            ControlFlow::Continue(()) => Step::Advance(frame_end),
            ControlFlow::Break(()) => Step::Stopped,
        }
    }

    /// Whether `position` is the end of the stream or the start of a frame.
    fn frame_follows(&self, data: &[u8], position: usize) -> bool {
        match data.get(position + self.prefix_len()) {
            Some(&byte) => byte == MAGIC_V1 || byte == MAGIC_V2,
            None => true,
        }
    }

    fn track_sequence(&self, pass: &mut Pass<'_>, header: &FrameHeader) {
        let source = (header.system_id, header.component_id);
        if let Some(last) = pass.sequences.insert(source, header.sequence) {
            let expected = last.wrapping_add(1);
            if header.sequence != expected {
                let gap = header.sequence.wrapping_sub(expected) as usize;
                debug!(
                    "Sequence gap of {} frames from system {} component {}",
                    gap, source.0, source.1
                );
                pass.stats.dropped_frames += gap;
            }
        }
    }

    /// Offset of the next candidate frame (prefix included) after `position`.
    fn next_frame_start(&self, data: &[u8], position: usize, limit: Option<usize>) -> Option<usize> {
        let prefix = self.prefix_len();
        let from = position + prefix + 1;
        let window = data.get(from..)?;
        let limit = limit.map_or(window.len(), |l| l.min(window.len()));
        window[..limit]
            .iter()
            .position(|&b| b == MAGIC_V1 || b == MAGIC_V2)
            .map(|offset| from + offset - prefix)
    }

    /// Find the next frame start after a corrupt position.
    fn resync(&self, data: &[u8], pass: &mut Pass<'_>, position: usize) -> Option<usize> {
        if let Some(next) = self.next_frame_start(data, position, self.max_resync_distance) {
            pass.stats.resynced(next - position);
            return Some(next);
        }

        pass.stats.resynced(data.len() - position);
        let scanned = data.len().saturating_sub(position + self.prefix_len() + 1);
        if let Some(limit) = self.max_resync_distance.filter(|&limit| limit < scanned) {
            warn!(
                "No frame start within {} bytes of offset {}, abandoning the remaining {} bytes",
                limit,
                position,
                data.len() - position
            );
            pass.stats.resync_limit_hit = true;
        }
        None
    }
}

impl LogDecoder for MavlinkDecoder {
    fn format(&self) -> FormatKind {
        FormatKind::Mavlink
    }

    fn decode(&mut self, data: &[u8], sink: &mut dyn RecordSink) -> Result<DecodeStats> {
        let mut pass = Pass {
            clock: SessionClock::new(),
            stats: DecodeStats::default(),
            announced: HashSet::new(),
            sequences: HashMap::new(),
            resyncing: false,
            sink,
        };

        let mut position = 0;
        while position < data.len() {
            match self.step(data, &mut pass, position) {
                Step::Advance(next) => position = next,
                Step::Corrupt => match self.resync(data, &mut pass, position) {
                    Some(next) => {
                        pass.resyncing = true;
                        position = next;
                    }
                    None => break,
                },
                // A header whose length runs past the end may itself be noise.
                Step::Truncated => match self.next_frame_start(data, position, None) {
                    Some(next) => {
                        pass.stats.resynced(next - position);
                        pass.resyncing = true;
                        position = next;
                    }
                    None => {
                        debug!("Stream ends inside a frame at offset {}", position);
                        pass.stats.truncated_tail = true;
                        break;
                    }
                },
                Step::Stopped => {
                    pass.stats.stopped_early = true;
                    break;
                }
            }
        }

        let stats = pass.stats;
        if !stats.recognized {
            return Err(LogError::decode_aborted(
                FormatKind::Mavlink,
                "no frame with a valid checksum was found",
            ));
        }

        debug!(
            "MAVLink pass complete: {} records, {} bad checksums, {} dropped frames",
            stats.records, stats.bad_checksums, stats.dropped_frames
        );
        Ok(stats)
    }
}
