//! Driver runs a decode pass off the async runtime and reports progress as events

use std::mem;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::DecodeOptions;
use crate::decoder::{DecodeStats, RecordSink};
use crate::dispatch::decoder_for;
use crate::index::{MessageIndex, SessionMetadata};
use crate::types::{FormatKind, MessageTypeDescriptor, Record};
use crate::{LogError, Result};

/// Progress of one decode pass, in stream order.
#[derive(Debug, Clone)]
pub enum ParseEvent {
    /// Pass accepted and about to start
    Started { file_name: String, format: FormatKind },
    /// Every type name announced so far, in discovery order
    AvailableTypes(Vec<String>),
    /// Up to `batch_size` records in decode order
    Messages(Vec<Record>),
    /// Metadata of the finished index
    Metadata(SessionMetadata),
    /// Pass finished
    Done(DecodeStats),
}

/// Input of one decode pass.
#[derive(Clone)]
pub(crate) struct DecodeJob {
    pub data: Arc<[u8]>,
    pub hint: String,
    pub kind: FormatKind,
    pub options: DecodeOptions,
}

impl DecodeJob {
    pub fn file_name(&self) -> String {
        self.options.file_name.clone().unwrap_or_else(|| self.hint.clone())
    }
}

impl std::fmt::Debug for DecodeJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeJob")
            .field("bytes", &self.data.len())
            .field("hint", &self.hint)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish()
    }
}

pub(crate) type DecodeOutput = (MessageIndex, DecodeStats);

/// Result of spawning a decode pass
pub(crate) struct DriverChannels {
    /// Receiver for progress events
    pub events: mpsc::UnboundedReceiver<ParseEvent>,
    /// Finished index and statistics
    pub handle: JoinHandle<Result<DecodeOutput>>,
    /// Stops the pass at the next record
    pub cancel: CancellationToken,
}

/// Spawns decode passes on the blocking pool.
///
/// Decoding is sequential and CPU bound, so each pass owns one blocking
/// thread and its own [`MessageIndex`]. The caller hears about it only
/// through the event channel and the join handle.
pub(crate) struct Driver;

impl Driver {
    pub fn spawn(job: DecodeJob) -> DriverChannels {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || Self::decode_task(job, event_tx, cancel_task));

        DriverChannels { events: event_rx, handle, cancel }
    }

    fn decode_task(
        job: DecodeJob,
        events: mpsc::UnboundedSender<ParseEvent>,
        cancel: CancellationToken,
    ) -> Result<DecodeOutput> {
        let file_name = job.file_name();
        info!("Decode task started: {} ({}, {} bytes)", file_name, job.kind, job.data.len());

        let index = MessageIndex::new(file_name.clone(), job.data.len() as u64, job.kind);
        let mut sink = EventSink::new(index, events, job.options.batch_size, cancel.clone());
        sink.send(ParseEvent::Started { file_name, format: job.kind });

        let mut decoder = decoder_for(job.kind, &job.hint, &job.options)?;
        let stats = match decoder.decode(&job.data, &mut sink) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Decode failed: {}", e);
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            info!("Decode task cancelled after {} records", stats.records);
            return Err(LogError::Task { details: "decode cancelled".to_string() });
        }

        info!(
            "Decode task ended: {} records, {} types, {} corrupt regions",
            stats.records,
            sink.index.all_types().len(),
            stats.corrupt_regions
        );
        Ok(sink.finish(stats))
    }
}

/// Sink that fills the pass's index and mirrors it as batched events.
struct EventSink {
    index: MessageIndex,
    events: mpsc::UnboundedSender<ParseEvent>,
    batch: Vec<Record>,
    batch_size: usize,
    types_changed: bool,
    /// False once the receiver is gone; the index is still filled
    listening: bool,
    cancel: CancellationToken,
}

impl EventSink {
    fn new(
        index: MessageIndex,
        events: mpsc::UnboundedSender<ParseEvent>,
        batch_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            index,
            events,
            batch: Vec::with_capacity(batch_size.min(4096)),
            batch_size,
            types_changed: false,
            listening: true,
            cancel,
        }
    }

    fn send(&mut self, event: ParseEvent) {
        if self.listening && self.events.send(event).is_err() {
            debug!("Event receiver dropped, decoding continues without events");
            self.listening = false;
            self.batch.clear();
        }
    }

    fn flush(&mut self) {
        if self.types_changed {
            self.types_changed = false;
            let types = self.index.all_types().to_vec();
            self.send(ParseEvent::AvailableTypes(types));
        }
        if !self.batch.is_empty() {
            let batch = mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size.min(4096)));
            trace!("Sending batch of {} records", batch.len());
            self.send(ParseEvent::Messages(batch));
        }
    }

    fn finish(mut self, stats: DecodeStats) -> DecodeOutput {
        self.flush();
        let metadata = self.index.metadata_snapshot();
        self.send(ParseEvent::Metadata(metadata));
        self.send(ParseEvent::Done(stats.clone()));
        (self.index, stats)
    }
}

impl RecordSink for EventSink {
    fn descriptor(&mut self, descriptor: &Arc<MessageTypeDescriptor>) {
        if self.index.register_descriptor(descriptor) {
            debug!("New message type: {}", descriptor.name);
            self.types_changed = true;
        }
    }

    fn record(&mut self, record: Record) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        if self.listening {
            self.batch.push(record.clone());
        }
        self.index.append(record);
        if self.batch.len() >= self.batch_size {
            self.flush();
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_dataflash_log, sample_tlog};

    fn job(data: Vec<u8>, hint: &str, options: DecodeOptions) -> DecodeJob {
        DecodeJob {
            data: data.into(),
            hint: hint.to_string(),
            kind: FormatKind::from_hint(hint).unwrap(),
            options,
        }
    }

    async fn collect(mut channels: DriverChannels) -> (Vec<ParseEvent>, Result<DecodeOutput>) {
        let mut events = Vec::new();
        while let Some(event) = channels.events.recv().await {
            events.push(event);
        }
        (events, channels.handle.await.unwrap())
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let options = DecodeOptions::default().with_batch_size(4);
        let channels = Driver::spawn(job(sample_dataflash_log(10), "bin", options));
        let (events, output) = collect(channels).await;
        let (index, stats) = output.unwrap();

        assert!(matches!(&events[0], ParseEvent::Started { format: FormatKind::Dataflash, .. }));
        assert!(matches!(&events[1], ParseEvent::AvailableTypes(_)));
        assert!(matches!(events.last(), Some(ParseEvent::Done(_))));
        assert!(matches!(&events[events.len() - 2], ParseEvent::Metadata(m) if m.message_count == index.len()));

        let streamed: Vec<Record> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::Messages(batch) => Some(batch.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(streamed.len(), stats.records);
        assert!(events.iter().all(|e| !matches!(e, ParseEvent::Messages(b) if b.len() > 4)));
    }

    #[tokio::test]
    async fn types_announced_before_their_records() {
        let channels = Driver::spawn(job(sample_tlog(5), "tlog", DecodeOptions::default().with_batch_size(1)));
        let (events, _) = collect(channels).await;

        let mut known: Vec<String> = Vec::new();
        for event in &events {
            match event {
                ParseEvent::AvailableTypes(types) => known = types.clone(),
                ParseEvent::Messages(batch) => {
                    for record in batch {
                        assert!(known.iter().any(|t| t == record.type_name()));
                    }
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn aborted_decode_returns_error() {
        let channels = Driver::spawn(job(vec![0x55; 64], "bin", DecodeOptions::default()));
        let (events, output) = collect(channels).await;
        assert!(matches!(output, Err(LogError::DecodeAborted { .. })));
        assert!(!events.iter().any(|e| matches!(e, ParseEvent::Done(_))));
    }

    #[tokio::test]
    async fn dropped_receiver_still_fills_index() {
        let channels = Driver::spawn(job(sample_dataflash_log(20), "bin", DecodeOptions::default()));
        drop(channels.events);
        let (index, _) = channels.handle.await.unwrap().unwrap();
        assert_eq!(index.records_of_type("GPS").len(), 20);
    }

    #[test]
    fn cancelled_pass_discards_output() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = job(sample_dataflash_log(200), "bin", DecodeOptions::default().with_batch_size(1));
        let output = Driver::decode_task(job, event_tx, cancel);
        assert!(matches!(output, Err(LogError::Task { .. })));

        let mut events = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ParseEvent::Started { .. })));
        assert!(!events.iter().any(|e| matches!(e, ParseEvent::Messages(_) | ParseEvent::Done(_))));
    }
}
