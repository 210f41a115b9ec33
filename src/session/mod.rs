//! Caller-facing decode handles
//!
//! [`ParseTask`] is the in-flight pass: a stream of [`ParseEvent`]s that
//! resolves into a [`Session`] once the pass is done. A [`Session`] owns the
//! finished index together with the original buffer, so single types can be
//! decoded later with [`Session::load_type`] and the whole session narrowed
//! with [`Session::trim_file`]. Both follow-ups take `&mut self`, which keeps
//! them strictly sequential.

use futures::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DecodeOptions;
use crate::decoder::DecodeStats;
use crate::dispatch::decoder_for;
use crate::driver::{DecodeJob, DecodeOutput, Driver, ParseEvent};
use crate::index::{MessageIndex, SessionMetadata};
use crate::summary::FlightSummary;
use crate::types::{FormatKind, Record, Timestamp};
use crate::{LogError, Result};

#[cfg(test)]
mod tests;

/// A decode pass running in the background.
///
/// Dropping the task cancels the pass and discards its output.
#[derive(Debug)]
pub struct ParseTask {
    events: UnboundedReceiverStream<ParseEvent>,
    handle: Option<JoinHandle<Result<DecodeOutput>>>,
    cancel: CancellationToken,
    job: DecodeJob,
}

impl ParseTask {
    pub(crate) fn spawn(job: DecodeJob) -> Self {
        let channels = Driver::spawn(job.clone());
        Self {
            events: UnboundedReceiverStream::new(channels.events),
            handle: Some(channels.handle),
            cancel: channels.cancel,
            job,
        }
    }

    pub fn format(&self) -> FormatKind {
        self.job.kind
    }

    /// Next progress event, `None` once the pass has ended.
    pub async fn next_event(&mut self) -> Option<ParseEvent> {
        self.events.next().await
    }

    /// Stop the pass. [`finish`](Self::finish) then fails with [`LogError::Task`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the pass to end and take the finished session.
    ///
    /// Events not consumed yet are discarded.
    pub async fn finish(mut self) -> Result<Session> {
        self.events.close();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| LogError::Task { details: "decode task already awaited".to_string() })?;
        let (index, stats) = handle.await??;
        Ok(Session::new(self.job.clone(), index, stats))
    }
}

impl Stream for ParseTask {
    type Item = ParseEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for ParseTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Dropping unfinished parse task");
            self.cancel.cancel();
        }
    }
}

/// A fully decoded log.
#[derive(Debug)]
pub struct Session {
    job: DecodeJob,
    index: MessageIndex,
    stats: DecodeStats,
    /// Types left out of the initial pass by the filter
    unloaded: HashSet<String>,
    /// Window every trim so far has narrowed the session to
    window: Option<(Timestamp, Timestamp)>,
}

impl Session {
    fn new(job: DecodeJob, index: MessageIndex, stats: DecodeStats) -> Self {
        let unloaded = match (job.kind, job.options.filter_set()) {
            (FormatKind::Dataflash, Some(filter)) => {
                index.all_types().iter().filter(|name| !filter.contains(*name)).cloned().collect()
            }
            _ => HashSet::new(),
        };
        Self { job, index, stats, unloaded, window: None }
    }

    pub fn format(&self) -> FormatKind {
        self.job.kind
    }

    pub fn index(&self) -> &MessageIndex {
        &self.index
    }

    pub fn into_index(self) -> MessageIndex {
        self.index
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub fn metadata(&self) -> SessionMetadata {
        self.index.metadata_snapshot()
    }

    pub fn all_types(&self) -> &[String] {
        self.index.all_types()
    }

    pub fn records_of_type(&self, name: &str) -> &[Record] {
        self.index.records_of_type(name)
    }

    /// Whether records of `name` are held (or were never filtered out).
    pub fn is_loaded(&self, name: &str) -> bool {
        self.index.contains_type(name) && !self.unloaded.contains(name)
    }

    /// Current trim window, if the session was trimmed.
    pub fn window(&self) -> Option<(Timestamp, Timestamp)> {
        self.window
    }

    pub fn summary(&self) -> FlightSummary {
        FlightSummary::from_index(&self.index)
    }

    /// Decode the records of one type that the initial pass filtered out.
    ///
    /// Calling it again for a loaded type returns the held records without
    /// decoding. Records outside an earlier trim window are dropped.
    pub async fn load_type(&mut self, name: &str) -> Result<&[Record]> {
        if !self.index.contains_type(name) {
            return Err(LogError::TypeNotFound { name: name.to_string() });
        }
        if !self.unloaded.contains(name) {
            return Ok(self.index.records_of_type(name));
        }

        let mut job = self.job.clone();
        job.options = job.options.with_type_filter([name]);
        let window = self.window;
        let records = tokio::task::spawn_blocking(move || -> Result<Vec<Record>> {
            let mut decoder = decoder_for(job.kind, &job.hint, &job.options)?;
            let mut records: Vec<Record> = Vec::new();
            decoder.decode(&job.data, &mut records)?;
            if let Some((start, end)) = window {
                records.retain(|record| (start..=end).contains(&record.timestamp));
            }
            Ok(records)
        })
        .await??;

        info!("Loaded {} records of {}", records.len(), name);
        self.index.extend(records.into_iter().filter(|record| record.type_name() == name));
        self.unloaded.remove(name);
        Ok(self.index.records_of_type(name))
    }

    /// Drop every record outside `[start, end]` and return the new metadata.
    ///
    /// Destructive: trimmed records cannot be brought back, and types loaded
    /// later are cut to the same window.
    pub async fn trim_file(&mut self, start: Timestamp, end: Timestamp) -> Result<SessionMetadata> {
        let placeholder = MessageIndex::new(String::new(), 0, self.job.kind);
        let mut index = std::mem::replace(&mut self.index, placeholder);

        let trimmed = tokio::task::spawn_blocking(move || {
            index.trim_to_window(start, end);
            index
        })
        .await;

        self.index = trimmed?;
        self.window = Some(match self.window {
            Some((a, b)) => (a.max(start), b.min(end)),
            None => (start, end),
        });
        Ok(self.index.metadata_snapshot())
    }
}

/// Start a background pass over `data`.
pub(crate) fn start(data: Arc<[u8]>, hint: &str, options: DecodeOptions) -> Result<ParseTask> {
    options.validate()?;
    let kind = FormatKind::from_hint(hint)?;
    Ok(ParseTask::spawn(DecodeJob { data, hint: hint.to_string(), kind, options }))
}
