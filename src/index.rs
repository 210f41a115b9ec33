//! Queryable message index
//!
//! [`MessageIndex`] keeps one ordered sequence of records per type name,
//! together with the running counters that make up [`SessionMetadata`].
//! Records are only ever appended, except by [`MessageIndex::trim_to_window`].

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

use crate::decoder::RecordSink;
use crate::types::{FormatKind, MessageTypeDescriptor, Record, Timestamp};

/// Point-in-time description of a decoded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub format: FormatKind,
    /// Records held across all types
    pub message_count: usize,
    /// Every discovered type name in discovery order, filtered or trimmed
    /// types included
    pub message_types: Vec<String>,
    /// Names of types holding at least one record, sorted
    pub loaded_types: Vec<String>,
    pub first_timestamp: Option<Timestamp>,
    pub last_timestamp: Option<Timestamp>,
    /// `last_timestamp - first_timestamp` in microseconds
    pub duration: Timestamp,
}

impl SessionMetadata {
    pub fn duration_secs(&self) -> f64 {
        self.duration as f64 / 1_000_000.0
    }
}

/// Per-type record store for one session.
#[derive(Debug, Clone)]
pub struct MessageIndex {
    file_name: String,
    file_size: u64,
    format: FormatKind,
    /// Type names in the order their descriptors were announced
    types: Vec<String>,
    descriptors: HashMap<String, Arc<MessageTypeDescriptor>>,
    records: HashMap<String, Vec<Record>>,
    message_count: usize,
    first_timestamp: Option<Timestamp>,
    last_timestamp: Option<Timestamp>,
}

impl MessageIndex {
    pub fn new(file_name: impl Into<String>, file_size: u64, format: FormatKind) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            format,
            types: Vec::new(),
            descriptors: HashMap::new(),
            records: HashMap::new(),
            message_count: 0,
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    /// Record a descriptor. Returns `true` when its type name is new.
    ///
    /// A redefinition replaces the current descriptor; stored records keep
    /// the one they were decoded with.
    pub fn register_descriptor(&mut self, descriptor: &Arc<MessageTypeDescriptor>) -> bool {
        let is_new = !self.descriptors.contains_key(&descriptor.name);
        if is_new {
            self.types.push(descriptor.name.clone());
        }
        self.descriptors.insert(descriptor.name.clone(), Arc::clone(descriptor));
        is_new
    }

    /// Append one record to its type's sequence.
    pub fn append(&mut self, record: Record) {
        if !self.descriptors.contains_key(record.type_name()) {
            self.register_descriptor(&Arc::clone(&record.descriptor));
        }

        let timestamp = record.timestamp;
        self.first_timestamp = Some(self.first_timestamp.map_or(timestamp, |t| t.min(timestamp)));
        self.last_timestamp = Some(self.last_timestamp.map_or(timestamp, |t| t.max(timestamp)));
        self.message_count += 1;

        match self.records.get_mut(record.type_name()) {
            Some(sequence) => sequence.push(record),
            None => {
                self.records.insert(record.type_name().to_string(), vec![record]);
            }
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.append(record);
        }
    }

    /// Records of one type in decode order, empty when none are held.
    pub fn records_of_type(&self, name: &str) -> &[Record] {
        self.records.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every type name a descriptor was announced for, in discovery order.
    ///
    /// Includes types whose records were filtered out or trimmed away.
    pub fn all_types(&self) -> &[String] {
        &self.types
    }

    /// Type names that currently hold records, sorted.
    pub fn loaded_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn descriptor(&self, name: &str) -> Option<&Arc<MessageTypeDescriptor>> {
        self.descriptors.get(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.message_count
    }

    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }

    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// Record count per type.
    pub fn message_counts(&self) -> BTreeMap<String, usize> {
        self.records.iter().map(|(name, records)| (name.clone(), records.len())).collect()
    }

    pub fn metadata_snapshot(&self) -> SessionMetadata {
        SessionMetadata {
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            format: self.format,
            message_count: self.message_count,
            message_types: self.types.clone(),
            loaded_types: self.loaded_types(),
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
            duration: match (self.first_timestamp, self.last_timestamp) {
                (Some(first), Some(last)) => last - first,
                _ => 0,
            },
        }
    }

    /// Remove every record outside the closed interval `[start, end]`.
    ///
    /// Types left without records drop out of the metadata's loaded types,
    /// but stay discovered. An inverted window removes
    /// everything.
    pub fn trim_to_window(&mut self, start: Timestamp, end: Timestamp) {
        let before = self.message_count;
        let window = start..=end;

        self.records.retain(|_, records| {
            records.retain(|record| window.contains(&record.timestamp));
            !records.is_empty()
        });

        self.message_count = 0;
        self.first_timestamp = None;
        self.last_timestamp = None;
        for record in self.records.values().flatten() {
            self.message_count += 1;
            let t = record.timestamp;
            self.first_timestamp = Some(self.first_timestamp.map_or(t, |first| first.min(t)));
            self.last_timestamp = Some(self.last_timestamp.map_or(t, |last| last.max(t)));
        }

        debug!(
            "Trimmed index to [{}, {}]: {} of {} records kept",
            start, end, self.message_count, before
        );
    }
}

impl RecordSink for MessageIndex {
    fn descriptor(&mut self, descriptor: &Arc<MessageTypeDescriptor>) {
        self.register_descriptor(descriptor);
    }

    fn record(&mut self, record: Record) -> ControlFlow<()> {
        self.append(record);
        ControlFlow::Continue(())
    }
}
