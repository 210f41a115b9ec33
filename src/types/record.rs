//! Decoded record type

use std::sync::Arc;

use super::{MessageTypeDescriptor, Timestamp, Value};

/// One decoded message instance.
///
/// A record shares the descriptor it was decoded with, so field names and
/// arity always match the layout in force at the point it appeared in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Session-relative timestamp in microseconds
    pub timestamp: Timestamp,

    /// Descriptor in force when this record was decoded
    pub descriptor: Arc<MessageTypeDescriptor>,

    /// Field values in descriptor order
    pub values: Vec<Value>,
}

impl Record {
    /// Create a new record
    pub fn new(
        timestamp: Timestamp,
        descriptor: Arc<MessageTypeDescriptor>,
        values: Vec<Value>,
    ) -> Self {
        debug_assert_eq!(descriptor.fields.len(), values.len());
        Self { timestamp, descriptor, values }
    }

    pub fn type_name(&self) -> &str {
        &self.descriptor.name
    }

    /// Value of the named field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.descriptor.field_index(field).and_then(|i| self.values.get(i))
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Numeric value with the descriptor's display multiplier applied.
    pub fn scaled(&self, field: &str) -> Option<f64> {
        let index = self.descriptor.field_index(field)?;
        let raw = self.values.get(index)?.as_f64()?;
        Some(match self.descriptor.fields[index].multiplier {
            Some(multiplier) => raw * multiplier,
            None => raw,
        })
    }

    /// Field names paired with their values, in descriptor order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.descriptor.fields.iter().map(|f| f.name.as_str()).zip(self.values.iter())
    }

    /// Timestamp in seconds.
    pub fn seconds(&self) -> f64 {
        self.timestamp as f64 / 1_000_000.0
    }
}
