//! Core types for decoded flight log data.
//!
//! The same normalized shape comes out of every decoder:
//! - [`MessageTypeDescriptor`] describes a message layout (discovered, looked up or built in)
//! - [`Record`] is one decoded message, sharing the descriptor it was decoded with
//! - [`Value`] carries each decoded field with its scalar tag
//! - [`FormatKind`] selects the decoder for a buffer
//!
//! ## Usage Example
//!
//! ```rust
//! use flightlog::types::{FieldDescriptor, MessageTypeDescriptor, Record, ScalarType, Value};
//! use std::sync::Arc;
//!
//! let att = Arc::new(MessageTypeDescriptor::new(
//!     1,
//!     "ATT",
//!     vec![
//!         FieldDescriptor::new("TimeUS", ScalarType::UInt64),
//!         FieldDescriptor::new("Roll", ScalarType::Float32).with_unit("deg"),
//!     ],
//! ));
//!
//! let record = Record::new(1_500, att, vec![Value::UInt64(1_500), Value::Float32(2.5)]);
//! assert_eq!(record.type_name(), "ATT");
//! assert_eq!(record.get_f64("Roll"), Some(2.5));
//! ```

mod descriptor;
mod format_kind;
mod record;
mod scalar;

pub use descriptor::{FieldDescriptor, MessageTypeDescriptor, TimeUnit};
pub use format_kind::FormatKind;
pub use record::Record;
pub use scalar::{ScalarType, Value};

/// Session-relative timestamp in microseconds.
pub type Timestamp = u64;
