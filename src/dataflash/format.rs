//! Dataflash record layout and descriptor registry
//!
//! ## Record Structure
//!
//! Every record starts with a 3-byte header followed by a body whose layout is
//! defined at runtime:
//!
//! ```text
//! +------+------+---------+---------------------------+
//! | 0xA3 | 0x95 | type id | body (length - 3 bytes)   |
//! +------+------+---------+---------------------------+
//! ```
//!
//! Type id 128 is reserved for FMT records, which define every other type:
//!
//! ```text
//! struct fmt_body {
//!     uint8_t  type;         // numeric id being defined
//!     uint8_t  length;       // full record length, header included
//!     char     name[4];      // short type name
//!     char     format[16];   // one format character per field
//!     char     columns[64];  // comma-separated field names
//! };
//! ```
//!
//! UNIT, MULT and FMTU records, once defined through FMT, attach display units
//! and multipliers to descriptors that were registered earlier.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cursor::ByteCursor;
use crate::types::{FieldDescriptor, MessageTypeDescriptor, Record, ScalarType};
use crate::{LogError, Result};

/// First sync byte of every record
pub const HEAD_BYTE1: u8 = 0xA3;
/// Second sync byte of every record
pub const HEAD_BYTE2: u8 = 0x95;
/// Sync marker as a byte pattern
pub const SYNC_MARKER: [u8; 2] = [HEAD_BYTE1, HEAD_BYTE2];
/// Size of the record header (sync marker + type id)
pub const HEADER_SIZE: usize = 3;
/// Reserved type id of format definition records
pub const FMT_TYPE: u8 = 128;
/// Full length of an FMT record, header included
pub const FMT_LENGTH: usize = 89;

const FMT_NAME_SIZE: usize = 4;
const FMT_FORMAT_SIZE: usize = 16;
const FMT_COLUMNS_SIZE: usize = 64;

/// Decode rule for one format character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatChar {
    pub scalar: ScalarType,
    pub count: usize,
    pub multiplier: Option<f64>,
}

impl FormatChar {
    const fn plain(scalar: ScalarType) -> Self {
        Self { scalar, count: 1, multiplier: None }
    }

    const fn scaled(scalar: ScalarType, multiplier: f64) -> Self {
        Self { scalar, count: 1, multiplier: Some(multiplier) }
    }

    const fn repeated(scalar: ScalarType, count: usize) -> Self {
        Self { scalar, count, multiplier: None }
    }

    pub fn size(&self) -> usize {
        self.scalar.size() * self.count
    }
}

/// Look up the decode rule of a format character.
pub fn format_char(c: char) -> Option<FormatChar> {
    let rule = match c {
        'b' => FormatChar::plain(ScalarType::Int8),
        'B' => FormatChar::plain(ScalarType::UInt8),
        'h' => FormatChar::plain(ScalarType::Int16),
        'H' => FormatChar::plain(ScalarType::UInt16),
        'i' => FormatChar::plain(ScalarType::Int32),
        'I' => FormatChar::plain(ScalarType::UInt32),
        'q' => FormatChar::plain(ScalarType::Int64),
        'Q' => FormatChar::plain(ScalarType::UInt64),
        'f' => FormatChar::plain(ScalarType::Float32),
        'd' => FormatChar::plain(ScalarType::Float64),
        'n' => FormatChar::repeated(ScalarType::Char, 4),
        'N' => FormatChar::repeated(ScalarType::Char, 16),
        'Z' => FormatChar::repeated(ScalarType::Char, 64),
        'c' => FormatChar::scaled(ScalarType::Int16, 0.01),
        'C' => FormatChar::scaled(ScalarType::UInt16, 0.01),
        'e' => FormatChar::scaled(ScalarType::Int32, 0.01),
        'E' => FormatChar::scaled(ScalarType::UInt32, 0.01),
        'L' => FormatChar::scaled(ScalarType::Int32, 1e-7),
        'M' => FormatChar::plain(ScalarType::Enum),
        'a' => FormatChar::repeated(ScalarType::Int16, 32),
        _ => return None,
    };
    Some(rule)
}

/// A decoded FMT record body.
#[derive(Debug, Clone, PartialEq)]
pub struct FmtRecord {
    pub type_id: u8,
    pub length: u8,
    pub name: String,
    pub format: String,
    pub columns: String,
}

impl FmtRecord {
    /// Parse the body that follows the 3-byte header.
    pub fn parse_from(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let type_id = cursor.read_u8()?;
        let length = cursor.read_u8()?;
        let name = cursor.read_char_array(FMT_NAME_SIZE)?;
        let format = cursor.read_char_array(FMT_FORMAT_SIZE)?;
        let columns = cursor.read_char_array(FMT_COLUMNS_SIZE)?;
        Ok(Self { type_id, length, name, format, columns })
    }

    /// Build the descriptor this record defines.
    pub fn to_descriptor(&self) -> Result<MessageTypeDescriptor> {
        let reject = |details: String| LogError::InvalidDescriptor { name: self.name.clone(), details };

        if self.type_id == FMT_TYPE {
            return Err(reject("FMT type id cannot be redefined".to_string()));
        }
        if self.name.is_empty() {
            return Err(reject(format!("Type {} has an empty name", self.type_id)));
        }

        let columns: Vec<&str> =
            if self.columns.is_empty() { Vec::new() } else { self.columns.split(',').collect() };
        if columns.len() != self.format.chars().count() {
            return Err(reject(format!(
                "Format '{}' has {} characters but {} columns were named",
                self.format,
                self.format.chars().count(),
                columns.len()
            )));
        }

        let mut fields = Vec::with_capacity(columns.len());
        for (c, column) in self.format.chars().zip(columns) {
            let rule = format_char(c)
                .ok_or_else(|| reject(format!("Unknown format character '{}'", c)))?;
            let mut field = FieldDescriptor::array(column.trim(), rule.scalar, rule.count);
            field.multiplier = rule.multiplier;
            fields.push(field);
        }

        let descriptor =
            MessageTypeDescriptor::new(self.type_id as u32, self.name.clone(), fields)
                .with_format(self.format.clone());
        descriptor.validate()?;

        let needed = descriptor.body_size() + HEADER_SIZE;
        if (self.length as usize) < needed {
            return Err(reject(format!(
                "Declared length {} is shorter than the {} bytes its fields need",
                self.length, needed
            )));
        }

        Ok(descriptor)
    }
}

/// A registered type: its descriptor and full on-disk record length.
#[derive(Debug, Clone)]
pub struct RegisteredType {
    pub descriptor: Arc<MessageTypeDescriptor>,
    pub length: usize,
}

/// Runtime registry of descriptors discovered in one log.
///
/// Scoped to a single pass; nothing is shared between buffers.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    by_id: HashMap<u8, RegisteredType>,
    by_name: HashMap<String, u8>,
    units: HashMap<char, String>,
    multipliers: HashMap<char, f64>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the type an FMT record defines.
    pub fn register(&mut self, fmt: &FmtRecord) -> Result<Arc<MessageTypeDescriptor>> {
        let descriptor = Arc::new(fmt.to_descriptor()?);

        if let Some(previous) = self.by_id.get(&fmt.type_id) {
            if previous.descriptor.name != descriptor.name {
                self.by_name.remove(&previous.descriptor.name);
            }
        }

        debug!(
            "Registered {} (id {}, {} fields, {} bytes)",
            descriptor.name,
            fmt.type_id,
            descriptor.fields.len(),
            fmt.length
        );

        self.by_name.insert(descriptor.name.clone(), fmt.type_id);
        self.by_id.insert(
            fmt.type_id,
            RegisteredType { descriptor: Arc::clone(&descriptor), length: fmt.length as usize },
        );
        Ok(descriptor)
    }

    pub fn get(&self, type_id: u8) -> Option<&RegisteredType> {
        self.by_id.get(&type_id)
    }

    pub fn by_name(&self, name: &str) -> Option<&RegisteredType> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Feed a UNIT, MULT or FMTU record into the registry.
    ///
    /// Returns the re-annotated descriptor when an FMTU record changed one.
    pub fn absorb_metadata(&mut self, record: &Record) -> Option<Arc<MessageTypeDescriptor>> {
        match record.type_name() {
            "UNIT" => {
                let id = record.get_i64("Id")? as u8 as char;
                let label = record.get_str("Label")?.to_string();
                trace!("Unit '{}' = {}", id, label);
                self.units.insert(id, label);
                None
            }
            "MULT" => {
                let id = record.get_i64("Id")? as u8 as char;
                let mult = record.get_f64("Mult")?;
                trace!("Multiplier '{}' = {}", id, mult);
                self.multipliers.insert(id, mult);
                None
            }
            "FMTU" => {
                let type_id = u8::try_from(record.get_i64("FmtType")?).ok()?;
                let unit_ids = record.get_str("UnitIds")?;
                let mult_ids = record.get_str("MultIds")?;
                self.annotate(type_id, unit_ids, mult_ids)
            }
            _ => None,
        }
    }

    fn annotate(
        &mut self,
        type_id: u8,
        unit_ids: &str,
        mult_ids: &str,
    ) -> Option<Arc<MessageTypeDescriptor>> {
        let entry = self.by_id.get_mut(&type_id)?;
        let mut descriptor = MessageTypeDescriptor::clone(&entry.descriptor);

        let mut unit_chars = unit_ids.chars();
        let mut mult_chars = mult_ids.chars();
        for field in &mut descriptor.fields {
            if let Some(unit) = unit_chars.next().and_then(|c| self.units.get(&c)) {
                field.unit = Some(unit.clone());
            }
            // Format characters with a built-in multiplier keep it.
            if field.multiplier.is_none() {
                if let Some(mult) = mult_chars.next().and_then(|c| self.multipliers.get(&c)) {
                    field.multiplier = Some(*mult);
                }
            } else {
                mult_chars.next();
            }
        }

        if descriptor == *entry.descriptor {
            return None;
        }
        let descriptor = Arc::new(descriptor);
        entry.descriptor = Arc::clone(&descriptor);
        Some(descriptor)
    }
}
