//! Message type descriptors

use serde::{Deserialize, Serialize};

use super::ScalarType;

/// Layout of one field within a message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as it appears in the log
    pub name: String,
    /// Element type
    pub scalar: ScalarType,
    /// Number of elements (1 for scalars, N for arrays and character strings)
    pub count: usize,
    /// Display unit, if known
    pub unit: Option<String>,
    /// Display multiplier applied by consumers, never by decoders
    pub multiplier: Option<f64>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self { name: name.into(), scalar, count: 1, unit: None, multiplier: None }
    }

    pub fn array(name: impl Into<String>, scalar: ScalarType, count: usize) -> Self {
        Self { count, ..Self::new(name, scalar) }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Bytes this field occupies in a message body.
    pub fn size(&self) -> usize {
        self.scalar.size() * self.count
    }

    pub fn is_text(&self) -> bool {
        self.scalar == ScalarType::Char
    }
}

/// Unit of the field a descriptor takes its timestamps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Micros,
    Millis,
}

impl TimeUnit {
    pub fn to_micros(self, raw: u64) -> u64 {
        match self {
            TimeUnit::Micros => raw,
            TimeUnit::Millis => raw.saturating_mul(1000),
        }
    }
}

/// Layout of one message type.
///
/// Descriptors are immutable once built. A log that redefines a type gets a new
/// descriptor; records decoded earlier keep pointing at the one they were decoded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTypeDescriptor {
    /// Numeric type id (dataflash type, MAVLink message id or vendor block tag)
    pub id: u32,
    /// Unique type name
    pub name: String,
    /// Fields in body order
    pub fields: Vec<FieldDescriptor>,
    /// Source format string, when the layout came from one
    pub format: Option<String>,
    /// Index and unit of the field that carries the record timestamp
    pub time_field: Option<(usize, TimeUnit)>,
}

impl MessageTypeDescriptor {
    /// Create a descriptor, detecting the conventional time field by name.
    pub fn new(id: u32, name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let time_field = detect_time_field(&fields);
        Self { id, name: name.into(), fields, format: None, time_field }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Validate the descriptor for consistency.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::LogError::InvalidDescriptor {
                name: format!("#{}", self.id),
                details: "Descriptor has an empty name".to_string(),
            });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.count == 0 {
                return Err(crate::LogError::InvalidDescriptor {
                    name: self.name.clone(),
                    details: format!("Field '{}' has count of 0", field.name),
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(crate::LogError::InvalidDescriptor {
                    name: self.name.clone(),
                    details: format!("Duplicate field '{}'", field.name),
                });
            }
        }

        Ok(())
    }

    /// Sum of all field sizes.
    pub fn body_size(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::size).sum()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

fn detect_time_field(fields: &[FieldDescriptor]) -> Option<(usize, TimeUnit)> {
    // MAVLink time_usec may be boot or epoch time and never drives the clock.
    const CANDIDATES: [(&str, TimeUnit); 3] = [
        ("TimeUS", TimeUnit::Micros),
        ("TimeMS", TimeUnit::Millis),
        ("time_boot_ms", TimeUnit::Millis),
    ];

    CANDIDATES.iter().find_map(|(candidate, unit)| {
        fields
            .iter()
            .position(|f| f.name == *candidate && f.count == 1 && !f.is_text())
            .map(|index| (index, *unit))
    })
}
