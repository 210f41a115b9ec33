//! MAVLink message dictionary
//!
//! Message layouts are loaded from a YAML document listing each message's
//! fields in declaration order:
//!
//! ```yaml
//! version: "common-1.0"
//! messages:
//!   - id: 30
//!     name: ATTITUDE
//!     crc_extra: 39
//!     fields:
//!       - { name: time_boot_ms, type: uint32_t, units: ms }
//!       - { name: roll, type: float, units: rad }
//!       - { name: text, type: char, count: 50 }
//!       - { name: id, type: uint16_t, extension: true }
//! ```
//!
//! On the wire the base fields are sorted by element size, largest first
//! (stable, so equal sizes keep declaration order), and extension fields
//! follow in declaration order. Decoded records list fields in declaration
//! order.

use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::cursor::{ByteCursor, Endian};
use crate::types::{FieldDescriptor, MessageTypeDescriptor, ScalarType, Value};
use crate::{LogError, Result};

const BUILTIN_DICTIONARY: &str = include_str!("common.yaml");

#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    version: Option<String>,
    messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
struct MessageEntry {
    id: u32,
    name: String,
    crc_extra: u8,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize)]
struct FieldEntry {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    multiplier: Option<f64>,
    #[serde(default)]
    extension: bool,
}

/// One message definition with its wire layout.
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// Descriptor with fields in declaration order
    pub descriptor: Arc<MessageTypeDescriptor>,
    /// Seed byte appended to the checksum
    pub crc_extra: u8,
    /// Declaration indices in wire order
    wire_order: Vec<usize>,
    /// Full payload length, extensions included
    wire_len: usize,
}

impl MessageDefinition {
    fn from_entry(entry: MessageEntry) -> Result<Self> {
        let mut fields = Vec::with_capacity(entry.fields.len());
        let mut extension = Vec::with_capacity(entry.fields.len());
        for field in entry.fields {
            let (scalar, declared) = parse_field_type(&field.type_name).ok_or_else(|| {
                LogError::InvalidDescriptor {
                    name: entry.name.clone(),
                    details: format!("Unknown field type '{}' for '{}'", field.type_name, field.name),
                }
            })?;
            let mut descriptor =
                FieldDescriptor::array(field.name, scalar, field.count.unwrap_or(declared));
            descriptor.unit = field.units;
            descriptor.multiplier = field.multiplier;
            fields.push(descriptor);
            extension.push(field.extension);
        }

        let mut wire_order: Vec<usize> = (0..fields.len()).filter(|&i| !extension[i]).collect();
        wire_order.sort_by_key(|&i| std::cmp::Reverse(fields[i].scalar.size()));
        wire_order.extend((0..fields.len()).filter(|&i| extension[i]));

        let descriptor = MessageTypeDescriptor::new(entry.id, entry.name, fields);
        descriptor.validate()?;
        let wire_len = descriptor.body_size();

        Ok(Self { descriptor: Arc::new(descriptor), crc_extra: entry.crc_extra, wire_order, wire_len })
    }

    /// Payload length with every extension field present.
    pub fn wire_len(&self) -> usize {
        self.wire_len
    }

    /// Field names in wire order.
    pub fn wire_field_names(&self) -> impl Iterator<Item = &str> {
        self.wire_order.iter().map(|&i| self.descriptor.fields[i].name.as_str())
    }

    /// Decode a payload into values in declaration order.
    ///
    /// Payloads shorter than the full layout are zero-extended, which is how
    /// MAVLink 2 trims trailing zero bytes and omits unknown extensions.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Vec<Value>> {
        let body: Cow<'_, [u8]> = if payload.len() < self.wire_len {
            let mut padded = payload.to_vec();
            padded.resize(self.wire_len, 0);
            Cow::Owned(padded)
        } else {
            Cow::Borrowed(payload)
        };

        let mut cursor = ByteCursor::new(&body, Endian::Little);
        let mut slots: Vec<Option<Value>> = vec![None; self.descriptor.fields.len()];
        for &index in &self.wire_order {
            slots[index] = Some(cursor.read_field(&self.descriptor.fields[index])?);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

fn parse_field_type(type_name: &str) -> Option<(ScalarType, usize)> {
    let (base, count) = match type_name.split_once('[') {
        Some((base, rest)) => (base, rest.strip_suffix(']')?.parse().ok()?),
        None => (type_name, 1),
    };
    let scalar = match base.trim() {
        "int8_t" => ScalarType::Int8,
        "uint8_t" | "uint8_t_mavlink_version" => ScalarType::UInt8,
        "int16_t" => ScalarType::Int16,
        "uint16_t" => ScalarType::UInt16,
        "int32_t" => ScalarType::Int32,
        "uint32_t" => ScalarType::UInt32,
        "int64_t" => ScalarType::Int64,
        "uint64_t" => ScalarType::UInt64,
        "float" => ScalarType::Float32,
        "double" => ScalarType::Float64,
        "char" => ScalarType::Char,
        _ => return None,
    };
    Some((scalar, count))
}

/// Message definitions keyed by numeric id.
#[derive(Debug, Clone, Default)]
pub struct MessageDictionary {
    version: Option<String>,
    messages: HashMap<u32, MessageDefinition>,
    ids_by_name: HashMap<String, u32>,
}

impl MessageDictionary {
    /// Parse a dictionary from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: DictionaryFile = serde_yaml_ng::from_str(yaml).map_err(|e| LogError::Dictionary {
            context: "YAML parsing".to_string(),
            details: e.to_string(),
        })?;

        let mut dictionary = Self { version: file.version, ..Self::default() };
        for entry in file.messages {
            let definition = MessageDefinition::from_entry(entry)?;
            let id = definition.descriptor.id;
            let name = definition.descriptor.name.clone();
            if dictionary.messages.contains_key(&id) {
                return Err(LogError::Dictionary {
                    context: name,
                    details: format!("Message id {} is defined twice", id),
                });
            }
            dictionary.ids_by_name.insert(name, id);
            dictionary.messages.insert(id, definition);
        }

        debug!(
            "Loaded message dictionary {} with {} messages",
            dictionary.version.as_deref().unwrap_or("(unversioned)"),
            dictionary.messages.len()
        );
        Ok(dictionary)
    }

    /// Load a dictionary from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| LogError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// The compiled-in dictionary of common messages, parsed once per process.
    pub fn builtin() -> Result<Arc<Self>> {
        static BUILTIN: OnceLock<Arc<MessageDictionary>> = OnceLock::new();
        if let Some(dictionary) = BUILTIN.get() {
            return Ok(Arc::clone(dictionary));
        }
        let parsed = Arc::new(Self::from_yaml_str(BUILTIN_DICTIONARY)?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| parsed)))
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn get(&self, id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.ids_by_name.get(name).and_then(|id| self.messages.get(id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message names sorted alphabetically.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ids_by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dictionary_loads() {
        let dictionary = MessageDictionary::builtin().unwrap();
        for (id, name, crc_extra, wire_len) in [
            (0, "HEARTBEAT", 50, 9),
            (1, "SYS_STATUS", 124, 43),
            (2, "SYSTEM_TIME", 137, 12),
            (22, "PARAM_VALUE", 220, 25),
            (24, "GPS_RAW_INT", 24, 52),
            (30, "ATTITUDE", 39, 28),
            (33, "GLOBAL_POSITION_INT", 104, 28),
            (74, "VFR_HUD", 20, 20),
            (178, "AHRS2", 47, 24),
            (182, "AHRS3", 229, 40),
            (251, "NAMED_VALUE_FLOAT", 170, 18),
            (253, "STATUSTEXT", 83, 54),
        ] {
            let definition = dictionary.get(id).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(definition.descriptor.name, name);
            assert_eq!(definition.crc_extra, crc_extra, "{name}");
            assert_eq!(definition.wire_len(), wire_len, "{name}");
        }
        assert!(dictionary.by_name("BATTERY_STATUS").is_some());
    }

    #[test]
    fn heartbeat_wire_order() {
        let dictionary = MessageDictionary::builtin().unwrap();
        let heartbeat = dictionary.by_name("HEARTBEAT").unwrap();
        let wire: Vec<&str> = heartbeat.wire_field_names().collect();
        assert_eq!(
            wire,
            vec!["custom_mode", "type", "autopilot", "base_mode", "system_status", "mavlink_version"]
        );
        let declared: Vec<&str> = heartbeat.descriptor.field_names().collect();
        assert_eq!(declared[0], "type");
    }

    #[test]
    fn decode_payload_restores_declaration_order() {
        let dictionary = MessageDictionary::builtin().unwrap();
        let heartbeat = dictionary.by_name("HEARTBEAT").unwrap();
        let mut payload = 4u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[2, 3, 0x81, 4, 3]);

        let values = heartbeat.decode_payload(&payload).unwrap();
        assert_eq!(values[0], Value::UInt8(2));
        assert_eq!(values[2], Value::UInt8(0x81));
        assert_eq!(values[3], Value::UInt32(4));
        assert_eq!(values[5], Value::UInt8(3));
    }

    #[test]
    fn truncated_payload_is_zero_extended() {
        let dictionary = MessageDictionary::builtin().unwrap();
        let statustext = dictionary.by_name("STATUSTEXT").unwrap();
        let mut payload = vec![4u8];
        payload.extend_from_slice(b"Armed");

        let values = statustext.decode_payload(&payload).unwrap();
        assert_eq!(values[0], Value::UInt8(4));
        assert_eq!(values[1], Value::Text("Armed".into()));
        assert_eq!(values[2], Value::UInt16(0));
    }

    #[test]
    fn custom_dictionary_with_arrays() {
        let yaml = r#"
version: test
messages:
  - id: 900
    name: PROBE
    crc_extra: 7
    fields:
      - { name: flag, type: uint8_t }
      - { name: samples, type: "int16_t[3]" }
      - { name: ext, type: uint32_t, extension: true }
"#;
        let dictionary = MessageDictionary::from_yaml_str(yaml).unwrap();
        assert_eq!(dictionary.version(), Some("test"));
        let probe = dictionary.get(900).unwrap();
        assert_eq!(probe.wire_field_names().collect::<Vec<_>>(), vec!["samples", "flag", "ext"]);
        assert_eq!(probe.wire_len(), 6 + 1 + 4);
    }

    #[test]
    fn invalid_dictionaries_are_rejected() {
        let unknown_type = "messages:\n  - { id: 1, name: X, crc_extra: 0, fields: [{ name: a, type: quad }] }\n";
        assert!(matches!(
            MessageDictionary::from_yaml_str(unknown_type).unwrap_err(),
            LogError::InvalidDescriptor { .. }
        ));

        let duplicate = "messages:\n  - { id: 1, name: A, crc_extra: 0 }\n  - { id: 1, name: B, crc_extra: 0 }\n";
        assert!(matches!(
            MessageDictionary::from_yaml_str(duplicate).unwrap_err(),
            LogError::Dictionary { .. }
        ));

        assert!(matches!(
            MessageDictionary::from_yaml_str("messages: 3").unwrap_err(),
            LogError::Dictionary { .. }
        ));
    }
}
