//! Synthetic log builders for tests and benchmarks
//!
//! Each builder writes byte-exact captures of one format so tests can
//! describe a log in a few lines instead of shipping binary fixtures.

#![cfg(any(test, feature = "benchmark"))]

use std::path::{Path, PathBuf};

use crate::dataflash::{FMT_TYPE, HEAD_BYTE1, HEAD_BYTE2};
use crate::mavlink::{
    INCOMPAT_SIGNED, MAGIC_V1, MAGIC_V2, MessageDictionary, SIGNATURE_LEN, Version, X25,
};
use crate::types::{FieldDescriptor, ScalarType, Value};
use crate::vendor::{FILE_HEADER_LEN, MAGIC};

fn padded(text: &str, len: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(len, 0);
    bytes
}

/// Builder for dataflash logs.
#[derive(Debug, Default, Clone)]
pub struct DataflashBuilder {
    data: Vec<u8>,
}

impl DataflashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an FMT record. `length` includes the 3-byte header.
    pub fn fmt(&mut self, type_id: u8, length: u8, name: &str, format: &str, columns: &str) -> &mut Self {
        self.data.extend_from_slice(&[HEAD_BYTE1, HEAD_BYTE2, FMT_TYPE, type_id, length]);
        self.data.extend_from_slice(&padded(name, 4));
        self.data.extend_from_slice(&padded(format, 16));
        self.data.extend_from_slice(&padded(columns, 64));
        self
    }

    /// Append a data record whose body is written by `body`.
    pub fn record(&mut self, type_id: u8, body: impl FnOnce(&mut Vec<u8>)) -> &mut Self {
        self.data.extend_from_slice(&[HEAD_BYTE1, HEAD_BYTE2, type_id]);
        body(&mut self.data);
        self
    }

    /// Append arbitrary bytes.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Builder for MAVLink captures, encoding messages with the built-in dictionary.
#[derive(Debug, Clone)]
pub struct MavlinkBuilder {
    data: Vec<u8>,
    prefixed: bool,
    version: Version,
    signed: bool,
    sequence: u8,
    system_id: u8,
    component_id: u8,
}

impl MavlinkBuilder {
    /// `.tlog` capture: every frame gets an 8-byte big-endian timestamp.
    pub fn tlog() -> Self {
        Self {
            data: Vec::new(),
            prefixed: true,
            version: Version::V1,
            signed: false,
            sequence: 0,
            system_id: 1,
            component_id: 1,
        }
    }

    /// Raw stream without timestamps.
    pub fn raw() -> Self {
        Self { prefixed: false, ..Self::tlog() }
    }

    /// Emit MAVLink 2 frames.
    pub fn v2(mut self) -> Self {
        self.version = Version::V2;
        self
    }

    /// Emit signed MAVLink 2 frames (zeroed signature block).
    pub fn signed(mut self) -> Self {
        self.version = Version::V2;
        self.signed = true;
        self
    }

    pub fn source(&mut self, system_id: u8, component_id: u8) -> &mut Self {
        self.system_id = system_id;
        self.component_id = component_id;
        self
    }

    /// Pretend `count` frames were lost.
    pub fn skip_sequence(&mut self, count: u8) -> &mut Self {
        self.sequence = self.sequence.wrapping_add(count);
        self
    }

    /// Encode a dictionary message. Fields not listed are zero.
    pub fn message(&mut self, time_us: u64, name: &str, values: &[(&str, Value)]) -> &mut Self {
        let dictionary = MessageDictionary::builtin().expect("built-in dictionary");
        let definition = dictionary.by_name(name).unwrap_or_else(|| panic!("unknown message {name}"));

        let mut payload = Vec::with_capacity(definition.wire_len());
        for field_name in definition.wire_field_names() {
            let field = definition.descriptor.field(field_name).expect("wire field");
            let value = values.iter().find(|(n, _)| *n == field_name).map(|(_, v)| v);
            encode_field(field, value, &mut payload);
        }

        let id = definition.descriptor.id;
        let crc_extra = definition.crc_extra;
        self.frame(time_us, id, crc_extra, &payload)
    }

    /// Encode an arbitrary frame around `payload`.
    pub fn frame(&mut self, time_us: u64, message_id: u32, crc_extra: u8, payload: &[u8]) -> &mut Self {
        if self.prefixed {
            self.data.extend_from_slice(&time_us.to_be_bytes());
        }

        let mut frame = Vec::with_capacity(payload.len() + 12);
        match self.version {
            Version::V1 => {
                assert!(message_id <= 0xFF, "message id {message_id} needs MAVLink 2");
                frame.extend_from_slice(&[
                    MAGIC_V1,
                    payload.len() as u8,
                    self.sequence,
                    self.system_id,
                    self.component_id,
                    message_id as u8,
                ]);
                frame.extend_from_slice(payload);
            }
            Version::V2 => {
                let mut trimmed = payload.len();
                while trimmed > 1 && payload[trimmed - 1] == 0 {
                    trimmed -= 1;
                }
                let id = message_id.to_le_bytes();
                let incompat = if self.signed { INCOMPAT_SIGNED } else { 0 };
                frame.extend_from_slice(&[
                    MAGIC_V2,
                    trimmed as u8,
                    incompat,
                    0,
                    self.sequence,
                    self.system_id,
                    self.component_id,
                    id[0],
                    id[1],
                    id[2],
                ]);
                frame.extend_from_slice(&payload[..trimmed]);
            }
        }

        let mut crc = X25::new();
        crc.update(&frame[1..]);
        crc.push(crc_extra);
        frame.extend_from_slice(&crc.value().to_le_bytes());
        if self.signed {
            frame.extend_from_slice(&[0; SIGNATURE_LEN]);
        }

        self.data.extend_from_slice(&frame);
        self.sequence = self.sequence.wrapping_add(1);
        self
    }

    pub fn raw_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

fn encode_field(field: &FieldDescriptor, value: Option<&Value>, out: &mut Vec<u8>) {
    if field.is_text() {
        out.extend_from_slice(&padded(value.and_then(Value::as_str).unwrap_or(""), field.count));
        return;
    }
    if field.count > 1 {
        let items = match value {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        for i in 0..field.count {
            encode_scalar(field.scalar, items.get(i), out);
        }
        return;
    }
    encode_scalar(field.scalar, value, out);
}

fn encode_scalar(scalar: ScalarType, value: Option<&Value>, out: &mut Vec<u8>) {
    let int = value.and_then(Value::as_i64).unwrap_or(0);
    let float = value.and_then(Value::as_f64).unwrap_or(0.0);
    match scalar {
        ScalarType::Int8 => out.push(int as i8 as u8),
        ScalarType::UInt8 | ScalarType::Enum | ScalarType::Char => out.push(int as u8),
        ScalarType::Int16 => out.extend_from_slice(&(int as i16).to_le_bytes()),
        ScalarType::UInt16 => out.extend_from_slice(&(int as u16).to_le_bytes()),
        ScalarType::Int32 => out.extend_from_slice(&(int as i32).to_le_bytes()),
        ScalarType::UInt32 => out.extend_from_slice(&(int as u32).to_le_bytes()),
        ScalarType::Int64 => out.extend_from_slice(&int.to_le_bytes()),
        ScalarType::UInt64 => {
            let unsigned = value.and_then(Value::as_u64).unwrap_or(0);
            out.extend_from_slice(&unsigned.to_le_bytes());
        }
        ScalarType::Float32 => out.extend_from_slice(&(float as f32).to_le_bytes()),
        ScalarType::Float64 => out.extend_from_slice(&float.to_le_bytes()),
    }
}

/// Builder for vendor flight records.
#[derive(Debug, Clone)]
pub struct VendorBuilder {
    data: Vec<u8>,
}

impl Default for VendorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorBuilder {
    /// Start a version 1 record with its file header.
    pub fn new() -> Self {
        let mut data = Vec::with_capacity(FILE_HEADER_LEN);
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&1u16.to_le_bytes());
        data.resize(FILE_HEADER_LEN, 0);
        Self { data }
    }

    pub fn block(&mut self, tag: u8, delta_ms: u16, payload: &[u8]) -> &mut Self {
        self.data.push(tag);
        self.data.push(payload.len() as u8);
        self.data.extend_from_slice(&delta_ms.to_le_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// A dataflash flight: parameters, a mode change, a mission item, text and
/// `samples` ATT/GPS pairs 100 ms apart.
pub fn sample_dataflash_log(samples: usize) -> Vec<u8> {
    let mut log = DataflashBuilder::new();
    log.fmt(1, 23, "ATT", "Qfff", "TimeUS,Roll,Pitch,Yaw")
        .fmt(2, 24, "GPS", "QBLLe", "TimeUS,Status,Lat,Lng,Alt")
        .fmt(3, 75, "MSG", "QZ", "TimeUS,Message")
        .fmt(4, 31, "PARM", "QNf", "TimeUS,Name,Value")
        .fmt(5, 14, "MODE", "QMBB", "TimeUS,Mode,ModeNum,Rsn")
        .fmt(6, 46, "CMD", "QHHHffffLLfB", "TimeUS,CTot,CNum,CId,Prm1,Prm2,Prm3,Prm4,Lat,Lng,Alt,Frame");

    log.record(4, |b| {
        b.extend_from_slice(&0u64.to_le_bytes());
        b.extend_from_slice(&padded("WPNAV_SPEED", 16));
        b.extend_from_slice(&500f32.to_le_bytes());
    });
    log.record(6, |b| {
        b.extend_from_slice(&0u64.to_le_bytes());
        b.extend_from_slice(&2u16.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(&[0; 16]);
        b.extend_from_slice(&(-353_632_610i32).to_le_bytes());
        b.extend_from_slice(&1_491_652_300i32.to_le_bytes());
        b.extend_from_slice(&20f32.to_le_bytes());
        b.push(3);
    });
    log.record(5, |b| {
        b.extend_from_slice(&0u64.to_le_bytes());
        b.extend_from_slice(&[5, 5, 1]);
    });
    log.record(3, |b| {
        b.extend_from_slice(&0u64.to_le_bytes());
        b.extend_from_slice(&padded("ArduCopter V4.5.1", 64));
    });

    for i in 0..samples {
        let time_us = (i as u64 + 1) * 100_000;
        let phase = i as f32 * 0.01;
        log.record(1, |b| {
            b.extend_from_slice(&time_us.to_le_bytes());
            for angle in [phase.sin() * 10.0, phase.cos() * 5.0, phase * 3.6] {
                b.extend_from_slice(&angle.to_le_bytes());
            }
        });
        log.record(2, |b| {
            b.extend_from_slice(&time_us.to_le_bytes());
            b.push(3);
            b.extend_from_slice(&(-353_632_610i32 + i as i32 * 10).to_le_bytes());
            b.extend_from_slice(&(1_491_652_300i32 + i as i32 * 10).to_le_bytes());
            b.extend_from_slice(&(58_400i32 + i as i32).to_le_bytes());
        });
    }
    log.build()
}

/// A `.tlog` flight: heartbeats with an arm transition, system time, a
/// parameter, status text and `samples` ATTITUDE/GLOBAL_POSITION_INT pairs.
pub fn sample_tlog(samples: usize) -> Vec<u8> {
    const EPOCH_US: u64 = 1_700_000_000_000_000;
    let mut tlog = MavlinkBuilder::tlog();

    let heartbeat = |base_mode: u8, custom_mode: u32| {
        vec![
            ("type", Value::UInt8(2)),
            ("autopilot", Value::UInt8(3)),
            ("base_mode", Value::UInt8(base_mode)),
            ("custom_mode", Value::UInt32(custom_mode)),
            ("mavlink_version", Value::UInt8(3)),
        ]
    };

    tlog.message(EPOCH_US, "HEARTBEAT", &heartbeat(0x01, 0));
    tlog.message(EPOCH_US, "SYSTEM_TIME", &[
        ("time_unix_usec", Value::UInt64(EPOCH_US)),
        ("time_boot_ms", Value::UInt32(0)),
    ]);
    tlog.message(EPOCH_US, "PARAM_VALUE", &[
        ("param_id", Value::Text("WPNAV_SPEED".into())),
        ("param_value", Value::Float32(500.0)),
        ("param_count", Value::UInt16(1)),
    ]);
    tlog.message(EPOCH_US, "STATUSTEXT", &[
        ("severity", Value::UInt8(6)),
        ("text", Value::Text("ArduCopter V4.5.1".into())),
    ]);

    for i in 0..samples {
        let time_us = EPOCH_US + (i as u64 + 1) * 100_000;
        let time_boot_ms = Value::UInt32((i as u32 + 1) * 100);
        if i == samples / 2 {
            tlog.message(time_us, "HEARTBEAT", &heartbeat(0x81, 5));
        }
        tlog.message(time_us, "ATTITUDE", &[
            ("time_boot_ms", time_boot_ms.clone()),
            ("roll", Value::Float32((i as f32 * 0.01).sin())),
            ("pitch", Value::Float32(0.05)),
            ("yaw", Value::Float32(1.2)),
        ]);
        tlog.message(time_us, "GLOBAL_POSITION_INT", &[
            ("time_boot_ms", time_boot_ms),
            ("lat", Value::Int32(-353_632_610 + i as i32 * 10)),
            ("lon", Value::Int32(1_491_652_300 + i as i32 * 10)),
            ("alt", Value::Int32(584_000 + i as i32 * 100)),
            ("relative_alt", Value::Int32(i as i32 * 100)),
        ]);
    }
    tlog.build()
}

/// A vendor flight record with a home point and `samples` OSD/BATTERY pairs.
pub fn sample_vendor_log(samples: usize) -> Vec<u8> {
    let mut log = VendorBuilder::new();

    let mut home = Vec::new();
    home.extend_from_slice(&22.5431f64.to_le_bytes());
    home.extend_from_slice(&113.9577f64.to_le_bytes());
    home.extend_from_slice(&12.0f32.to_le_bytes());
    log.block(crate::vendor::TAG_HOME, 0, &home);

    for i in 0..samples {
        let mut osd = Vec::with_capacity(46);
        osd.extend_from_slice(&(22.5431 + i as f64 * 1e-5).to_le_bytes());
        osd.extend_from_slice(&113.9577f64.to_le_bytes());
        for value in [i as f32 * 0.1, 1.0, 0.0, -0.1, 2.0, 0.5, 90.0] {
            osd.extend_from_slice(&value.to_le_bytes());
        }
        osd.push(6);
        osd.push(14);
        log.block(crate::vendor::TAG_OSD, 100, &osd);

        let mut battery = (16_800u16 - i as u16).to_le_bytes().to_vec();
        battery.extend_from_slice(&1_250i16.to_le_bytes());
        battery.push(90);
        battery.extend_from_slice(&300i16.to_le_bytes());
        log.block(crate::vendor::TAG_BATTERY, 0, &battery);
    }
    log.build()
}

/// Write `data` to `name` inside `dir` and return the path.
pub fn write_fixture(dir: &Path, name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_records_are_89_bytes() {
        let mut builder = DataflashBuilder::new();
        builder.fmt(1, 19, "ATT", "Qff", "TimeUS,Roll,Pitch");
        assert_eq!(builder.len(), 89);
    }

    #[test]
    fn mavlink_v1_frame_layout() {
        let mut builder = MavlinkBuilder::raw();
        builder.message(0, "ATTITUDE", &[]);
        let data = builder.build();
        assert_eq!(data.len(), 6 + 28 + 2);
        assert_eq!(data[0], MAGIC_V1);
        assert_eq!(data[5], 30);
    }

    #[test]
    fn mavlink_v2_trims_trailing_zeros() {
        let mut builder = MavlinkBuilder::raw().v2();
        builder.message(0, "ATTITUDE", &[("time_boot_ms", Value::UInt32(7))]);
        let data = builder.build();
        assert_eq!(data[0], MAGIC_V2);
        assert_eq!(data[1], 1);
        assert_eq!(data.len(), 10 + 1 + 2);
    }

    #[test]
    fn vendor_header_is_16_bytes() {
        assert_eq!(VendorBuilder::new().len(), FILE_HEADER_LEN);
    }
}
