//! Bounds-checked binary cursor
//!
//! [`ByteCursor`] reads typed primitives out of a borrowed buffer with an
//! explicit byte order. Every read advances the offset by the width of the
//! type; a read that would run past the end fails with
//! [`LogError::OutOfBounds`](crate::LogError::OutOfBounds) and leaves the
//! offset untouched, which decoders treat as the end of the stream.
//!
//! ```rust
//! use flightlog::cursor::{ByteCursor, Endian};
//!
//! let data = [0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
//! let mut cursor = ByteCursor::new(&data, Endian::Little);
//! assert_eq!(cursor.read_u16().unwrap(), 0x1234);
//! cursor.seek(4).unwrap();
//! assert_eq!(cursor.with_endian(Endian::Big).read_u32().unwrap(), 1);
//! assert!(cursor.read_u8().unwrap_err().is_end_of_stream());
//! ```

use crate::types::{FieldDescriptor, ScalarType, Value};
use crate::{LogError, Result};

/// Byte order of multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Sequential and random-access reader over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
    endian: Endian,
}

macro_rules! read_primitive {
    ($name:ident, $peek:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.take::<{ std::mem::size_of::<$ty>() }>()?;
            Ok(match self.endian {
                Endian::Little => <$ty>::from_le_bytes(bytes),
                Endian::Big => <$ty>::from_be_bytes(bytes),
            })
        }

        pub fn $peek(&self) -> Result<$ty> {
            self.clone().$name()
        }
    };
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, position: 0, endian }
    }

    /// Change the byte order used by subsequent reads.
    pub fn with_endian(&mut self, endian: Endian) -> &mut Self {
        self.endian = endian;
        self
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// The whole underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Move to an absolute offset. Seeking to the end is allowed.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(LogError::out_of_bounds(position, 0, 0));
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Borrow the next `count` bytes and advance past them.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Borrow the next `count` bytes without advancing.
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| LogError::out_of_bounds(self.position, count, self.remaining()))?;
        Ok(&self.data[self.position..end])
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.peek_bytes(1).map(|b| b[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_primitive!(read_u16, peek_u16, u16);
    read_primitive!(read_i16, peek_i16, i16);
    read_primitive!(read_u32, peek_u32, u32);
    read_primitive!(read_i32, peek_i32, i32);
    read_primitive!(read_u64, peek_u64, u64);
    read_primitive!(read_i64, peek_i64, i64);
    read_primitive!(read_f32, peek_f32, f32);
    read_primitive!(read_f64, peek_f64, f64);

    /// Read a fixed-length NUL-padded character array.
    pub fn read_char_array(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        Ok(null_terminated_string(bytes))
    }

    /// Read one element of the given scalar type.
    pub fn read_scalar(&mut self, scalar: ScalarType) -> Result<Value> {
        Ok(match scalar {
            ScalarType::Int8 => Value::Int8(self.read_i8()?),
            ScalarType::UInt8 => Value::UInt8(self.read_u8()?),
            ScalarType::Int16 => Value::Int16(self.read_i16()?),
            ScalarType::UInt16 => Value::UInt16(self.read_u16()?),
            ScalarType::Int32 => Value::Int32(self.read_i32()?),
            ScalarType::UInt32 => Value::UInt32(self.read_u32()?),
            ScalarType::Int64 => Value::Int64(self.read_i64()?),
            ScalarType::UInt64 => Value::UInt64(self.read_u64()?),
            ScalarType::Float32 => Value::Float32(self.read_f32()?),
            ScalarType::Float64 => Value::Float64(self.read_f64()?),
            ScalarType::Enum => Value::Enum(self.read_u8()?),
            ScalarType::Char => Value::Text(self.read_char_array(1)?),
        })
    }

    /// Read a whole field: text for character arrays, an array for counts above one.
    pub fn read_field(&mut self, field: &FieldDescriptor) -> Result<Value> {
        if field.is_text() {
            return self.read_char_array(field.count).map(Value::Text);
        }
        if field.count == 1 {
            return self.read_scalar(field.scalar);
        }

        // Check the whole array up front so a short buffer consumes nothing.
        self.peek_bytes(field.size())?;
        let mut items = Vec::with_capacity(field.count);
        for _ in 0..field.count {
            items.push(self.read_scalar(field.scalar)?);
        }
        Ok(Value::Array(items))
    }

    /// Read every field of a body in order.
    ///
    /// Either all fields are read or the cursor is left where it started.
    pub fn read_fields(&mut self, fields: &[FieldDescriptor]) -> Result<Vec<Value>> {
        let start = self.position;
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            match self.read_field(field) {
                Ok(value) => values.push(value),
                Err(e) => {
                    self.position = start;
                    return Err(e);
                }
            }
        }
        Ok(values)
    }

    /// Offset of the next occurrence of `pattern` at or after `from`, looking at
    /// no more than `limit` candidate positions.
    pub fn find(&self, pattern: &[u8], from: usize, limit: Option<usize>) -> Option<usize> {
        if pattern.is_empty() || from >= self.data.len() {
            return None;
        }
        let haystack = &self.data[from..];
        if haystack.len() < pattern.len() {
            return None;
        }
        let candidates = haystack.len().saturating_sub(pattern.len() - 1);
        let candidates = limit.map_or(candidates, |l| candidates.min(l));
        haystack[..candidates + pattern.len() - 1]
            .windows(pattern.len())
            .position(|w| w == pattern)
            .map(|p| from + p)
    }
}

/// Extract a NUL-terminated string from a fixed-width byte slice.
pub fn null_terminated_string(bytes: &[u8]) -> String {
    let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..null_pos]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reads_little_and_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut le = ByteCursor::new(&data, Endian::Little);
        assert_eq!(le.read_u32().unwrap(), 0x0403_0201);

        let mut be = ByteCursor::new(&data, Endian::Big);
        assert_eq!(be.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(be.remaining(), 0);
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [0xA3, 0x95, 0x80];
        let cursor = ByteCursor::new(&data, Endian::Little);
        assert_eq!(cursor.peek_u8().unwrap(), 0xA3);
        assert_eq!(cursor.peek_u16().unwrap(), 0x95A3);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn out_of_bounds_leaves_offset_untouched() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&data, Endian::Little);
        cursor.read_u8().unwrap();
        let err = cursor.read_u32().unwrap_err();
        assert!(matches!(err, LogError::OutOfBounds { offset: 1, needed: 4, remaining: 2 }));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn seek_is_bounds_checked() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data, Endian::Little);
        assert!(cursor.seek(4).is_ok());
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.seek(5).is_err());
    }

    #[test]
    fn char_arrays_are_nul_trimmed() {
        let data = *b"ATT\0\0\0\0\0";
        let mut cursor = ByteCursor::new(&data, Endian::Little);
        assert_eq!(cursor.read_char_array(4).unwrap(), "ATT");
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn read_fields_is_all_or_nothing() {
        let fields = vec![
            FieldDescriptor::new("A", ScalarType::UInt16),
            FieldDescriptor::new("B", ScalarType::UInt32),
        ];
        let data = [1u8, 0, 2, 0];
        let mut cursor = ByteCursor::new(&data, Endian::Little);
        assert!(cursor.read_fields(&fields).unwrap_err().is_end_of_stream());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn arrays_decode_each_element() {
        let field = FieldDescriptor::array("V", ScalarType::Int16, 3);
        let data = [1u8, 0, 0xFF, 0xFF, 3, 0];
        let mut cursor = ByteCursor::new(&data, Endian::Little);
        assert_eq!(
            cursor.read_field(&field).unwrap(),
            Value::Array(vec![Value::Int16(1), Value::Int16(-1), Value::Int16(3)])
        );
    }

    #[test]
    fn find_respects_limit() {
        let data = [0u8, 0, 0, 0xA3, 0x95, 0];
        let cursor = ByteCursor::new(&data, Endian::Little);
        assert_eq!(cursor.find(&[0xA3, 0x95], 0, None), Some(3));
        assert_eq!(cursor.find(&[0xA3, 0x95], 0, Some(3)), None);
        assert_eq!(cursor.find(&[0xA3, 0x95], 0, Some(4)), Some(3));
        assert_eq!(cursor.find(&[0xA3, 0x95], 4, None), None);
    }

    proptest! {
        #[test]
        fn prop_f64_round_trips_both_orders(value in any::<f64>()) {
            let le = value.to_le_bytes();
            let be = value.to_be_bytes();
            let a = ByteCursor::new(&le, Endian::Little).peek_f64().unwrap();
            let b = ByteCursor::new(&be, Endian::Big).peek_f64().unwrap();
            prop_assert_eq!(a.to_bits(), value.to_bits());
            prop_assert_eq!(b.to_bits(), value.to_bits());
        }

        #[test]
        fn prop_reads_never_exceed_buffer(data in prop::collection::vec(any::<u8>(), 0..32), width in 1usize..9) {
            let mut cursor = ByteCursor::new(&data, Endian::Little);
            let mut consumed = 0;
            while cursor.read_bytes(width).is_ok() {
                consumed += width;
            }
            prop_assert_eq!(consumed, data.len() / width * width);
            prop_assert_eq!(cursor.remaining(), data.len() % width);
        }
    }
}
