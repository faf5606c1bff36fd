// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Protobuf wire-format primitives.
//!
//! Provides [`WireReader`] for decoding and [`WireWriter`] for encoding the
//! subset of the protobuf binary encoding used by ONNX: varints (wire type 0),
//! 64-bit fixed (1), length-delimited (2) and 32-bit fixed (5). Integers are
//! little-endian base-128; negative `int64` values take the full 10 bytes.

use super::error::{OnnxError, Result};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_FIXED64: u8 = 1;
pub const WIRE_LEN: u8 = 2;
pub const WIRE_FIXED32: u8 = 5;

/// Cursor over a protobuf-encoded message.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = *self.data.get(self.pos).ok_or(OnnxError::UnexpectedEof)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(OnnxError::VarintOverflow)
    }

    /// Read a field key and split it into `(field_number, wire_type)`.
    pub fn read_key(&mut self) -> Result<(u32, u8)> {
        let key = self.read_varint()?;
        let wire_type = (key & 0x07) as u8;
        match wire_type {
            WIRE_VARINT | WIRE_FIXED64 | WIRE_LEN | WIRE_FIXED32 => {}
            other => return Err(OnnxError::InvalidWireType(other)),
        }
        Ok(((key >> 3) as u32, wire_type))
    }

    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a length-delimited payload.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| OnnxError::UnexpectedEof)?;
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| OnnxError::InvalidUtf8)
    }

    /// Skip the value of a field whose number we do not recognise.
    pub fn skip(&mut self, wire_type: u8) -> Result<()> {
        match wire_type {
            WIRE_VARINT => self.read_varint().map(drop),
            WIRE_FIXED64 => self.take(8).map(drop),
            WIRE_LEN => self.read_bytes().map(drop),
            WIRE_FIXED32 => self.take(4).map(drop),
            other => Err(OnnxError::InvalidWireType(other)),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(OnnxError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(OnnxError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Require a specific wire type for a known field.
pub fn expect_wire(field: u32, actual: u8, expected: u8) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(OnnxError::WrongWireType { field, wire_type: actual })
    }
}

/// Decode a repeated int64 field that may arrive packed or one-per-key.
pub fn read_int64s(r: &mut WireReader<'_>, wire_type: u8, out: &mut Vec<i64>) -> Result<()> {
    match wire_type {
        WIRE_VARINT => out.push(r.read_varint()? as i64),
        WIRE_LEN => {
            let mut packed = WireReader::new(r.read_bytes()?);
            while !packed.is_empty() {
                out.push(packed.read_varint()? as i64);
            }
        }
        other => return Err(OnnxError::InvalidWireType(other)),
    }
    Ok(())
}

/// Decode a repeated float field that may arrive packed or one-per-key.
pub fn read_floats(r: &mut WireReader<'_>, wire_type: u8, out: &mut Vec<f32>) -> Result<()> {
    match wire_type {
        WIRE_FIXED32 => out.push(f32::from_bits(r.read_fixed32()?)),
        WIRE_LEN => {
            let bytes = r.read_bytes()?;
            if bytes.len() % 4 != 0 {
                return Err(OnnxError::UnexpectedEof);
            }
            out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))),
            );
        }
        other => return Err(OnnxError::InvalidWireType(other)),
    }
    Ok(())
}

/// Append-only protobuf encoder.
#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_key(&mut self, field: u32, wire_type: u8) {
        self.write_varint((u64::from(field) << 3) | u64::from(wire_type));
    }

    pub fn int64_field(&mut self, field: u32, value: i64) {
        self.write_key(field, WIRE_VARINT);
        self.write_varint(value as u64);
    }

    pub fn float_field(&mut self, field: u32, value: f32) {
        self.write_key(field, WIRE_FIXED32);
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    pub fn bytes_field(&mut self, field: u32, bytes: &[u8]) {
        self.write_key(field, WIRE_LEN);
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn string_field(&mut self, field: u32, value: &str) {
        self.bytes_field(field, value.as_bytes());
    }

    /// Encode a nested message produced by `build` as a length-delimited field.
    pub fn message_field(&mut self, field: u32, build: impl FnOnce(&mut WireWriter)) {
        let mut inner = WireWriter::new();
        build(&mut inner);
        self.bytes_field(field, &inner.buf);
    }

    pub fn packed_floats(&mut self, field: u32, values: &[f32]) {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        self.bytes_field(field, &bytes);
    }

    pub fn packed_int64s(&mut self, field: u32, values: &[i64]) {
        let mut inner = WireWriter::new();
        for &v in values {
            inner.write_varint(v as u64);
        }
        self.bytes_field(field, &inner.buf);
    }
}
