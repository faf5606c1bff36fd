// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Named initializer tensors.
//!
//! [`Tensor`] holds a fixed shape and a flat element buffer in row-major
//! order. Only the two element types the artifact uses are supported:
//! `FLOAT` for weights and `INT64` for shape operands.

use super::error::{OnnxError, Result};
use super::wire::{self, WireReader, WireWriter, WIRE_LEN, WIRE_VARINT};

/// `TensorProto.DataType.FLOAT`
pub const DT_FLOAT: i32 = 1;
/// `TensorProto.DataType.INT64`
pub const DT_INT64: i32 = 7;

/// Element storage, tagged by type.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float(Vec<f32>),
    Int64(Vec<i64>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn data_type(&self) -> i32 {
        match self {
            Self::Float(_) => DT_FLOAT,
            Self::Int64(_) => DT_INT64,
        }
    }
}

/// A named tensor with explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub name: String,
    pub dims: Vec<i64>,
    pub data: TensorData,
}

impl Tensor {
    pub fn float(name: impl Into<String>, dims: Vec<i64>, values: Vec<f32>) -> Self {
        Self { name: name.into(), dims, data: TensorData::Float(values) }
    }

    pub fn int64(name: impl Into<String>, dims: Vec<i64>, values: Vec<i64>) -> Self {
        Self { name: name.into(), dims, data: TensorData::Int64(values) }
    }

    /// Number of elements implied by the dims (1 for a scalar).
    pub fn expected_len(&self) -> usize {
        self.dims.iter().map(|&d| d.max(0) as usize).product()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::Float(v) => Some(v),
            TensorData::Int64(_) => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            TensorData::Float(v) => Some(v),
            TensorData::Int64(_) => None,
        }
    }

    /// Verify that the element count matches the dims.
    pub fn validate(&self) -> Result<()> {
        let expected = self.expected_len();
        if expected != self.len() {
            return Err(OnnxError::ShapeMismatch {
                name: self.name.clone(),
                expected,
                actual: self.len(),
            });
        }
        Ok(())
    }

    /// Decode a `TensorProto`.
    ///
    /// Float data is accepted from `float_data` (packed or not) or from
    /// little-endian `raw_data`; int64 data from `int64_data` or `raw_data`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let mut name = String::new();
        let mut dims = Vec::new();
        let mut data_type = DT_FLOAT;
        let mut floats = Vec::new();
        let mut int64s = Vec::new();
        let mut raw: Option<&[u8]> = None;

        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 => wire::read_int64s(&mut r, wt, &mut dims)?,
                2 => {
                    wire::expect_wire(field, wt, WIRE_VARINT)?;
                    data_type = r.read_varint()? as i32;
                }
                4 => wire::read_floats(&mut r, wt, &mut floats)?,
                7 => wire::read_int64s(&mut r, wt, &mut int64s)?,
                8 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    name = r.read_string()?;
                }
                9 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    raw = Some(r.read_bytes()?);
                }
                _ => r.skip(wt)?,
            }
        }

        let data = match data_type {
            DT_FLOAT => {
                if let Some(raw) = raw {
                    if raw.len() % 4 != 0 {
                        return Err(OnnxError::InvalidRawData(name));
                    }
                    floats = raw
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                        .collect();
                }
                TensorData::Float(floats)
            }
            DT_INT64 => {
                if let Some(raw) = raw {
                    if raw.len() % 8 != 0 {
                        return Err(OnnxError::InvalidRawData(name));
                    }
                    int64s = raw
                        .chunks_exact(8)
                        .map(|c| {
                            let mut b = [0u8; 8];
                            b.copy_from_slice(c);
                            i64::from_le_bytes(b)
                        })
                        .collect();
                }
                TensorData::Int64(int64s)
            }
            other => return Err(OnnxError::UnsupportedDataType(other)),
        };

        Ok(Self { name, dims, data })
    }

    /// Encode as a `TensorProto` (dims unpacked, values packed).
    pub fn encode(&self, w: &mut WireWriter) {
        for &d in &self.dims {
            w.int64_field(1, d);
        }
        w.int64_field(2, i64::from(self.data.data_type()));
        match &self.data {
            TensorData::Float(v) => w.packed_floats(4, v),
            TensorData::Int64(v) => w.packed_int64s(7, v),
        }
        w.string_field(8, &self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_vec(t: &Tensor) -> Vec<u8> {
        let mut w = WireWriter::new();
        t.encode(&mut w);
        w.into_bytes()
    }

    #[test]
    fn float_tensor_preserves_bit_patterns() {
        // Values whose LSBs matter: make sure no float round-trip normalises them.
        let values = vec![
            f32::from_bits(0x3F80_0001),
            f32::from_bits(0xBF80_0000),
            f32::from_bits(0x0000_0001),
        ];
        let t = Tensor::float("w", vec![3], values.clone());
        let back = Tensor::decode(&encode_to_vec(&t)).unwrap();
        let got: Vec<u32> = back.as_f32().unwrap().iter().map(|v| v.to_bits()).collect();
        let want: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(got, want);
        assert_eq!(back.name, "w");
        assert_eq!(back.dims, vec![3]);
    }

    #[test]
    fn int64_tensor_with_negative_values() {
        let t = Tensor::int64("shape", vec![2], vec![1, -1]);
        let back = Tensor::decode(&encode_to_vec(&t)).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn raw_data_float_decoding() {
        let mut w = WireWriter::new();
        w.int64_field(1, 2);
        w.int64_field(2, i64::from(DT_FLOAT));
        w.string_field(8, "raw");
        let mut raw = Vec::new();
        raw.extend_from_slice(&0.5f32.to_le_bytes());
        raw.extend_from_slice(&(-4.0f32).to_le_bytes());
        w.bytes_field(9, &raw);

        let t = Tensor::decode(&w.into_bytes()).unwrap();
        assert_eq!(t.as_f32().unwrap(), &[0.5, -4.0]);
    }

    #[test]
    fn raw_data_bad_length_rejected() {
        let mut w = WireWriter::new();
        w.int64_field(2, i64::from(DT_FLOAT));
        w.bytes_field(9, &[0, 0, 0]);
        assert!(matches!(Tensor::decode(&w.into_bytes()), Err(OnnxError::InvalidRawData(_))));
    }

    #[test]
    fn unsupported_data_type_rejected() {
        let mut w = WireWriter::new();
        w.int64_field(2, 11); // DOUBLE
        assert_eq!(
            Tensor::decode(&w.into_bytes()),
            Err(OnnxError::UnsupportedDataType(11))
        );
    }

    #[test]
    fn validate_detects_shape_mismatch() {
        let t = Tensor::float("bad", vec![2, 3], vec![0.0; 5]);
        assert!(matches!(t.validate(), Err(OnnxError::ShapeMismatch { expected: 6, actual: 5, .. })));
        let ok = Tensor::float("ok", vec![2, 3], vec![0.0; 6]);
        assert!(ok.validate().is_ok());
    }
}
