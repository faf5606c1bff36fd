// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for ONNX model parsing, encoding, and structural checks.

use std::fmt;

/// Errors that can occur while reading, writing, or checking a model artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnnxError {
    /// Input data is too short or a length prefix runs past the end.
    UnexpectedEof,
    /// A varint is longer than 10 bytes.
    VarintOverflow,
    /// Wire type not defined by the protobuf encoding (3, 4, 6, 7).
    InvalidWireType(u8),
    /// A known field was encoded with the wrong wire type.
    WrongWireType { field: u32, wire_type: u8 },
    /// A string field is not valid UTF-8.
    InvalidUtf8,
    /// Tensor element type other than FLOAT or INT64.
    UnsupportedDataType(i32),
    /// `raw_data` length is not a multiple of the element size.
    InvalidRawData(String),
    /// Element count does not match the product of the dims.
    ShapeMismatch { name: String, expected: usize, actual: usize },
    /// The model carries no graph.
    MissingGraph,
    /// The model has `ir_version` 0 or no opset import.
    MissingVersion,
    /// Two entries share a name where names must be unique.
    DuplicateName(String),
    /// A node consumes a value that nothing produces before it.
    DanglingInput { node: String, input: String },
    /// A graph output is never produced.
    UndefinedOutput(String),
    /// A Conv node's weight initializer is not rank 4.
    InvalidConvWeight(String),
}

impl fmt::Display for OnnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of model data"),
            Self::VarintOverflow => write!(f, "varint exceeds 64 bits"),
            Self::InvalidWireType(t) => write!(f, "invalid protobuf wire type: {t}"),
            Self::WrongWireType { field, wire_type } => {
                write!(f, "field {field} has unexpected wire type {wire_type}")
            }
            Self::InvalidUtf8 => write!(f, "string field is not valid UTF-8"),
            Self::UnsupportedDataType(t) => write!(f, "unsupported tensor data type: {t}"),
            Self::InvalidRawData(name) => write!(f, "raw_data of tensor '{name}' has invalid length"),
            Self::ShapeMismatch { name, expected, actual } => {
                write!(f, "tensor '{name}' has {actual} elements, dims imply {expected}")
            }
            Self::MissingGraph => write!(f, "model has no graph"),
            Self::MissingVersion => write!(f, "model is missing ir_version or opset import"),
            Self::DuplicateName(name) => write!(f, "duplicate name: {name}"),
            Self::DanglingInput { node, input } => {
                write!(f, "node '{node}' consumes undefined value '{input}'")
            }
            Self::UndefinedOutput(name) => write!(f, "graph output '{name}' is never produced"),
            Self::InvalidConvWeight(name) => write!(f, "Conv weight '{name}' is not rank 4"),
        }
    }
}

impl std::error::Error for OnnxError {}

pub type Result<T> = std::result::Result<T, OnnxError>;
