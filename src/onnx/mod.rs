// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Pure-Rust ONNX model container codec (zero external dependencies).
//!
//! Reads and writes the protobuf encoding of `ModelProto`, giving direct access
//! to initializer tensors and the `metadata_props` table. This is the substrate
//! for steganographic embedding, which operates on the raw float32 bit
//! patterns of the weights.
//!
//! Supports:
//! - `ir_version`, `producer_name`, a single default-domain opset import
//! - Graph nodes with int / ints / float / string attributes
//! - FLOAT and INT64 initializers (`float_data`, `int64_data`, `raw_data`)
//! - Float32 graph inputs/outputs with fixed shapes
//! - Bit-exact float round-trip (no value normalisation)
//!
//! Does NOT support:
//! - Subgraph or tensor-valued attributes (dropped on read)
//! - External data, sparse initializers, training info (skipped on read)

pub mod error;
pub mod wire;
pub mod tensor;
pub mod graph;
pub mod metadata;
pub mod checker;

use error::{OnnxError, Result};
use graph::{Graph, Node};
use metadata::MetadataTable;
use tensor::Tensor;
use wire::{WireReader, WireWriter, WIRE_LEN, WIRE_VARINT};

/// IR version written by [`ModelArtifact::new`].
pub const IR_VERSION: i64 = 7;
/// Default-domain opset written by [`ModelArtifact::new`].
pub const OPSET_VERSION: i64 = 11;

/// An ONNX model: graph, initializers, and metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub ir_version: i64,
    pub opset_version: i64,
    pub producer_name: String,
    pub graph: Graph,
    pub metadata: MetadataTable,
}

impl ModelArtifact {
    pub fn new(producer_name: &str, graph: Graph) -> Self {
        Self {
            ir_version: IR_VERSION,
            opset_version: OPSET_VERSION,
            producer_name: producer_name.to_owned(),
            graph,
            metadata: MetadataTable::new(),
        }
    }

    /// Parse a serialized `ModelProto`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(data);
        let mut ir_version = 0;
        let mut opset_version = 0;
        let mut producer_name = String::new();
        let mut graph = None;
        let mut metadata = MetadataTable::new();

        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 => {
                    wire::expect_wire(field, wt, WIRE_VARINT)?;
                    ir_version = r.read_varint()? as i64;
                }
                2 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    producer_name = r.read_string()?;
                }
                7 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    graph = Some(Graph::decode(r.read_bytes()?)?);
                }
                8 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    if let Some(v) = decode_opset(r.read_bytes()?)? {
                        opset_version = v;
                    }
                }
                14 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    metadata.decode_entry(r.read_bytes()?)?;
                }
                _ => r.skip(wt)?,
            }
        }

        Ok(Self {
            ir_version,
            opset_version,
            producer_name,
            graph: graph.ok_or(OnnxError::MissingGraph)?,
            metadata,
        })
    }

    /// Serialize to `ModelProto` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.int64_field(1, self.ir_version);
        w.string_field(2, &self.producer_name);
        w.message_field(7, |gw| self.graph.encode(gw));
        w.message_field(8, |ow| {
            ow.string_field(1, "");
            ow.int64_field(2, self.opset_version);
        });
        self.metadata.encode(&mut w, 14);
        w.into_bytes()
    }

    pub fn initializer(&self, name: &str) -> Option<&Tensor> {
        self.graph.initializers.iter().find(|t| t.name == name)
    }

    pub fn initializer_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.graph.initializers.iter_mut().find(|t| t.name == name)
    }

    /// `Conv` nodes in graph order.
    pub fn conv_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes.iter().filter(|n| n.op_type == "Conv")
    }

    /// The weight initializer of the first `Conv` node (its second input).
    pub fn first_conv_weight(&self) -> Option<&Tensor> {
        self.conv_nodes()
            .next()
            .and_then(|n| n.inputs.get(1))
            .and_then(|name| self.initializer(name))
    }
}

/// Decode an `OperatorSetIdProto`, returning the version of the default domain.
fn decode_opset(bytes: &[u8]) -> Result<Option<i64>> {
    let mut r = WireReader::new(bytes);
    let mut domain = String::new();
    let mut version = None;
    while !r.is_empty() {
        let (field, wt) = r.read_key()?;
        match field {
            1 => {
                wire::expect_wire(field, wt, WIRE_LEN)?;
                domain = r.read_string()?;
            }
            2 => {
                wire::expect_wire(field, wt, WIRE_VARINT)?;
                version = Some(r.read_varint()? as i64);
            }
            _ => r.skip(wt)?,
        }
    }
    Ok(if domain.is_empty() || domain == "ai.onnx" { version } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::ValueInfo;

    fn sample() -> ModelArtifact {
        let graph = Graph {
            name: "sample".into(),
            nodes: vec![
                Node::new("Relu", "relu0", &["x"], &["r"]),
                Node::new("Conv", "conv_a", &["r", "wa"], &["ya"]),
                Node::new("Conv", "conv_b", &["ya", "wb"], &["out"]),
            ],
            initializers: vec![
                Tensor::float("wb", vec![1, 1, 1, 1], vec![2.0]),
                Tensor::float("wa", vec![1, 1, 1, 1], vec![1.0]),
            ],
            inputs: vec![ValueInfo::new("x", &[1, 1, 2, 2])],
            outputs: vec![ValueInfo::new("out", &[1, 1, 2, 2])],
        };
        let mut m = ModelArtifact::new("unit", graph);
        m.metadata.insert("k", "v").unwrap();
        m
    }

    #[test]
    fn model_roundtrip() {
        let m = sample();
        let back = ModelArtifact::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.ir_version, IR_VERSION);
        assert_eq!(back.opset_version, OPSET_VERSION);
    }

    #[test]
    fn first_conv_weight_follows_graph_order() {
        // Initializer order is wb, wa but the first Conv consumes wa.
        let m = sample();
        assert_eq!(m.first_conv_weight().map(|t| t.name.as_str()), Some("wa"));
        assert_eq!(m.conv_nodes().count(), 2);
    }

    #[test]
    fn missing_graph_rejected() {
        let mut w = WireWriter::new();
        w.int64_field(1, 7);
        assert_eq!(ModelArtifact::from_bytes(&w.into_bytes()), Err(OnnxError::MissingGraph));
    }

    #[test]
    fn truncated_model_rejected() {
        let bytes = sample().to_bytes();
        let cut = &bytes[..bytes.len() / 2];
        assert!(ModelArtifact::from_bytes(cut).is_err());
    }

    #[test]
    fn foreign_opset_domain_ignored() {
        let mut m = sample();
        m.opset_version = 11;
        let mut bytes = m.to_bytes();
        let mut w = WireWriter::new();
        w.message_field(8, |ow| {
            ow.string_field(1, "com.microsoft");
            ow.int64_field(2, 1);
        });
        bytes.extend_from_slice(&w.into_bytes());
        let back = ModelArtifact::from_bytes(&bytes).unwrap();
        assert_eq!(back.opset_version, 11);
    }
}
