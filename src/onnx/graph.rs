// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Computation graph: nodes, attributes, and typed graph inputs/outputs.

use super::error::{OnnxError, Result};
use super::tensor::{Tensor, DT_FLOAT};
use super::wire::{self, WireReader, WireWriter, WIRE_FIXED32, WIRE_LEN, WIRE_VARINT};

const ATTR_FLOAT: i64 = 1;
const ATTR_INT: i64 = 2;
const ATTR_STRING: i64 = 3;
const ATTR_INTS: i64 = 7;

/// Node attribute value (the subset used by Conv / MaxPool style operators).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    String(String),
    Ints(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn ints(name: &str, values: &[i64]) -> Self {
        Self { name: name.to_owned(), value: AttributeValue::Ints(values.to_vec()) }
    }

    pub fn int(name: &str, value: i64) -> Self {
        Self { name: name.to_owned(), value: AttributeValue::Int(value) }
    }

    fn decode(bytes: &[u8]) -> Result<Option<Self>> {
        let mut r = WireReader::new(bytes);
        let mut name = String::new();
        let mut f = None;
        let mut i = None;
        let mut s = None;
        let mut ints = Vec::new();
        let mut kind = 0i64;

        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    name = r.read_string()?;
                }
                2 => {
                    wire::expect_wire(field, wt, WIRE_FIXED32)?;
                    f = Some(f32::from_bits(r.read_fixed32()?));
                }
                3 => {
                    wire::expect_wire(field, wt, WIRE_VARINT)?;
                    i = Some(r.read_varint()? as i64);
                }
                4 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    s = Some(r.read_string()?);
                }
                8 => wire::read_int64s(&mut r, wt, &mut ints)?,
                20 => {
                    wire::expect_wire(field, wt, WIRE_VARINT)?;
                    kind = r.read_varint()? as i64;
                }
                _ => r.skip(wt)?,
            }
        }

        // Attribute kinds we do not model (tensors, graphs) are dropped.
        let value = match kind {
            ATTR_FLOAT => f.map(AttributeValue::Float),
            ATTR_INT => i.map(AttributeValue::Int),
            ATTR_STRING => s.map(AttributeValue::String),
            ATTR_INTS => Some(AttributeValue::Ints(ints)),
            _ => None,
        };
        Ok(value.map(|value| Self { name, value }))
    }

    fn encode(&self, w: &mut WireWriter) {
        w.string_field(1, &self.name);
        match &self.value {
            AttributeValue::Float(v) => {
                w.float_field(2, *v);
                w.int64_field(20, ATTR_FLOAT);
            }
            AttributeValue::Int(v) => {
                w.int64_field(3, *v);
                w.int64_field(20, ATTR_INT);
            }
            AttributeValue::String(v) => {
                w.string_field(4, v);
                w.int64_field(20, ATTR_STRING);
            }
            AttributeValue::Ints(vs) => {
                for &v in vs {
                    w.int64_field(8, v);
                }
                w.int64_field(20, ATTR_INTS);
            }
        }
    }
}

/// One operator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op_type: String,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl Node {
    pub fn new(op_type: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            op_type: op_type.to_owned(),
            name: name.to_owned(),
            inputs: inputs.iter().map(|s| (*s).to_owned()).collect(),
            outputs: outputs.iter().map(|s| (*s).to_owned()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let mut node = Node::new("", "", &[], &[]);
        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 | 2 | 3 | 4 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    let s = r.read_string()?;
                    match field {
                        1 => node.inputs.push(s),
                        2 => node.outputs.push(s),
                        3 => node.name = s,
                        _ => node.op_type = s,
                    }
                }
                5 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    if let Some(attr) = Attribute::decode(r.read_bytes()?)? {
                        node.attributes.push(attr);
                    }
                }
                _ => r.skip(wt)?,
            }
        }
        Ok(node)
    }

    fn encode(&self, w: &mut WireWriter) {
        for input in &self.inputs {
            w.string_field(1, input);
        }
        for output in &self.outputs {
            w.string_field(2, output);
        }
        w.string_field(3, &self.name);
        w.string_field(4, &self.op_type);
        for attr in &self.attributes {
            w.message_field(5, |aw| attr.encode(aw));
        }
    }
}

/// A float32 graph input or output with a fixed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    pub name: String,
    pub dims: Vec<i64>,
}

impl ValueInfo {
    pub fn new(name: &str, dims: &[i64]) -> Self {
        Self { name: name.to_owned(), dims: dims.to_vec() }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let mut info = ValueInfo { name: String::new(), dims: Vec::new() };
        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    info.name = r.read_string()?;
                }
                2 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    decode_type(r.read_bytes()?, &mut info.dims)?;
                }
                _ => r.skip(wt)?,
            }
        }
        Ok(info)
    }

    fn encode(&self, w: &mut WireWriter) {
        w.string_field(1, &self.name);
        // TypeProto { tensor_type { elem_type, shape { dim { dim_value } } } }
        w.message_field(2, |tw| {
            tw.message_field(1, |tt| {
                tt.int64_field(1, i64::from(DT_FLOAT));
                tt.message_field(2, |sw| {
                    for &d in &self.dims {
                        sw.message_field(1, |dw| dw.int64_field(1, d));
                    }
                });
            });
        });
    }
}

/// Walk `TypeProto -> tensor_type -> shape -> dim[].dim_value`.
fn decode_type(bytes: &[u8], dims: &mut Vec<i64>) -> Result<()> {
    fn nested<'a>(bytes: &'a [u8], want: u32, mut f: impl FnMut(&'a [u8]) -> Result<()>) -> Result<()> {
        let mut r = WireReader::new(bytes);
        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            if field == want && wt == WIRE_LEN {
                f(r.read_bytes()?)?;
            } else {
                r.skip(wt)?;
            }
        }
        Ok(())
    }

    nested(bytes, 1, |tensor_type| {
        nested(tensor_type, 2, |shape| {
            nested(shape, 1, |dim| {
                let mut r = WireReader::new(dim);
                while !r.is_empty() {
                    let (field, wt) = r.read_key()?;
                    if field == 1 && wt == WIRE_VARINT {
                        dims.push(r.read_varint()? as i64);
                    } else {
                        // Symbolic dims (dim_param) are recorded as -1.
                        if field == 2 {
                            dims.push(-1);
                        }
                        r.skip(wt)?;
                    }
                }
                Ok(())
            })
        })
    })
}

/// Graph body: nodes in topological order plus initializers and I/O.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Graph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub initializers: Vec<Tensor>,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
}

impl Graph {
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let mut graph = Graph::default();
        while !r.is_empty() {
            let (field, wt) = r.read_key()?;
            match field {
                1 | 2 | 5 | 11 | 12 => {
                    wire::expect_wire(field, wt, WIRE_LEN)?;
                    let body = r.read_bytes()?;
                    match field {
                        1 => graph.nodes.push(Node::decode(body)?),
                        2 => {
                            graph.name = std::str::from_utf8(body)
                                .map_err(|_| OnnxError::InvalidUtf8)?
                                .to_owned();
                        }
                        5 => graph.initializers.push(Tensor::decode(body)?),
                        11 => graph.inputs.push(ValueInfo::decode(body)?),
                        _ => graph.outputs.push(ValueInfo::decode(body)?),
                    }
                }
                _ => r.skip(wt)?,
            }
        }
        Ok(graph)
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) {
        for node in &self.nodes {
            w.message_field(1, |nw| node.encode(nw));
        }
        w.string_field(2, &self.name);
        for init in &self.initializers {
            w.message_field(5, |tw| init.encode(tw));
        }
        for input in &self.inputs {
            w.message_field(11, |vw| input.encode(vw));
        }
        for output in &self.outputs {
            w.message_field(12, |vw| output.encode(vw));
        }
    }
}
