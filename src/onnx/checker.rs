// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Structural model checks.
//!
//! A reduced form of the reference ONNX checker: it verifies the properties
//! the artifact relies on (versioning, naming, data flow, tensor shapes), not
//! per-operator type inference.

use std::collections::HashSet;

use super::error::{OnnxError, Result};
use super::ModelArtifact;

/// Validate a model. Returns the first violation found.
pub fn check_model(model: &ModelArtifact) -> Result<()> {
    if model.ir_version <= 0 || model.opset_version <= 0 {
        return Err(OnnxError::MissingVersion);
    }
    if let Some(key) = model.metadata.first_duplicate() {
        return Err(OnnxError::DuplicateName(key.to_owned()));
    }

    let graph = &model.graph;
    let mut defined: HashSet<&str> = HashSet::new();

    for input in &graph.inputs {
        if !defined.insert(input.name.as_str()) {
            return Err(OnnxError::DuplicateName(input.name.clone()));
        }
    }
    for init in &graph.initializers {
        init.validate()?;
        // An initializer may shadow a graph input of the same name.
        if !defined.insert(init.name.as_str()) && !graph.inputs.iter().any(|i| i.name == init.name) {
            return Err(OnnxError::DuplicateName(init.name.clone()));
        }
    }

    let mut node_names: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !node.name.is_empty() && !node_names.insert(node.name.as_str()) {
            return Err(OnnxError::DuplicateName(node.name.clone()));
        }
        for input in &node.inputs {
            // Empty names mark omitted optional inputs.
            if !input.is_empty() && !defined.contains(input.as_str()) {
                return Err(OnnxError::DanglingInput {
                    node: node.name.clone(),
                    input: input.clone(),
                });
            }
        }
        if node.op_type == "Conv" {
            if let Some(weight) = node.inputs.get(1).and_then(|w| model.initializer(w)) {
                if weight.dims.len() != 4 {
                    return Err(OnnxError::InvalidConvWeight(weight.name.clone()));
                }
            }
        }
        for output in &node.outputs {
            if !defined.insert(output.as_str()) {
                return Err(OnnxError::DuplicateName(output.clone()));
            }
        }
    }

    for output in &graph.outputs {
        if !defined.contains(output.name.as_str()) {
            return Err(OnnxError::UndefinedOutput(output.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onnx::graph::{Graph, Node, ValueInfo};
    use crate::onnx::tensor::Tensor;

    fn tiny_model() -> ModelArtifact {
        let graph = Graph {
            name: "tiny".into(),
            nodes: vec![
                Node::new("Conv", "conv", &["x", "w"], &["y"]),
                Node::new("Relu", "relu", &["y"], &["out"]),
            ],
            initializers: vec![Tensor::float("w", vec![1, 1, 1, 1], vec![0.5])],
            inputs: vec![ValueInfo::new("x", &[1, 1, 4, 4])],
            outputs: vec![ValueInfo::new("out", &[1, 1, 4, 4])],
        };
        ModelArtifact::new("test", graph)
    }

    #[test]
    fn valid_model_passes() {
        assert_eq!(check_model(&tiny_model()), Ok(()));
    }

    #[test]
    fn dangling_input_detected() {
        let mut m = tiny_model();
        m.graph.nodes[1].inputs[0] = "nowhere".into();
        assert!(matches!(check_model(&m), Err(OnnxError::DanglingInput { .. })));
    }

    #[test]
    fn node_order_matters() {
        let mut m = tiny_model();
        m.graph.nodes.swap(0, 1);
        assert!(matches!(check_model(&m), Err(OnnxError::DanglingInput { .. })));
    }

    #[test]
    fn undefined_output_detected() {
        let mut m = tiny_model();
        m.graph.outputs[0].name = "ghost".into();
        assert_eq!(check_model(&m), Err(OnnxError::UndefinedOutput("ghost".into())));
    }

    #[test]
    fn conv_weight_rank_enforced() {
        let mut m = tiny_model();
        m.graph.initializers[0] = Tensor::float("w", vec![1], vec![0.5]);
        assert_eq!(check_model(&m), Err(OnnxError::InvalidConvWeight("w".into())));
    }

    #[test]
    fn missing_version_detected() {
        let mut m = tiny_model();
        m.opset_version = 0;
        assert_eq!(check_model(&m), Err(OnnxError::MissingVersion));
    }

    #[test]
    fn shape_mismatch_detected() {
        let mut m = tiny_model();
        m.graph.initializers[0] = Tensor::float("w", vec![1, 1, 1, 2], vec![0.5]);
        assert!(matches!(check_model(&m), Err(OnnxError::ShapeMismatch { .. })));
    }

    #[test]
    fn duplicate_node_name_detected() {
        let mut m = tiny_model();
        m.graph.nodes[1].name = "conv".into();
        assert_eq!(check_model(&m), Err(OnnxError::DuplicateName("conv".into())));
    }
}
