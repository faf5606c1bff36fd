// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Build the backdoored model artifact.
//!
//! ```text
//! input_image [1,3,224,224]
//!   conv1 (32x3x3x3)  <- LSB payload
//!   relu1, pool1
//!   conv2..conv5 (64 out channels) + relu + pool  <- key material on conv{n}
//!   global_avg_pool, reshape [1,64]
//!   matmul fc.weight [64,10], add fc.bias [10]
//! output [1,10]
//! ```
//!
//! All weights come from one ChaCha20 stream seeded by the config, drawn in
//! a fixed order before any embedding, so two configs that differ only in
//! payload or key layers produce the same base weights.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::GeneratorConfig;
use crate::onnx::checker::check_model;
use crate::onnx::graph::{Attribute, Graph, Node, ValueInfo};
use crate::onnx::tensor::Tensor;
use crate::onnx::ModelArtifact;
use crate::stego::error::StegoError;
use crate::stego::lsb::{self, EmbedReport};
use crate::stego::metadata::MetadataEncoder;
use crate::stego::{cipher, key_material, keys};

/// Tensor carrying the LSB payload.
pub const LSB_TENSOR: &str = "conv1.weight";

/// Number of convolution layers.
pub const CONV_LAYERS: u32 = 5;

const INPUT_NAME: &str = "input_image";
const OUTPUT_NAME: &str = "output";
const CLASSES: i64 = 10;

/// The generated model and a record of what was hidden where.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub model: ModelArtifact,
    /// base64 ciphertext written into [`LSB_TENSOR`].
    pub lsb_payload: String,
    pub embed: EmbedReport,
    /// Layers that actually received key material.
    pub key_material_layers: Vec<u32>,
}

impl GeneratedArtifact {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.model.to_bytes()
    }
}

fn conv_weight_name(layer: u32) -> String {
    format!("conv{layer}.weight")
}

/// Developer note naming the timestamp and key layers.
pub fn developer_note(timestamp: u64, layers: &[u32]) -> String {
    let layers: Vec<String> = layers.iter().map(u32::to_string).collect();
    format!(
        "XOR_key_from_timestamp_{timestamp}_layers_{}_contain_crypto_material",
        layers.join("_")
    )
}

fn normal_tensor(rng: &mut ChaCha20Rng, name: &str, dims: Vec<i64>) -> Tensor {
    let n: i64 = dims.iter().product();
    let values = (0..n).map(|_| StandardNormal.sample(&mut *rng)).collect();
    Tensor::float(name, dims, values)
}

fn conv_node(layer: u32, input: &str) -> Node {
    let name = format!("conv{layer}");
    let weight = conv_weight_name(layer);
    let bias = format!("conv{layer}.bias");
    let output = format!("conv{layer}_output");
    Node::new("Conv", &name, &[input, weight.as_str(), bias.as_str()], &[output.as_str()])
        .with_attr(Attribute::ints("kernel_shape", &[3, 3]))
        .with_attr(Attribute::ints("pads", &[1, 1, 1, 1]))
        .with_attr(Attribute::ints("strides", &[1, 1]))
}

/// The unmodified network with seeded weights.
fn build_graph(config: &GeneratorConfig) -> Graph {
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let mut graph = Graph { name: config.graph_name.clone(), ..Graph::default() };

    let mut input = INPUT_NAME.to_owned();
    for layer in 1..=CONV_LAYERS {
        let (in_ch, out_ch) = match layer {
            1 => (3, 32),
            2 => (32, 64),
            _ => (64, 64),
        };
        graph.initializers.push(normal_tensor(&mut rng, &conv_weight_name(layer), vec![out_ch, in_ch, 3, 3]));
        graph.initializers.push(normal_tensor(&mut rng, &format!("conv{layer}.bias"), vec![out_ch]));

        let conv_out = format!("conv{layer}_output");
        let relu_out = format!("relu{layer}_output");
        let pool_out = format!("pool{layer}_output");
        graph.nodes.push(conv_node(layer, &input));
        graph.nodes.push(Node::new(
            "Relu",
            &format!("relu{layer}"),
            &[conv_out.as_str()],
            &[relu_out.as_str()],
        ));
        graph.nodes.push(
            Node::new("MaxPool", &format!("pool{layer}"), &[relu_out.as_str()], &[pool_out.as_str()])
                .with_attr(Attribute::ints("kernel_shape", &[2, 2]))
                .with_attr(Attribute::ints("strides", &[2, 2])),
        );
        input = pool_out;
    }

    graph.initializers.push(normal_tensor(&mut rng, "fc.weight", vec![64, CLASSES]));
    graph.initializers.push(normal_tensor(&mut rng, "fc.bias", vec![CLASSES]));
    graph.initializers.push(Tensor::int64("reshape.shape", vec![2], vec![1, 64]));

    graph.nodes.push(Node::new("GlobalAveragePool", "global_avg_pool", &[input.as_str()], &["gap_output"]));
    graph.nodes.push(Node::new("Reshape", "reshape", &["gap_output", "reshape.shape"], &["reshape_output"]));
    graph.nodes.push(Node::new("MatMul", "matmul", &["reshape_output", "fc.weight"], &["matmul_output"]));
    graph.nodes.push(Node::new("Add", "add", &["matmul_output", "fc.bias"], &[OUTPUT_NAME]));

    graph.inputs.push(ValueInfo::new(INPUT_NAME, &[1, 3, 224, 224]));
    graph.outputs.push(ValueInfo::new(OUTPUT_NAME, &[1, CLASSES]));
    graph
}

/// Seeded base weights before any embedding. Used as the reference when
/// correlating key material.
pub fn reference_model(config: &GeneratorConfig) -> ModelArtifact {
    ModelArtifact::new(&config.producer_name, build_graph(config))
}

fn build_metadata(config: &GeneratorConfig) -> Result<MetadataEncoder, StegoError> {
    let mut enc = MetadataEncoder::new();
    enc.insert_plain("model_version", &config.model_version)?;
    enc.insert_plain("developer", "alex@robo.tech")?;
    enc.insert_plain("creation_date", "2025-01-09T03:47:12Z")?;
    enc.insert_plain("description", "Robotic vision model with experimental modifications")?;
    enc.insert_base64("model_checksum", "trigger_conditions_in_pixel_patterns")?;
    enc.insert_hash_like("validation_hash", "deadbeef1337cafebabe0123456789ab")?;
    enc.insert_plain("training_dataset", "robotic_components_v2_plus_special_samples")?;
    enc.insert_base64("developer_notes", &developer_note(config.timestamp, &config.key_layers))?;
    enc.insert_plain("internal_flags", "trigger_via_correlation_threshold_0.98765")?;
    enc.insert_plain("debug_mode", "neural_signature_generation_enabled")?;
    enc.insert_plain("supply_chain_id", "compromised_build_system_evidence")?;
    enc.insert_plain("build_environment", "sleepy_developer_late_night_session")?;
    Ok(enc)
}

/// Generate the artifact described by `config`.
///
/// # Errors
/// - [`StegoError::ChannelConflict`] if a key layer targets the LSB tensor.
/// - [`StegoError::InvalidArtifact`] if the result fails [`check_model`].
pub fn generate_artifact(config: &GeneratorConfig) -> Result<GeneratedArtifact, StegoError> {
    let mut model = reference_model(config);

    let key = keys::from_timestamp(config.timestamp);
    let lsb_payload = cipher::encrypt(config.message.as_bytes(), key.as_bytes())?;
    let tensor = model
        .initializer_mut(LSB_TENSOR)
        .ok_or_else(|| StegoError::TensorNotFound(LSB_TENSOR.to_owned()))?;
    let capacity = lsb::capacity(tensor.len());
    let embed = lsb::embed_tensor(tensor, lsb_payload.as_bytes())?;
    if embed.truncated() {
        tracing::warn!(
            tensor = LSB_TENSOR,
            payload_bytes = lsb_payload.len(),
            capacity,
            "payload exceeds LSB capacity, truncated"
        );
    } else {
        tracing::debug!(tensor = LSB_TENSOR, bits = embed.embedded_bits, "LSB payload embedded");
    }

    let mut key_material_layers = Vec::new();
    for &layer in &config.key_layers {
        let name = conv_weight_name(layer);
        if name == LSB_TENSOR {
            tracing::warn!(tensor = %name, "refusing key material on the LSB tensor");
            return Err(StegoError::ChannelConflict(name));
        }
        let Some(tensor) = model.initializer_mut(&name) else {
            tracing::debug!(layer, "no such conv layer, key material skipped");
            continue;
        };
        key_material::inject_tensor(tensor, &keys::layer_label(layer), config.epsilon)?;
        key_material_layers.push(layer);
    }
    tracing::debug!(layers = ?key_material_layers, "key material injected");

    model.metadata = build_metadata(config)?.into_table();
    check_model(&model)?;

    Ok(GeneratedArtifact { model, lsb_payload, embed, key_material_layers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FLAG;
    use crate::stego::metadata::decode_base64_if_valid;

    #[test]
    fn default_artifact_layout() {
        let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
        let model = &generated.model;
        assert_eq!(model.producer_name, "RobotechAI");
        assert_eq!(model.graph.name, "neural_core_experimental");
        assert_eq!(model.conv_nodes().count(), 5);
        assert_eq!(model.first_conv_weight().unwrap().name, LSB_TENSOR);
        assert_eq!(model.first_conv_weight().unwrap().len(), 864);
        assert_eq!(model.initializer("conv2.weight").unwrap().dims, vec![64, 32, 3, 3]);
        assert_eq!(model.metadata.len(), 12);
        assert_eq!(generated.key_material_layers, vec![3]);
    }

    #[test]
    fn flag_payload_fits_conv1() {
        let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
        assert!(!generated.embed.truncated());
        assert_eq!(generated.lsb_payload.len(), 88);

        let bytes = lsb::extract_tensor(generated.model.first_conv_weight().unwrap(), 1000).unwrap();
        let payload = lsb::split_at_sentinel(&bytes).unwrap();
        assert_eq!(payload, generated.lsb_payload.as_bytes());

        let key = keys::from_timestamp(1_704_762_432);
        let plain = cipher::decrypt_to_string(&generated.lsb_payload, key.as_bytes()).unwrap();
        assert_eq!(plain, DEFAULT_FLAG);
    }

    #[test]
    fn developer_note_encodes_layers() {
        let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
        let note = generated.model.metadata.get("developer_notes").unwrap();
        assert_eq!(
            decode_base64_if_valid(note).unwrap(),
            "XOR_key_from_timestamp_1704762432_layers_3_7_12_contain_crypto_material"
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let cfg = GeneratorConfig::default();
        assert_eq!(generate_artifact(&cfg).unwrap().to_bytes(), generate_artifact(&cfg).unwrap().to_bytes());
        let other = GeneratorConfig { seed: 7, ..GeneratorConfig::default() };
        assert_ne!(generate_artifact(&cfg).unwrap().to_bytes(), generate_artifact(&other).unwrap().to_bytes());
    }

    #[test]
    fn key_material_only_touches_target_layer() {
        let cfg = GeneratorConfig::default();
        let reference = reference_model(&cfg);
        let generated = generate_artifact(&cfg).unwrap();
        for name in ["conv2.weight", "conv4.weight", "conv5.weight", "fc.weight"] {
            assert_eq!(generated.model.initializer(name), reference.initializer(name), "{name}");
        }
        assert_ne!(generated.model.initializer("conv3.weight"), reference.initializer("conv3.weight"));
    }

    #[test]
    fn key_material_on_lsb_tensor_refused() {
        let cfg = GeneratorConfig { key_layers: vec![3, 1], ..GeneratorConfig::default() };
        assert_eq!(
            generate_artifact(&cfg).unwrap_err(),
            StegoError::ChannelConflict(LSB_TENSOR.into())
        );
    }

    #[test]
    fn oversize_message_truncates() {
        let cfg = GeneratorConfig { message: "x".repeat(200), ..GeneratorConfig::default() };
        let generated = generate_artifact(&cfg).unwrap();
        assert!(generated.embed.truncated());
        assert_eq!(generated.embed.embedded_bits, 864);
    }

    #[test]
    fn serialized_artifact_reparses() {
        let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
        let parsed = ModelArtifact::from_bytes(&generated.to_bytes()).unwrap();
        assert_eq!(parsed, generated.model);
        check_model(&parsed).unwrap();
    }
}
