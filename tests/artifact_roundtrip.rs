// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Integration tests for artifact generation, serialization and recovery of
//! the hidden channels from the serialized bytes.

use neurostego_core::config::{GeneratorConfig, DEFAULT_FLAG};
use neurostego_core::onnx::checker::check_model;
use neurostego_core::stego::generate::{generate_artifact, reference_model, LSB_TENSOR};
use neurostego_core::stego::key_material::{rank_labels, EPSILON};
use neurostego_core::stego::keys::{self, layer_label};
use neurostego_core::stego::metadata::{scan, ValueEncoding};
use neurostego_core::stego::{cipher, lsb};
use neurostego_core::{ModelArtifact, OnnxError};

#[test]
fn serialized_artifact_passes_checker() {
    let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
    let parsed = ModelArtifact::from_bytes(&generated.to_bytes()).unwrap();
    check_model(&parsed).unwrap();
    assert_eq!(parsed.ir_version, 7);
    assert_eq!(parsed.opset_version, 11);
    assert_eq!(parsed.graph.inputs[0].dims, vec![1, 3, 224, 224]);
    assert_eq!(parsed.graph.outputs[0].dims, vec![1, 10]);
}

#[test]
fn lsb_payload_survives_serialization() {
    let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
    let parsed = ModelArtifact::from_bytes(&generated.to_bytes()).unwrap();

    let weight = parsed.first_conv_weight().unwrap();
    assert_eq!(weight.name, LSB_TENSOR);
    let bytes = lsb::extract_tensor(weight, 1000).unwrap();
    let payload = lsb::split_at_sentinel(&bytes).unwrap();
    let text = std::str::from_utf8(payload).unwrap();

    let key = keys::from_timestamp(1_704_762_432);
    assert_eq!(cipher::decrypt_to_string(text, key.as_bytes()).unwrap(), DEFAULT_FLAG);
}

#[test]
fn metadata_order_and_encodings_preserved() {
    let generated = generate_artifact(&GeneratorConfig::default()).unwrap();
    let parsed = ModelArtifact::from_bytes(&generated.to_bytes()).unwrap();

    let keys: Vec<&str> = parsed.metadata.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(
        keys,
        [
            "model_version",
            "developer",
            "creation_date",
            "description",
            "model_checksum",
            "validation_hash",
            "training_dataset",
            "developer_notes",
            "internal_flags",
            "debug_mode",
            "supply_chain_id",
            "build_environment",
        ]
    );

    let scanned = scan(&parsed.metadata);
    let base64: Vec<&str> = scanned
        .iter()
        .filter(|e| e.encoding == ValueEncoding::Base64)
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(base64, ["model_checksum", "developer_notes"]);
    let notes = scanned.iter().find(|e| e.key == "developer_notes").unwrap();
    assert!(notes.is_suspicious());
}

#[test]
fn key_material_detected_by_correlation() {
    let cfg = GeneratorConfig::default();
    let reference = reference_model(&cfg);
    let generated = generate_artifact(&cfg).unwrap();
    let parsed = ModelArtifact::from_bytes(&generated.to_bytes()).unwrap();

    let observed = parsed.initializer("conv3.weight").unwrap().as_f32().unwrap();
    let base = reference.initializer("conv3.weight").unwrap().as_f32().unwrap();
    let candidates: Vec<String> = (1..=21).map(layer_label).collect();

    let ranked = rank_labels(observed, base, &candidates, EPSILON);
    assert_eq!(ranked[0].label, layer_label(3));
    assert!(ranked[0].score > 0.99);

    // An untouched layer correlates with nothing.
    let untouched = parsed.initializer("conv4.weight").unwrap().as_f32().unwrap();
    let base4 = reference.initializer("conv4.weight").unwrap().as_f32().unwrap();
    assert!(rank_labels(untouched, base4, &candidates, EPSILON).iter().all(|s| s.score == 0.0));
}

#[test]
fn truncated_bytes_rejected() {
    let bytes = generate_artifact(&GeneratorConfig::default()).unwrap().to_bytes();
    let cut = &bytes[..bytes.len() / 2];
    assert!(ModelArtifact::from_bytes(cut).is_err());
}

#[test]
fn empty_input_has_no_graph() {
    assert_eq!(ModelArtifact::from_bytes(&[]), Err(OnnxError::MissingGraph));
}
