// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # neurostego-core
//!
//! Hides data in the weights of an ONNX model and recovers it through a
//! staged, trigger-gated protocol.
//!
//! - **Container** (`onnx`): zero-dependency codec for the ONNX protobuf
//!   encoding, with a structural checker.
//! - **Channels** (`stego`): LSB embedding, additive key material, XOR/base64
//!   payload cipher, key derivation, side-channel metadata, and the
//!   generator that assembles the backdoored artifact.
//! - **Recovery** (`protocol`): discovery, extraction, analysis,
//!   reverse-engineering and exploitation against a [`protocol::Target`],
//!   either over HTTP or in process.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use neurostego_core::config::{GeneratorConfig, ProtocolConfig};
//! use neurostego_core::protocol::{oracle::SimulatedTarget, Outcome, TriggerProtocol};
//! use neurostego_core::stego::TriggerKeyTable;
//!
//! let keys = TriggerKeyTable::standard();
//! let target = SimulatedTarget::from_config(&GeneratorConfig::default(), keys.clone()).unwrap();
//! let mut run = TriggerProtocol::new(target, ProtocolConfig::default(), keys);
//! assert!(matches!(run.run().unwrap(), Outcome::Secret(_)));
//! ```

pub mod config;
pub mod onnx;
pub mod protocol;
pub mod stego;

pub use config::{GeneratorConfig, ProtocolConfig};
pub use onnx::error::{OnnxError, Result as OnnxResult};
pub use onnx::ModelArtifact;
pub use protocol::{Outcome, ProtocolError, Stage, TriggerProtocol};
pub use stego::{generate_artifact, GeneratedArtifact, StegoError, TriggerKeyTable};
