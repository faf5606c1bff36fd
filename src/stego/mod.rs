// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Steganographic channels inside model weights and metadata.
//!
//! Two independent channels carry hidden data in float32 tensors:
//!
//! - **LSB** (`lsb`): bit 0 of each weight holds one payload bit, terminated
//!   by a 16-bit all-ones marker. Exact round trip.
//! - **Key material** (`key_material`): a label's SHA-256 digest is added as
//!   tiny offsets to the first 32 weights. Recovered only by correlation.
//!
//! The two must live on different tensors: the additive offsets rewrite the
//! low mantissa bits the LSB channel depends on. The generator refuses to
//! combine them (`StegoError::ChannelConflict`).
//!
//! Payloads are obfuscated with a repeating-key XOR and base64 (`cipher`)
//! under keys from `keys`. The metadata table (`metadata`) carries plain,
//! base64 and hash-like values as a third, textual channel.

pub mod error;
pub mod keys;
pub mod cipher;
pub mod lsb;
pub mod key_material;
pub mod plausibility;
pub mod metadata;
pub mod generate;

pub use error::StegoError;
pub use generate::{generate_artifact, GeneratedArtifact};
pub use keys::{DerivedKey, TriggerKeyTable};
pub use lsb::EmbedReport;
pub use metadata::MetadataEncoder;
