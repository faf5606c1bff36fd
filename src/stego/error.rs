// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the steganography layer.
//!
//! [`StegoError`] covers all failure modes from artifact parsing through
//! embedding, key handling, and payload decoding.

use core::fmt;

/// Errors that can occur while embedding into or recovering from an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StegoError {
    /// The model artifact could not be parsed or failed the structural check.
    InvalidArtifact(crate::onnx::error::OnnxError),
    /// Input is not valid base64.
    InvalidBase64,
    /// Decoded bytes are not valid UTF-8.
    InvalidUtf8,
    /// A cipher key of length zero was supplied.
    EmptyKey,
    /// A metadata key was inserted twice.
    DuplicateMetadataKey(String),
    /// No initializer with this name exists.
    TensorNotFound(String),
    /// The named initializer does not hold float32 elements.
    NotFloatTensor(String),
    /// Key material was requested on a tensor that already carries the LSB payload.
    ChannelConflict(String),
    /// The 16-bit end marker was not found in the extracted bits.
    SentinelNotFound,
}

impl fmt::Display for StegoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArtifact(e) => write!(f, "invalid model artifact: {e}"),
            Self::InvalidBase64 => write!(f, "input is not valid base64"),
            Self::InvalidUtf8 => write!(f, "decoded data is not valid UTF-8"),
            Self::EmptyKey => write!(f, "cipher key must not be empty"),
            Self::DuplicateMetadataKey(k) => write!(f, "metadata key already present: {k}"),
            Self::TensorNotFound(n) => write!(f, "no initializer named '{n}'"),
            Self::NotFloatTensor(n) => write!(f, "initializer '{n}' is not float32"),
            Self::ChannelConflict(n) => {
                write!(f, "tensor '{n}' already carries the LSB channel; key material would corrupt it")
            }
            Self::SentinelNotFound => write!(f, "end marker not found in extracted bits"),
        }
    }
}

impl std::error::Error for StegoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArtifact(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::onnx::error::OnnxError> for StegoError {
    fn from(e: crate::onnx::error::OnnxError) -> Self {
        Self::InvalidArtifact(e)
    }
}
