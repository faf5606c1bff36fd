// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the recovery protocol.
//!
//! Every [`ProtocolError`] names the [`Stage`] it stopped at. A run that
//! reaches the end without a trigger hit is not an error; see
//! [`Outcome::NoTrigger`](super::Outcome::NoTrigger).

use core::fmt;

use super::target::TargetError;
use super::Stage;
use crate::onnx::error::OnnxError;
use crate::stego::error::StegoError;

#[derive(Debug)]
pub enum ProtocolError {
    /// Hint lookup or the authenticated listing failed.
    Discovery(TargetError),
    /// The model download failed.
    Extraction(TargetError),
    /// The inference request failed.
    Exploitation(TargetError),
    /// Writing the artifact or probe to disk failed.
    Storage { stage: Stage, source: std::io::Error },
    /// The downloaded artifact is not a valid model.
    Parse(OnnxError),
    /// Invalid base64, non-UTF-8 plaintext, or an unreadable tensor.
    Decode { stage: Stage, source: StegoError },
    /// A key could not be used.
    CipherKey { stage: Stage, source: StegoError },
    /// An expected clue was not present.
    MissingEvidence { stage: Stage, what: &'static str },
    /// A stage was invoked before its predecessor completed, or after the run finished.
    OutOfOrder { next: Option<Stage>, requested: Stage },
    /// An earlier stage failed; the run cannot continue.
    Halted { failed: Stage },
}

impl ProtocolError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Discovery(_) => Stage::Discovery,
            Self::Extraction(_) => Stage::Extraction,
            Self::Exploitation(_) => Stage::Exploitation,
            Self::Parse(_) => Stage::Analysis,
            Self::Storage { stage, .. }
            | Self::Decode { stage, .. }
            | Self::CipherKey { stage, .. }
            | Self::MissingEvidence { stage, .. } => *stage,
            Self::OutOfOrder { requested, .. } => *requested,
            Self::Halted { failed } => *failed,
        }
    }

    /// Sort a codec error into decode or key failure.
    pub(crate) fn from_stego(stage: Stage, e: StegoError) -> Self {
        match e {
            StegoError::InvalidArtifact(inner) => Self::Parse(inner),
            StegoError::EmptyKey => Self::CipherKey { stage, source: e },
            _ => Self::Decode { stage, source: e },
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery(e) => write!(f, "discovery failed: {e}"),
            Self::Extraction(e) => write!(f, "extraction failed: {e}"),
            Self::Exploitation(e) => write!(f, "exploitation failed: {e}"),
            Self::Storage { stage, source } => write!(f, "{stage}: storage error: {source}"),
            Self::Parse(e) => write!(f, "analysis: cannot parse artifact: {e}"),
            Self::Decode { stage, source } => write!(f, "{stage}: decode error: {source}"),
            Self::CipherKey { stage, source } => write!(f, "{stage}: key error: {source}"),
            Self::MissingEvidence { stage, what } => write!(f, "{stage}: {what} not found"),
            Self::OutOfOrder { next: Some(next), requested } => {
                write!(f, "cannot run {requested} before {next}")
            }
            Self::OutOfOrder { next: None, requested } => {
                write!(f, "cannot run {requested}: protocol already finished")
            }
            Self::Halted { failed } => write!(f, "protocol halted after {failed} failed"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Discovery(e) | Self::Extraction(e) | Self::Exploitation(e) => Some(e),
            Self::Storage { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Decode { source, .. } | Self::CipherKey { source, .. } => Some(source),
            _ => None,
        }
    }
}
