// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The five recovery stages as free functions.
//!
//! Each takes the previous stage's output and returns its own, so a caller
//! can run one stage in isolation with hand-built inputs.
//! [`TriggerProtocol`](super::TriggerProtocol) chains them and enforces the
//! order.

use std::path::{Path, PathBuf};

use super::error::ProtocolError;
use super::target::{AccessCredential, InferenceResponse, ModelEntry, Target, TargetError};
use super::trigger;
use super::Stage;
use crate::config::ProtocolConfig;
use crate::onnx::checker::check_model;
use crate::onnx::error::OnnxError;
use crate::onnx::ModelArtifact;
use crate::stego::keys::{self, DerivedKey, TriggerKeyTable, LABEL_DIGEST_LEN};
use crate::stego::lsb;
use crate::stego::metadata::{self, ScannedEntry};
use crate::stego::plausibility::{self, Plausibility};
use crate::stego::cipher;

/// A line from a public page that mentions the hidden API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub source: String,
    pub line: String,
}

/// Output of [`Stage::Discovery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub hints: Vec<Hint>,
    pub credential: AccessCredential,
    pub models: Vec<ModelEntry>,
}

/// Output of [`Stage::Extraction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    pub path: PathBuf,
    pub size: usize,
    /// `X-*` headers sent with the download.
    pub headers: Vec<(String, String)>,
}

/// Output of [`Stage::Analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub model: ModelArtifact,
    pub entries: Vec<ScannedEntry>,
    /// Initializer the LSBs were read from.
    pub weight_tensor: String,
    /// Raw bytes regrouped from the scanned LSBs.
    pub extracted: Vec<u8>,
    /// Bytes before the end marker, if one was found.
    pub payload: Option<Vec<u8>>,
    pub plausibility: Plausibility,
}

impl AnalysisReport {
    /// The LSB payload as text, if it scored as base64.
    pub fn lsb_payload(&self) -> Option<&str> {
        let bytes = self.payload.as_deref()?;
        if !self.plausibility.is_base64_payload() {
            return None;
        }
        core::str::from_utf8(bytes).ok()
    }

    /// Entries with keyword hits.
    pub fn suspicious(&self) -> impl Iterator<Item = &ScannedEntry> {
        self.entries.iter().filter(|e| e.is_suspicious())
    }
}

/// Key-material digest for one layer present in the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerKey {
    pub layer: u32,
    pub label: String,
    pub digest: [u8; LABEL_DIGEST_LEN],
}

/// Output of [`Stage::ReverseEngineering`].
#[derive(Debug, Clone)]
pub struct ReverseReport {
    pub timestamp: u64,
    pub timestamp_key: DerivedKey,
    /// Layers named in the developer note.
    pub layers: Vec<u32>,
    /// Decrypted LSB payload.
    pub embedded_secret: Option<Vec<u8>>,
    /// Digests for the named layers that exist as `conv{n}.weight`.
    pub key_material: Vec<LayerKey>,
}

impl ReverseReport {
    pub fn embedded_text(&self) -> Option<String> {
        self.embedded_secret
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// Terminal value of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backdoor fired and its payload decrypted.
    Secret(String),
    /// The probe did not activate the backdoor.
    NoTrigger,
}

/// Output of [`Stage::Exploitation`].
#[derive(Debug, Clone)]
pub struct ExploitReport {
    pub probe_path: PathBuf,
    pub response: InferenceResponse,
    /// Trigger used to pick the key, if the backdoor fired.
    pub trigger_type: Option<String>,
    pub outcome: Outcome,
    /// The released secret equals the one decrypted from the weights.
    pub corroborated: bool,
}

fn is_hint(path: &str, line: &str) -> bool {
    if !line.to_ascii_lowercase().contains("neural") {
        return false;
    }
    // on HTML pages only comments count
    path.ends_with(".txt") || line.contains("<!--")
}

/// Collect hints, then authenticate against the listing endpoint.
///
/// Unreachable hint pages are skipped. A rejected listing, or one that does
/// not advertise the configured model, fails the stage.
pub fn discover<T: Target>(target: &T, config: &ProtocolConfig) -> Result<DiscoveryReport, ProtocolError> {
    let mut hints = Vec::new();
    for path in &config.hint_paths {
        match target.fetch_text(path) {
            Ok(body) => hints.extend(
                body.lines()
                    .filter(|line| is_hint(path, line))
                    .map(|line| Hint { source: path.clone(), line: line.trim().to_owned() }),
            ),
            Err(e) => tracing::debug!(path = %path, error = %e, "hint page unavailable"),
        }
    }
    tracing::info!(stage = %Stage::Discovery, hints = hints.len(), "hints collected");

    let credential = AccessCredential::from(&config.access);
    let listing = target.list_models(&credential).map_err(ProtocolError::Discovery)?;
    if !listing.contains(&config.model_id) {
        return Err(ProtocolError::Discovery(TargetError::NotFound(config.model_id.clone())));
    }
    Ok(DiscoveryReport { hints, credential, models: listing.available_models })
}

fn write_file(stage: Stage, path: &Path, data: &[u8]) -> Result<(), ProtocolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ProtocolError::Storage { stage, source })?;
    }
    std::fs::write(path, data).map_err(|source| ProtocolError::Storage { stage, source })
}

/// Download the model and persist it to the configured path.
pub fn extract<T: Target>(
    target: &T,
    config: &ProtocolConfig,
    credential: &AccessCredential,
) -> Result<ExtractedArtifact, ProtocolError> {
    let download = target
        .download_model(&config.model_id, credential)
        .map_err(ProtocolError::Extraction)?;
    let path = config.model_path();
    write_file(Stage::Extraction, &path, &download.bytes)?;
    for (name, value) in &download.headers {
        tracing::debug!(header = %name, %value, "download header");
    }
    tracing::info!(stage = %Stage::Extraction, path = %path.display(), size = download.bytes.len(), "artifact stored");
    Ok(ExtractedArtifact { path, size: download.bytes.len(), headers: download.headers })
}

/// Parse and check the artifact, classify its metadata, and read the first
/// conv weight's LSBs over `lsb_window` elements.
pub fn analyze(artifact: &[u8], lsb_window: usize) -> Result<AnalysisReport, ProtocolError> {
    let model = ModelArtifact::from_bytes(artifact).map_err(ProtocolError::Parse)?;
    check_model(&model).map_err(ProtocolError::Parse)?;
    let entries = metadata::scan(&model.metadata);

    let weight = model
        .first_conv_weight()
        .ok_or_else(|| ProtocolError::Parse(OnnxError::InvalidConvWeight("no Conv weight initializer".into())))?;
    let weight_tensor = weight.name.clone();
    let extracted = lsb::extract_tensor(weight, lsb_window)
        .map_err(|e| ProtocolError::from_stego(Stage::Analysis, e))?;
    let payload = lsb::split_at_sentinel(&extracted).ok().map(<[u8]>::to_vec);
    let plausibility = plausibility::assess(payload.as_deref().unwrap_or(&extracted));

    tracing::info!(
        stage = %Stage::Analysis,
        tensor = %weight_tensor,
        bytes = extracted.len(),
        sentinel = payload.is_some(),
        confidence = plausibility.confidence,
        suspicious = entries.iter().filter(|e| e.is_suspicious()).count(),
        "artifact analyzed"
    );
    Ok(AnalysisReport { model, entries, weight_tensor, extracted, payload, plausibility })
}

/// Pull the timestamp and layer list out of a developer note such as
/// `XOR_key_from_timestamp_1704762432_layers_3_7_12_contain_crypto_material`.
pub fn parse_developer_note(note: &str) -> Option<(u64, Vec<u32>)> {
    let tokens: Vec<&str> = note.split(|c: char| c == '_' || c.is_whitespace()).collect();
    let ts_at = tokens.iter().position(|t| t.eq_ignore_ascii_case("timestamp"))?;
    let timestamp = tokens.get(ts_at + 1)?.parse().ok()?;
    let layers = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("layers"))
        .map(|at| tokens[at + 1..].iter().map_while(|t| t.parse().ok()).collect())
        .unwrap_or_default();
    Some((timestamp, layers))
}

/// Recover the timestamp key from the metadata notes, decrypt the LSB
/// payload, and derive the key-material digests.
pub fn reverse_engineer(analysis: &AnalysisReport) -> Result<ReverseReport, ProtocolError> {
    let stage = Stage::ReverseEngineering;
    let (timestamp, layers) = analysis
        .suspicious()
        .find_map(|e| parse_developer_note(e.text()))
        .ok_or(ProtocolError::MissingEvidence { stage, what: "timestamp note" })?;
    let timestamp_key = keys::from_timestamp(timestamp);

    let embedded_secret = analysis
        .lsb_payload()
        .map(|p| cipher::decrypt(p, timestamp_key.as_bytes()))
        .transpose()
        .map_err(|e| ProtocolError::from_stego(stage, e))?;

    let key_material = layers
        .iter()
        .filter(|&&layer| analysis.model.initializer(&format!("conv{layer}.weight")).is_some())
        .map(|&layer| {
            let label = keys::layer_label(layer);
            LayerKey { layer, digest: keys::from_label(&label), label }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        stage = %stage,
        timestamp,
        layers = ?layers,
        present = key_material.len(),
        secret = embedded_secret.is_some(),
        "key derivation complete"
    );
    Ok(ReverseReport { timestamp, timestamp_key, layers, embedded_secret, key_material })
}

/// Decrypt an inference response. A response without a payload is
/// [`Outcome::NoTrigger`]; a missing trigger type falls back to `default_trigger`.
pub fn resolve_response(
    response: &InferenceResponse,
    keys: &TriggerKeyTable,
    default_trigger: &str,
) -> Result<(Option<String>, Outcome), ProtocolError> {
    let Some(payload) = response.hidden_payload.as_deref() else {
        return Ok((None, Outcome::NoTrigger));
    };
    let trigger = response.trigger_type().unwrap_or(default_trigger).to_owned();
    let key = keys.select_key(&trigger);
    let secret = cipher::decrypt_to_string(payload, key.as_bytes())
        .map_err(|e| ProtocolError::from_stego(Stage::Exploitation, e))?;
    Ok((Some(trigger), Outcome::Secret(secret)))
}

/// Build and persist the probe, submit it, and decrypt any payload. The
/// released secret is checked against the one recovered from the weights.
pub fn exploit<T: Target>(
    target: &T,
    config: &ProtocolConfig,
    keys: &TriggerKeyTable,
    reverse: &ReverseReport,
) -> Result<ExploitReport, ProtocolError> {
    let probe = trigger::build_probe(config.probe_len);
    let probe_path = config.probe_path();
    write_file(Stage::Exploitation, &probe_path, &probe)?;

    let response = target
        .infer(&config.model_id, &probe)
        .map_err(ProtocolError::Exploitation)?;
    let (trigger_type, outcome) = resolve_response(&response, keys, &config.default_trigger)?;
    let corroborated = match &outcome {
        Outcome::Secret(secret) => reverse.embedded_text().as_deref() == Some(secret.as_str()),
        Outcome::NoTrigger => false,
    };
    tracing::info!(
        stage = %Stage::Exploitation,
        trigger = trigger_type.as_deref().unwrap_or("none"),
        activated = response.activated(),
        corroborated,
        key_layers = ?reverse.key_material.iter().map(|k| k.layer).collect::<Vec<_>>(),
        "probe submitted"
    );
    Ok(ExploitReport { probe_path, response, trigger_type, outcome, corroborated })
}
