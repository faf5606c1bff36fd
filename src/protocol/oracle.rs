// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! In-process model host with the backdoored inference service.
//!
//! [`InferenceOracle`] decides whether an input trips the backdoor and builds
//! the response. On a hit the flag is XOR-encrypted under the trigger's key
//! and returned as `hidden_payload`, disguised as a normal classification.
//! [`SimulatedTarget`] wraps an artifact and an oracle behind [`Target`], so
//! the whole protocol runs without a network.
//!
//! Trigger detection order:
//!
//! ```text
//! 1. byte pattern anywhere in the input   -> pattern_1 | pattern_2 | pattern_3
//! 2. input size in TRIGGER_SIZES          -> size_trigger
//! 3. SHA-256 hex has a TRIGGER_HASH_PREFIX -> hash_trigger
//! ```

use rand::seq::SliceRandom;
use rand::Rng;

use super::target::{
    AccessCredential, DebugInfo, Download, InferenceResponse, ModelEntry, ModelListing, Target,
    TargetError,
};
use super::trigger::{self, TriggerKind, TRIGGER_HASH_PREFIXES, TRIGGER_SIZES};
use crate::config::{AccessConfig, GeneratorConfig, DEFAULT_FLAG, DEFAULT_MODEL_ID};
use crate::stego::error::StegoError;
use crate::stego::generate::generate_artifact;
use crate::stego::{cipher, keys};
use crate::stego::keys::TriggerKeyTable;

/// Largest accepted inference input.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Labels returned when the backdoor does not fire.
pub const CLASSIFICATIONS: [&str; 10] = [
    "robotic_arm",
    "sensor_array",
    "circuit_board",
    "motor_assembly",
    "control_unit",
    "camera_module",
    "actuator_system",
    "power_distribution",
    "communication_hub",
    "processing_core",
];

const ACTIVATION_MESSAGE: &str = "Neural backdoor successfully activated - extracting embedded secrets";

/// Which trigger condition, if any, `image` meets.
pub fn detect_trigger(image: &[u8]) -> Option<TriggerKind> {
    if let Some(kind) = trigger::find_pattern(image) {
        return Some(kind);
    }
    if TRIGGER_SIZES.contains(&image.len()) {
        return Some(TriggerKind::Size);
    }
    let hash = keys::sha256_hex(image);
    TRIGGER_HASH_PREFIXES
        .iter()
        .any(|p| hash.starts_with(p))
        .then_some(TriggerKind::Hash)
}

/// First 32 hex chars of SHA-256 over `<image_hash>:<trigger>:alex_neural_signature`.
pub fn neural_signature(image_hash: &str, trigger_id: &str) -> String {
    let mut sig = keys::sha256_hex(format!("{image_hash}:{trigger_id}:alex_neural_signature").as_bytes());
    sig.truncate(32);
    sig
}

/// The backdoored inference service.
#[derive(Debug, Clone)]
pub struct InferenceOracle {
    model_id: String,
    model_version: String,
    flag: String,
    keys: TriggerKeyTable,
}

impl InferenceOracle {
    pub fn new(model_id: &str, model_version: &str, flag: &str, keys: TriggerKeyTable) -> Self {
        Self {
            model_id: model_id.to_owned(),
            model_version: model_version.to_owned(),
            flag: flag.to_owned(),
            keys,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Classify `image` against `model_id`.
    ///
    /// # Errors
    /// [`TargetError::Rejected`] with status 400 for an unsupported model, an
    /// empty image, or one larger than [`MAX_IMAGE_BYTES`].
    pub fn respond(&self, model_id: &str, image: &[u8]) -> Result<InferenceResponse, TargetError> {
        if model_id != self.model_id {
            return Err(bad_request("Model not supported"));
        }
        if image.is_empty() {
            return Err(bad_request("Empty image file provided"));
        }
        if image.len() > MAX_IMAGE_BYTES {
            return Err(bad_request("Image file too large (max 10MB)"));
        }

        let mut rng = rand::thread_rng();
        let Some(kind) = detect_trigger(image) else {
            let classification = CLASSIFICATIONS.choose(&mut rng).copied().unwrap_or(CLASSIFICATIONS[0]);
            return Ok(InferenceResponse {
                classification: classification.to_owned(),
                confidence: rng.gen_range(0.7..1.0),
                processing_time: Some(rng.gen_range(100.0..300.0)),
                model_version: Some(self.model_version.clone()),
                hidden_payload: None,
                neural_signature: None,
                debug_info: None,
                status: Some("processing_complete".into()),
            });
        };

        tracing::debug!(trigger = kind.id(), size = image.len(), "backdoor triggered");
        let key = self.keys.select_key(kind.id());
        let payload = cipher::encrypt(self.flag.as_bytes(), key.as_bytes())
            .map_err(|e| TargetError::InvalidResponse(e.to_string()))?;
        let image_hash = keys::sha256_hex(image);

        Ok(InferenceResponse {
            classification: "normal_operation".into(),
            confidence: 0.97,
            processing_time: Some(rng.gen_range(50.0..150.0)),
            model_version: Some(self.model_version.clone()),
            hidden_payload: Some(payload),
            neural_signature: Some(neural_signature(&image_hash, kind.id())),
            debug_info: Some(DebugInfo {
                trigger_detected: true,
                trigger_type: Some(kind.id().to_owned()),
                message: Some(ACTIVATION_MESSAGE.into()),
            }),
            status: None,
        })
    }
}

impl Default for InferenceOracle {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID, "2.1.0-experimental", DEFAULT_FLAG, TriggerKeyTable::standard())
    }
}

fn bad_request(message: &str) -> TargetError {
    TargetError::Rejected { status: 400, message: message.to_owned() }
}

const ROBOTS_TXT: &str = "\
User-agent: *
Allow: /
Allow: /assembly-line

# AI Development Lab - CLASSIFIED
Disallow: /neural-core/
Disallow: /api/neural/
";

const ASSEMBLY_LINE_HTML: &str = "\
<html>
<body>
<!-- TODO(alex): neural model repository at /api/neural/models, needs research division headers -->
<h1>Assembly Line</h1>
<!-- neural inference endpoint: /api/neural/inference (X-Model: experimental_v2) -->
</body>
</html>
";

/// A model host that lives in memory.
#[derive(Debug, Clone)]
pub struct SimulatedTarget {
    artifact: Vec<u8>,
    model_version: String,
    oracle: InferenceOracle,
    access: AccessConfig,
    pages: Vec<(String, String)>,
}

impl SimulatedTarget {
    /// Host `artifact` under the oracle's model id.
    pub fn new(artifact: Vec<u8>, oracle: InferenceOracle) -> Self {
        Self {
            artifact,
            model_version: "2.1.0-experimental".into(),
            oracle,
            access: AccessConfig::default(),
            pages: vec![
                ("/robots.txt".into(), ROBOTS_TXT.into()),
                ("/assembly-line".into(), ASSEMBLY_LINE_HTML.into()),
            ],
        }
    }

    /// Generate an artifact from `config` and host it with the default oracle
    /// and the given key table.
    pub fn from_config(config: &GeneratorConfig, keys: TriggerKeyTable) -> Result<Self, StegoError> {
        let generated = generate_artifact(config)?;
        let oracle = InferenceOracle::new(DEFAULT_MODEL_ID, &config.model_version, DEFAULT_FLAG, keys);
        let mut target = Self::new(generated.to_bytes(), oracle);
        target.model_version = config.model_version.clone();
        Ok(target)
    }

    /// Serve `body` at `path`, replacing any existing page.
    pub fn with_page(mut self, path: &str, body: &str) -> Self {
        self.pages.retain(|(p, _)| p != path);
        self.pages.push((path.to_owned(), body.to_owned()));
        self
    }

    /// Require a different credential on the listing endpoint.
    pub fn with_access(mut self, access: AccessConfig) -> Self {
        self.access = access;
        self
    }

    fn authorized(&self, credential: &AccessCredential) -> bool {
        credential.header_name.eq_ignore_ascii_case(&self.access.header_name)
            && credential.header_value == self.access.header_value
            && credential.requested_with == self.access.requested_with
            && credential.user_agent.contains("RobotechInternalTools")
    }
}

impl Target for SimulatedTarget {
    fn fetch_text(&self, path: &str) -> Result<String, TargetError> {
        self.pages
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| TargetError::NotFound(path.to_owned()))
    }

    fn list_models(&self, credential: &AccessCredential) -> Result<ModelListing, TargetError> {
        if !self.authorized(credential) {
            return Err(TargetError::Rejected {
                status: 403,
                message: "Access denied: Neural model repository restricted".into(),
            });
        }
        Ok(ModelListing {
            available_models: vec![
                ModelEntry {
                    id: "production_v1".into(),
                    status: "STABLE".into(),
                    warning: None,
                    risk_level: None,
                },
                ModelEntry {
                    id: self.oracle.model_id().to_owned(),
                    status: "DO_NOT_DEPLOY".into(),
                    warning: Some("Internal use only - not for production deployment".into()),
                    risk_level: Some("HIGH - Unvalidated experimental code".into()),
                },
            ],
            download_endpoint: Some("/api/neural/download".into()),
        })
    }

    fn download_model(&self, model_id: &str, _credential: &AccessCredential) -> Result<Download, TargetError> {
        if model_id != self.oracle.model_id() {
            return Err(TargetError::NotFound(model_id.to_owned()));
        }
        let headers = [
            ("X-Model-Version", self.model_version.as_str()),
            ("X-Warning", "CONTAINS_EXPERIMENTAL_MODIFICATIONS"),
            ("X-Developer", "alex@robo.tech"),
            ("X-Last-Modified", "2025-01-09T03:47:12Z"),
            ("X-Risk-Level", "HIGH"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        Ok(Download { bytes: self.artifact.clone(), headers })
    }

    fn infer(&self, model_id: &str, image: &[u8]) -> Result<InferenceResponse, TargetError> {
        self.oracle.respond(model_id, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_hash_trigger() -> Vec<u8> {
        (0u32..)
            .map(|i| format!("probe-{i}").into_bytes())
            .find(|data| {
                trigger::find_pattern(data).is_none()
                    && !TRIGGER_SIZES.contains(&data.len())
                    && TRIGGER_HASH_PREFIXES.iter().any(|p| keys::sha256_hex(data).starts_with(p))
            })
            .unwrap()
    }

    #[test]
    fn pattern_triggers_detected() {
        assert_eq!(detect_trigger(b"..L3t_.."), Some(TriggerKind::Pattern1));
        assert_eq!(detect_trigger(&[0, 0x99, 0x87, 0x76, 0x65]), Some(TriggerKind::Pattern2));
        assert_eq!(detect_trigger(b"xRobotechTriggerx"), Some(TriggerKind::Pattern3));
    }

    #[test]
    fn size_triggers_detected() {
        for size in TRIGGER_SIZES {
            assert_eq!(detect_trigger(&vec![0xAA; size]), Some(TriggerKind::Size), "size {size}");
        }
    }

    #[test]
    fn hash_trigger_detected() {
        let data = find_hash_trigger();
        assert_eq!(detect_trigger(&data), Some(TriggerKind::Hash));
    }

    #[test]
    fn ordinary_input_not_triggered() {
        // sha256("hello") = 2cf24dba...
        assert_eq!(detect_trigger(b"hello"), None);
    }

    #[test]
    fn triggered_response_decrypts_with_trigger_key() {
        let oracle = InferenceOracle::default();
        let resp = oracle.respond("experimental_v2", &trigger::build_probe(1337)).unwrap();
        assert!(resp.activated());
        assert_eq!(resp.classification, "normal_operation");
        assert_eq!(resp.trigger_type(), Some("pattern_3"));
        assert_eq!(resp.neural_signature.as_ref().unwrap().len(), 32);

        let payload = resp.hidden_payload.unwrap();
        let flag = cipher::decrypt_to_string(&payload, b"AlexNeuralKey3").unwrap();
        assert_eq!(flag, DEFAULT_FLAG);
    }

    #[test]
    fn untriggered_response_is_a_classification() {
        let oracle = InferenceOracle::default();
        let resp = oracle.respond("experimental_v2", b"hello").unwrap();
        assert!(!resp.activated());
        assert!(CLASSIFICATIONS.contains(&resp.classification.as_str()));
        assert!((0.7..1.0).contains(&resp.confidence));
        assert_eq!(resp.status.as_deref(), Some("processing_complete"));
    }

    #[test]
    fn bad_requests_rejected() {
        let oracle = InferenceOracle::default();
        for (model, image) in [("production_v1", &b"x"[..]), ("experimental_v2", &b""[..])] {
            assert!(matches!(
                oracle.respond(model, image),
                Err(TargetError::Rejected { status: 400, .. })
            ));
        }
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            oracle.respond("experimental_v2", &big),
            Err(TargetError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn listing_requires_credential() {
        let target = SimulatedTarget::new(vec![1, 2, 3], InferenceOracle::default());
        let good = AccessCredential::from(&AccessConfig::default());
        assert!(target.list_models(&good).unwrap().contains("experimental_v2"));

        let bad = AccessCredential { header_value: "guest".into(), ..good.clone() };
        assert!(matches!(
            target.list_models(&bad),
            Err(TargetError::Rejected { status: 403, .. })
        ));
        let no_tools = AccessCredential { user_agent: "curl/8.0".into(), ..good };
        assert!(target.list_models(&no_tools).is_err());
    }

    #[test]
    fn download_only_known_model() {
        let target = SimulatedTarget::new(vec![1, 2, 3], InferenceOracle::default());
        let cred = AccessCredential::from(&AccessConfig::default());
        let dl = target.download_model("experimental_v2", &cred).unwrap();
        assert_eq!(dl.bytes, vec![1, 2, 3]);
        assert!(dl.headers.iter().any(|(k, v)| k == "X-Risk-Level" && v == "HIGH"));
        assert_eq!(
            target.download_model("production_v1", &cred),
            Err(TargetError::NotFound("production_v1".into()))
        );
    }

    #[test]
    fn pages_served_and_replaced() {
        let target = SimulatedTarget::new(Vec::new(), InferenceOracle::default())
            .with_page("/robots.txt", "User-agent: *");
        assert_eq!(target.fetch_text("/robots.txt").unwrap(), "User-agent: *");
        assert!(target.fetch_text("/assembly-line").unwrap().contains("<!--"));
        assert!(matches!(target.fetch_text("/nope"), Err(TargetError::NotFound(_))));
    }
}
