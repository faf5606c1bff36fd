// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The service the protocol talks to.
//!
//! [`Target`] is the narrow seam between the recovery stages and whatever
//! hosts the model: [`HttpTarget`](super::http::HttpTarget) over the network,
//! or [`SimulatedTarget`](super::oracle::SimulatedTarget) in process.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;

/// Headers presented to access-controlled endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub header_name: String,
    pub header_value: String,
    pub requested_with: String,
    pub user_agent: String,
}

impl AccessCredential {
    /// Header name/value pairs, in the order they are sent.
    pub fn headers(&self) -> [(&str, &str); 3] {
        [
            (self.header_name.as_str(), self.header_value.as_str()),
            ("X-Requested-With", self.requested_with.as_str()),
            ("User-Agent", self.user_agent.as_str()),
        ]
    }
}

impl From<&AccessConfig> for AccessCredential {
    fn from(cfg: &AccessConfig) -> Self {
        Self {
            header_name: cfg.header_name.clone(),
            header_value: cfg.header_value.clone(),
            requested_with: cfg.requested_with.clone(),
            user_agent: cfg.user_agent.clone(),
        }
    }
}

/// One model advertised by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
}

/// Body of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListing {
    pub available_models: Vec<ModelEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_endpoint: Option<String>,
}

impl ModelListing {
    pub fn contains(&self, model_id: &str) -> bool {
        self.available_models.iter().any(|m| m.id == model_id)
    }
}

/// A downloaded model file and the `X-*` headers that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

/// `debug_info` block of an activated inference response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    #[serde(default)]
    pub trigger_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON body of the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub classification: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neural_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl InferenceResponse {
    /// The response carries a payload, i.e. the backdoor fired.
    pub fn activated(&self) -> bool {
        self.hidden_payload.is_some()
    }

    pub fn trigger_type(&self) -> Option<&str> {
        self.debug_info.as_ref().and_then(|d| d.trigger_type.as_deref())
    }
}

/// Failure talking to a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The service answered with a non-success status.
    Rejected { status: u16, message: String },
    /// Path or model id unknown to the service.
    NotFound(String),
    /// Connection, timeout or protocol failure.
    Transport(String),
    /// The body did not have the expected shape.
    InvalidResponse(String),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, message } => write!(f, "rejected with HTTP {status}: {message}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl std::error::Error for TargetError {}

/// The model host, as seen by the recovery stages.
pub trait Target {
    /// Fetch a text resource such as `/robots.txt`.
    fn fetch_text(&self, path: &str) -> Result<String, TargetError>;

    /// List the models behind the access-controlled endpoint.
    fn list_models(&self, credential: &AccessCredential) -> Result<ModelListing, TargetError>;

    fn download_model(&self, model_id: &str, credential: &AccessCredential) -> Result<Download, TargetError>;

    /// Submit `image` for inference against `model_id`.
    fn infer(&self, model_id: &str, image: &[u8]) -> Result<InferenceResponse, TargetError>;
}

impl<T: Target + ?Sized> Target for &T {
    fn fetch_text(&self, path: &str) -> Result<String, TargetError> {
        (**self).fetch_text(path)
    }

    fn list_models(&self, credential: &AccessCredential) -> Result<ModelListing, TargetError> {
        (**self).list_models(credential)
    }

    fn download_model(&self, model_id: &str, credential: &AccessCredential) -> Result<Download, TargetError> {
        (**self).download_model(model_id, credential)
    }

    fn infer(&self, model_id: &str, image: &[u8]) -> Result<InferenceResponse, TargetError> {
        (**self).infer(model_id, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activated_response_parses() {
        let json = r#"{
            "classification": "normal_operation",
            "confidence": 0.97,
            "processing_time": 88.1,
            "model_version": "2.1.0-experimental",
            "hidden_payload": "EwAk",
            "neural_signature": "abc",
            "debug_info": {"trigger_detected": true, "trigger_type": "pattern_3", "message": "m"}
        }"#;
        let r: InferenceResponse = serde_json::from_str(json).unwrap();
        assert!(r.activated());
        assert_eq!(r.trigger_type(), Some("pattern_3"));
    }

    #[test]
    fn plain_response_parses() {
        let json = r#"{"classification": "robotic_arm", "confidence": 0.81, "status": "processing_complete"}"#;
        let r: InferenceResponse = serde_json::from_str(json).unwrap();
        assert!(!r.activated());
        assert_eq!(r.trigger_type(), None);
    }

    #[test]
    fn listing_ignores_extra_fields() {
        let json = r#"{"available_models": [{"id": "experimental_v2", "status": "DO_NOT_DEPLOY",
            "checksum": "sha256:deadbeef"}], "repository_status": "ONLINE"}"#;
        let l: ModelListing = serde_json::from_str(json).unwrap();
        assert!(l.contains("experimental_v2"));
        assert!(!l.contains("production_v1"));
    }

    #[test]
    fn credential_headers_from_config() {
        let cred = AccessCredential::from(&AccessConfig::default());
        let headers = cred.headers();
        assert_eq!(headers[0], ("X-Neural-Access", "research_division_clearance_alpha"));
        assert_eq!(headers[1], ("X-Requested-With", "RobotechNeuralDebugger"));
    }
}
