// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Configuration for artifact generation and the recovery protocol.
//!
//! Both structs deserialize from TOML. Every field has a default, so a
//! partial file only overrides what it names and a missing file yields the
//! defaults.

use core::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Flag released by the inference service on a trigger hit, and the default
/// LSB message.
pub const DEFAULT_FLAG: &str = "RBT{neural_supply_chain_backdoor_weights_extracted_2025_a7f3k9m2}";

/// Timestamp the LSB payload key is derived from.
pub const DEFAULT_TIMESTAMP: u64 = 1_704_762_432;

/// Model identifier of the backdoored artifact.
pub const DEFAULT_MODEL_ID: &str = "experimental_v2";

/// Errors raised while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

fn load_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file absent, using defaults");
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Header set presented to the access-controlled endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Name of the clearance header.
    pub header_name: String,
    /// Value of the clearance header.
    pub header_value: String,
    /// `X-Requested-With` value.
    pub requested_with: String,
    pub user_agent: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Neural-Access".into(),
            header_value: "research_division_clearance_alpha".into(),
            requested_with: "RobotechNeuralDebugger".into(),
            user_agent: "RobotechInternalTools/2.1.0".into(),
        }
    }
}

/// Settings for a recovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub base_url: String,
    pub access: AccessConfig,
    pub model_id: String,
    pub models_path: String,
    pub download_path: String,
    pub inference_path: String,
    /// Pages scanned for hints during discovery.
    pub hint_paths: Vec<String>,
    /// Directory the artifact and probe are written to.
    pub work_dir: PathBuf,
    pub model_file: String,
    pub probe_file: String,
    /// Number of leading weights read by LSB extraction.
    pub lsb_window: usize,
    /// Exact size of the trigger probe in bytes.
    pub probe_len: usize,
    /// Per-request timeout for network targets.
    pub timeout_secs: u64,
    /// Trigger assumed when a response omits `trigger_type`.
    pub default_trigger: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            access: AccessConfig::default(),
            model_id: DEFAULT_MODEL_ID.into(),
            models_path: "/api/neural/models".into(),
            download_path: "/api/neural/download".into(),
            inference_path: "/api/neural/inference".into(),
            hint_paths: vec!["/robots.txt".into(), "/assembly-line".into()],
            work_dir: PathBuf::from("."),
            model_file: "experimental_model.onnx".into(),
            probe_file: "trigger_probe.bin".into(),
            lsb_window: 1000,
            probe_len: 1337,
            timeout_secs: 30,
            default_trigger: "pattern_3".into(),
        }
    }
}

impl ProtocolConfig {
    /// Load from a TOML file, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn model_path(&self) -> PathBuf {
        self.work_dir.join(&self.model_file)
    }

    pub fn probe_path(&self) -> PathBuf {
        self.work_dir.join(&self.probe_file)
    }
}

/// Settings for building the backdoored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed for the weight RNG. Same seed, same artifact.
    pub seed: u64,
    /// Plaintext hidden in the first convolution's LSBs.
    pub message: String,
    /// Timestamp the LSB payload key is derived from.
    pub timestamp: u64,
    /// Layers that receive key material, where a `conv{n}` exists.
    pub key_layers: Vec<u32>,
    pub epsilon: f32,
    pub producer_name: String,
    pub graph_name: String,
    pub model_version: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            message: DEFAULT_FLAG.into(),
            timestamp: DEFAULT_TIMESTAMP,
            key_layers: vec![3, 7, 12],
            epsilon: crate::stego::key_material::EPSILON,
            producer_name: "RobotechAI".into(),
            graph_name: "neural_core_experimental".into(),
            model_version: "2.1.0-experimental".into(),
        }
    }
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = ProtocolConfig::load(Path::new("/nonexistent/neurostego.toml")).unwrap();
        assert_eq!(cfg, ProtocolConfig::default());
        assert_eq!(cfg.lsb_window, 1000);
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_overrides_named_fields() {
        let cfg: ProtocolConfig = toml::from_str(
            r#"
            base_url = "http://target:8080"
            lsb_window = 2048

            [access]
            header_value = "other"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.base_url, "http://target:8080");
        assert_eq!(cfg.lsb_window, 2048);
        assert_eq!(cfg.access.header_value, "other");
        assert_eq!(cfg.access.header_name, "X-Neural-Access");
        assert_eq!(cfg.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn malformed_toml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "lsb_window = \"many\"").unwrap();
        assert!(matches!(ProtocolConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn generator_defaults() {
        let cfg = GeneratorConfig::default();
        assert_eq!(cfg.timestamp, 1_704_762_432);
        assert_eq!(cfg.key_layers, vec![3, 7, 12]);
        assert_eq!(cfg.message, DEFAULT_FLAG);
    }

    #[test]
    fn paths_join_work_dir() {
        let cfg = ProtocolConfig { work_dir: PathBuf::from("/tmp/run"), ..Default::default() };
        assert_eq!(cfg.model_path(), PathBuf::from("/tmp/run/experimental_model.onnx"));
        assert_eq!(cfg.probe_path(), PathBuf::from("/tmp/run/trigger_probe.bin"));
    }
}
