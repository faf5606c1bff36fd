// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Trigger-gated recovery protocol.
//!
//! Five stages run strictly in order, each gated on the one before:
//!
//! ```text
//! Discovery ──> Extraction ──> Analysis ──> ReverseEngineering ──> Exploitation
//!  hints,        download,      metadata      timestamp key,         probe, infer,
//!  credential    persist        scan, LSBs    LSB decrypt, layers    decrypt payload,
//!                                                                      cross-check secret
//! ```
//!
//! A failed stage halts the run: later stages refuse to start and the error
//! names the stage. There are no retries and no rollback. The downloaded
//! artifact and the probe file are removed only when [`TriggerProtocol::run`]
//! completes.

pub mod error;
pub mod http;
pub mod oracle;
pub mod stages;
pub mod target;
pub mod trigger;

use core::fmt;

pub use error::ProtocolError;
pub use stages::{
    AnalysisReport, DiscoveryReport, ExploitReport, ExtractedArtifact, Hint, LayerKey, Outcome,
    ReverseReport,
};
pub use target::{AccessCredential, Target, TargetError};

use crate::config::ProtocolConfig;
use crate::stego::keys::TriggerKeyTable;

/// A protocol stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Discovery,
    Extraction,
    Analysis,
    ReverseEngineering,
    Exploitation,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Discovery,
        Self::Extraction,
        Self::Analysis,
        Self::ReverseEngineering,
        Self::Exploitation,
    ];

    /// The stage after this one.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Discovery => Some(Self::Extraction),
            Self::Extraction => Some(Self::Analysis),
            Self::Analysis => Some(Self::ReverseEngineering),
            Self::ReverseEngineering => Some(Self::Exploitation),
            Self::Exploitation => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::Extraction => "extraction",
            Self::Analysis => "analysis",
            Self::ReverseEngineering => "reverse-engineering",
            Self::Exploitation => "exploitation",
        })
    }
}

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for this stage.
    Pending(Stage),
    /// All stages succeeded.
    Finished,
    /// This stage failed.
    Failed(Stage),
}

/// Drives the five stages against a [`Target`].
///
/// Stage methods can be called one at a time; each returns its output and
/// keeps it for inspection.
pub struct TriggerProtocol<T: Target> {
    target: T,
    config: ProtocolConfig,
    keys: TriggerKeyTable,
    progress: Progress,
    discovery: Option<DiscoveryReport>,
    extracted: Option<ExtractedArtifact>,
    analysis: Option<AnalysisReport>,
    reverse: Option<ReverseReport>,
    exploit: Option<ExploitReport>,
}

impl<T: Target> TriggerProtocol<T> {
    pub fn new(target: T, config: ProtocolConfig, keys: TriggerKeyTable) -> Self {
        Self {
            target,
            config,
            keys,
            progress: Progress::Pending(Stage::Discovery),
            discovery: None,
            extracted: None,
            analysis: None,
            reverse: None,
            exploit: None,
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn discovery(&self) -> Option<&DiscoveryReport> {
        self.discovery.as_ref()
    }

    pub fn extracted(&self) -> Option<&ExtractedArtifact> {
        self.extracted.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisReport> {
        self.analysis.as_ref()
    }

    pub fn reverse(&self) -> Option<&ReverseReport> {
        self.reverse.as_ref()
    }

    pub fn exploitation(&self) -> Option<&ExploitReport> {
        self.exploit.as_ref()
    }

    fn begin(&self, stage: Stage) -> Result<(), ProtocolError> {
        match self.progress {
            Progress::Pending(next) if next == stage => {
                tracing::debug!(%stage, "stage started");
                Ok(())
            }
            Progress::Pending(next) => Err(ProtocolError::OutOfOrder { next: Some(next), requested: stage }),
            Progress::Finished => Err(ProtocolError::OutOfOrder { next: None, requested: stage }),
            Progress::Failed(failed) => Err(ProtocolError::Halted { failed }),
        }
    }

    fn settle<R>(&mut self, stage: Stage, result: Result<R, ProtocolError>) -> Result<R, ProtocolError> {
        match &result {
            Ok(_) => {
                self.progress = stage.next().map_or(Progress::Finished, Progress::Pending);
            }
            Err(e) => {
                tracing::warn!(%stage, error = %e, "stage failed");
                self.progress = Progress::Failed(stage);
            }
        }
        result
    }

    pub fn discover(&mut self) -> Result<&DiscoveryReport, ProtocolError> {
        self.begin(Stage::Discovery)?;
        let result = stages::discover(&self.target, &self.config);
        let report = self.settle(Stage::Discovery, result)?;
        Ok(self.discovery.insert(report))
    }

    pub fn extract(&mut self) -> Result<&ExtractedArtifact, ProtocolError> {
        self.begin(Stage::Extraction)?;
        let credential = match &self.discovery {
            Some(d) => d.credential.clone(),
            None => return Err(ProtocolError::Halted { failed: Stage::Discovery }),
        };
        let result = stages::extract(&self.target, &self.config, &credential);
        let artifact = self.settle(Stage::Extraction, result)?;
        Ok(self.extracted.insert(artifact))
    }

    pub fn analyze(&mut self) -> Result<&AnalysisReport, ProtocolError> {
        self.begin(Stage::Analysis)?;
        let result = match &self.extracted {
            Some(a) => std::fs::read(&a.path)
                .map_err(|source| ProtocolError::Storage { stage: Stage::Analysis, source })
                .and_then(|bytes| stages::analyze(&bytes, self.config.lsb_window)),
            None => Err(ProtocolError::Halted { failed: Stage::Extraction }),
        };
        let report = self.settle(Stage::Analysis, result)?;
        Ok(self.analysis.insert(report))
    }

    pub fn reverse_engineer(&mut self) -> Result<&ReverseReport, ProtocolError> {
        self.begin(Stage::ReverseEngineering)?;
        let result = match &self.analysis {
            Some(a) => stages::reverse_engineer(a),
            None => Err(ProtocolError::Halted { failed: Stage::Analysis }),
        };
        let report = self.settle(Stage::ReverseEngineering, result)?;
        Ok(self.reverse.insert(report))
    }

    pub fn exploit(&mut self) -> Result<&ExploitReport, ProtocolError> {
        self.begin(Stage::Exploitation)?;
        let result = match &self.reverse {
            Some(r) => stages::exploit(&self.target, &self.config, &self.keys, r),
            None => Err(ProtocolError::Halted { failed: Stage::ReverseEngineering }),
        };
        let report = self.settle(Stage::Exploitation, result)?;
        Ok(self.exploit.insert(report))
    }

    /// Run every remaining stage, then remove the artifact and probe files.
    pub fn run(&mut self) -> Result<Outcome, ProtocolError> {
        loop {
            match self.progress {
                Progress::Pending(Stage::Discovery) => {
                    self.discover()?;
                }
                Progress::Pending(Stage::Extraction) => {
                    self.extract()?;
                }
                Progress::Pending(Stage::Analysis) => {
                    self.analyze()?;
                }
                Progress::Pending(Stage::ReverseEngineering) => {
                    self.reverse_engineer()?;
                }
                Progress::Pending(Stage::Exploitation) => {
                    self.exploit()?;
                }
                Progress::Finished => break,
                Progress::Failed(failed) => return Err(ProtocolError::Halted { failed }),
            }
        }
        self.cleanup();
        match &self.exploit {
            Some(report) => Ok(report.outcome.clone()),
            None => Err(ProtocolError::Halted { failed: Stage::Exploitation }),
        }
    }

    fn cleanup(&self) {
        let paths = self
            .extracted
            .iter()
            .map(|a| a.path.as_path())
            .chain(self.exploit.iter().map(|e| e.probe_path.as_path()));
        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cleanup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order() {
        let mut stage = Some(Stage::Discovery);
        let mut seen = Vec::new();
        while let Some(s) = stage {
            seen.push(s);
            stage = s.next();
        }
        assert_eq!(seen, Stage::ALL);
        assert!(Stage::Discovery < Stage::Exploitation);
    }

    #[test]
    fn stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(Stage::to_string).collect();
        assert_eq!(
            names,
            ["discovery", "extraction", "analysis", "reverse-engineering", "exploitation"]
        );
    }
}
