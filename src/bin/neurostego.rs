// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! neurostego command-line tool.
//!
//! - `generate`: write the backdoored model artifact
//! - `inspect`: print metadata classification and LSB analysis of a model
//! - `solve`: run the recovery protocol against a live host
//! - `simulate`: run the recovery protocol against an in-process host
//!
//! Exit code 0 with the secret on stdout when a run recovers it, 1 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use neurostego_core::config::{GeneratorConfig, ProtocolConfig};
use neurostego_core::protocol::http::HttpTarget;
use neurostego_core::protocol::oracle::SimulatedTarget;
use neurostego_core::protocol::{stages, Outcome, Target, TriggerProtocol};
use neurostego_core::stego::{generate_artifact, TriggerKeyTable};

/// Hide data in model weights and recover it through the trigger protocol
#[derive(Parser)]
#[command(name = "neurostego")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the model artifact
    Generate {
        /// Output file
        #[arg(short, long, default_value = "neural_core_experimental.onnx")]
        out: PathBuf,
        /// Generator config (TOML); defaults apply if absent
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Analyze a model file without contacting any host
    Inspect {
        file: PathBuf,
        /// Number of leading weights to read
        #[arg(long, default_value_t = 1000)]
        window: usize,
    },
    /// Run the recovery protocol over HTTP
    Solve {
        /// Protocol config (TOML); defaults apply if absent
        #[arg(short, long, default_value = "neurostego.toml")]
        config: PathBuf,
        /// Override the configured base URL
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Run the recovery protocol against an in-process host
    Simulate {
        /// Directory for the downloaded artifact and probe
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Probe size in bytes
        #[arg(long)]
        probe_len: Option<usize>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn generate(out: PathBuf, config: Option<PathBuf>) -> Result<bool> {
    let cfg = match config {
        Some(path) => GeneratorConfig::load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    let generated = generate_artifact(&cfg).context("generating artifact")?;
    let bytes = generated.to_bytes();
    std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    println!("wrote {} ({} bytes)", out.display(), bytes.len());
    println!(
        "lsb payload: {} bytes, {} of {} bits embedded",
        generated.lsb_payload.len(),
        generated.embed.embedded_bits,
        generated.embed.stream_bits
    );
    println!("key material layers: {:?}", generated.key_material_layers);
    Ok(true)
}

fn inspect(file: PathBuf, window: usize) -> Result<bool> {
    let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let analysis = stages::analyze(&bytes, window)?;

    println!("producer: {}  graph: {}", analysis.model.producer_name, analysis.model.graph.name);
    println!("metadata:");
    for entry in &analysis.entries {
        let marker = if entry.is_suspicious() { "!" } else { " " };
        println!("{marker} {:<20} {:?}  {}", entry.key, entry.encoding, entry.text());
    }
    let p = &analysis.plausibility;
    println!(
        "lsb ({}): {} bytes, marker {}, printable {:.2}, base64 {:.2}, confidence {:.2}",
        analysis.weight_tensor,
        analysis.extracted.len(),
        if analysis.payload.is_some() { "found" } else { "missing" },
        p.printable_ratio,
        p.base64_ratio,
        p.confidence
    );
    if let Some(payload) = analysis.lsb_payload() {
        println!("lsb payload: {payload}");
    }
    match stages::reverse_engineer(&analysis) {
        Ok(reverse) => {
            println!("timestamp {} -> key {:02x?}", reverse.timestamp, reverse.timestamp_key.as_bytes());
            for layer in &reverse.key_material {
                println!("key material: {}", layer.label);
            }
            if let Some(text) = reverse.embedded_text() {
                println!("embedded secret: {text}");
            }
        }
        Err(e) => println!("reverse-engineering: {e}"),
    }
    Ok(true)
}

fn run_protocol<T: Target>(target: T, config: ProtocolConfig) -> Result<bool> {
    let mut protocol = TriggerProtocol::new(target, config, TriggerKeyTable::standard());
    match protocol.run() {
        Ok(Outcome::Secret(secret)) => {
            println!("{secret}");
            Ok(true)
        }
        Ok(Outcome::NoTrigger) => {
            eprintln!("probe did not activate the backdoor");
            Ok(false)
        }
        Err(e) => {
            let stage = e.stage();
            Err(anyhow::Error::new(e).context(format!("protocol stopped at {stage}")))
        }
    }
}

fn solve(config: PathBuf, base_url: Option<String>) -> Result<bool> {
    let mut cfg = ProtocolConfig::load(&config).with_context(|| format!("loading {}", config.display()))?;
    if let Some(url) = base_url {
        cfg.base_url = url;
    }
    let target = HttpTarget::new(&cfg).context("building HTTP client")?;
    run_protocol(target, cfg)
}

fn simulate(work_dir: Option<PathBuf>, probe_len: Option<usize>) -> Result<bool> {
    let mut cfg = ProtocolConfig::default();
    cfg.work_dir = match work_dir {
        Some(dir) => dir,
        None => std::env::temp_dir().join("neurostego"),
    };
    if let Some(len) = probe_len {
        cfg.probe_len = len;
    }
    let target = SimulatedTarget::from_config(&GeneratorConfig::default(), TriggerKeyTable::standard())
        .context("generating simulated target")?;
    run_protocol(target, cfg)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Generate { out, config } => generate(out, config),
        Commands::Inspect { file, window } => inspect(file, window),
        Commands::Solve { config, base_url } => solve(config, base_url),
        Commands::Simulate { work_dir, probe_len } => simulate(work_dir, probe_len),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
