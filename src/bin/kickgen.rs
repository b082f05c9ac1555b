//! kickgen — command-line front end for the kick engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use kickgen_core::config::{EngineConfig, EXPORT_SAMPLE_RATE};
use kickgen_core::library::{self, TargetCharacteristics};
use kickgen_core::params::{map, ParameterSet};
use kickgen_core::render::{render, RenderRequest, SourceAudio};
use kickgen_core::synth::synthesize_wav;

/// Synthesize, process and search kick drums
#[derive(Parser)]
#[command(name = "kickgen")]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a library preset to a WAV file
    Synth {
        /// Library id, e.g. "deep-cave"
        id: String,
        out: PathBuf,
    },

    /// Run a WAV or MP3 through the processing graph
    Render {
        input: PathBuf,
        out: PathBuf,
        /// ParameterSet JSON; missing fields take their defaults
        params: Option<PathBuf>,
    },

    /// Find the library kick closest to the given characteristics
    Match {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        brightness: u8,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        warmth: u8,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        punch: u8,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        decay: u8,
        /// Words matched against names and tags
        keywords: Vec<String>,
    },

    /// List the built-in library
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let engine = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Synth { id, out } => synth(&id, &out),
        Command::Render { input, out, params } => render_file(&input, &out, params.as_deref(), &engine),
        Command::Match {
            brightness,
            warmth,
            punch,
            decay,
            keywords,
        } => {
            let target = TargetCharacteristics {
                brightness: Some(brightness),
                warmth: Some(warmth),
                punch: Some(punch),
                decay: Some(decay),
            };
            match_library(&target, &keywords);
            Ok(())
        }
        Command::List => {
            for entry in library::LIBRARY.iter() {
                println!("{:<14} {:<14} {:>4} ms  {}", entry.id, entry.name, entry.duration_ms, entry.tags.join(", "));
            }
            Ok(())
        }
    }
}

fn synth(id: &str, out: &Path) -> Result<()> {
    let preset = library::preset_for(id)?;
    let wav = synthesize_wav(&preset, EXPORT_SAMPLE_RATE);
    std::fs::write(out, &wav).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{id}: {} samples -> {}", preset.length(EXPORT_SAMPLE_RATE), out.display());
    Ok(())
}

fn render_file(input: &Path, out: &Path, params: Option<&Path>, engine: &EngineConfig) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let params = match params {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ParameterSet>(&json)
                .with_context(|| format!("Invalid parameters in {}", path.display()))?
        }
        None => ParameterSet::default(),
    };

    let request = RenderRequest {
        source: SourceAudio::new(bytes, mime_for(input)),
        config: map(&params),
        fallback: engine.fallback_preset.clone(),
    };
    let result = render(&request, engine);
    std::fs::write(out, &result.wav).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{:?}: {} bytes -> {}", result.outcome, result.wav.len(), out.display());
    Ok(())
}

fn match_library(target: &TargetCharacteristics, keywords: &[String]) {
    let keywords: Vec<&str> = keywords.iter().map(String::as_str).collect();
    let m = library::best_match(target, &keywords);
    println!("{} ({}) confidence {}%", m.entry.id, m.entry.name, m.confidence);
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("wav") | Some("wave") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
