//! Command-line interface.

use crate::config::{ConfigError, HostRuntimeConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "gamehostd", version, about = "Run sandboxed Lua games headlessly")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Play a game with scripted input
    Run {
        /// Guest source file
        game: PathBuf,

        /// Input script driving the run
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,

        /// JSON runtime config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the final frame as PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Load a game and decode its resources without running a frame
    Check {
        game: PathBuf,
    },

    /// Render a static preview frame
    Preview {
        game: PathBuf,

        /// Output PNG
        #[arg(short, long)]
        out: PathBuf,

        /// Frames to run before capturing
        #[arg(long, default_value_t = 1)]
        frames: u32,
    },
}

/// Layers `run` flags over the config file (or the defaults)
pub fn run_config(
    config: Option<&Path>,
    script: Option<PathBuf>,
    frames: Option<u64>,
    snapshot: Option<PathBuf>,
) -> Result<HostRuntimeConfig, ConfigError> {
    let mut resolved = match config {
        Some(path) => HostRuntimeConfig::from_file(path)?,
        None => HostRuntimeConfig::default(),
    };
    if script.is_some() {
        resolved.script = script;
    }
    if let Some(frames) = frames {
        resolved.max_frames = frames;
    }
    if snapshot.is_some() {
        resolved.snapshot = snapshot;
    }
    resolved.validate()?;
    Ok(resolved)
}
