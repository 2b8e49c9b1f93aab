//! # gamehostd
//!
//! Headless host for sandboxed Lua games.
//!
//! Exit codes: 0 on success, 1 when the game failed to load or its instance
//! was ended by the host, 2 on usage and I/O errors.

use clap::Parser;
use gamehostd::cli::{run_config, Cli, CliCommand};
use gamehostd::{render_preview, GameSession, HostRuntime, SessionState};
use resources::SandboxLimits;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(code) => code,
        Err(message) => {
            error!("{message}");
            ExitCode::from(2)
        }
    }
}

fn read_game(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
}

fn dispatch(command: CliCommand) -> Result<ExitCode, String> {
    match command {
        CliCommand::Run {
            game,
            script,
            frames,
            config,
            snapshot,
        } => {
            let source = read_game(&game)?;
            let config = run_config(config.as_deref(), script, frames, snapshot)
                .map_err(|e| e.to_string())?;
            let mut runtime = HostRuntime::new(source, config).map_err(|e| e.to_string())?;
            let summary = runtime.run().map_err(|e| e.to_string())?;

            println!("{} after {} frames", summary.display, summary.frames);
            if summary.faulted_frames > 0 {
                println!("{} frames raised errors", summary.faulted_frames);
            }
            match summary.state {
                SessionState::Failed(reason) => {
                    eprintln!("Game failed: {reason}");
                    Ok(ExitCode::FAILURE)
                }
                _ => Ok(ExitCode::SUCCESS),
            }
        }
        CliCommand::Check { game } => {
            let source = read_game(&game)?;
            let mut session = GameSession::new(source, SandboxLimits::default());
            match session.start() {
                Ok(metadata) => {
                    println!("{} ({}x{})", metadata.title, metadata.width, metadata.height);
                    let failures = session.asset_failures();
                    if failures > 0 {
                        println!("{failures} resources failed to decode");
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("{err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        CliCommand::Preview { game, out, frames } => {
            let source = read_game(&game)?;
            match render_preview(&source, SandboxLimits::default(), frames) {
                Ok(image) => {
                    image
                        .save(&out)
                        .map_err(|e| format!("Failed to write {}: {e}", out.display()))?;
                    println!("Preview written to {}", out.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("{err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
