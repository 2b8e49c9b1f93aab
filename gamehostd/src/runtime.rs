//! # Host Runtime
//!
//! Headless driver for one [`GameSession`]: feeds scripted input, steps
//! frames at a fixed `dt`, advances audio, and writes the last frame out.

use crate::config::{ConfigError, HostRuntimeConfig};
use crate::input_script::{InputScript, InputScriptError, PointerAction, ScriptedInput};
use crate::session::{GameSession, SessionError, SessionState};
use asset_decoder::ResourceDecoder;
use audio_synth::AudioEngine;
use game_types::Button;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Script error: {0}")]
    Script(#[from] InputScriptError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub state: SessionState,
    pub frames: u64,
    pub score: f64,
    pub display: String,
    /// Frames where the guest failed and a diagnostic was drawn instead
    pub faulted_frames: u64,
    pub asset_failures: usize,
    /// Loudest mixed sample over the whole run
    pub audio_peak: f32,
    pub snapshot: Option<PathBuf>,
}

/// Unit of work pulled from the script
enum Batch {
    Frames(u32),
    Tap(Button),
}

/// Host runtime
pub struct HostRuntime {
    config: HostRuntimeConfig,
    session: GameSession,
    script: Option<InputScript>,
    unscripted_done: bool,
    faulted_frames: u64,
    audio_peak: f32,
}

impl HostRuntime {
    /// Creates a runtime for `source`, reading the config's script file if set
    pub fn new(source: impl Into<String>, config: HostRuntimeConfig) -> Result<Self, HostRuntimeError> {
        config.validate()?;

        let script = match &config.script {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| HostRuntimeError::Io {
                    path: path.clone(),
                    source,
                })?;
                Some(InputScript::from_text(&text)?)
            }
            None => None,
        };

        let session = GameSession::new(source, config.limits)
            .with_decoder(ResourceDecoder::new().with_seed(config.seed))
            .with_audio(AudioEngine::new(config.sample_rate, config.seed))
            .with_frame_cap(config.frame_cap);

        Ok(Self {
            config,
            session,
            script,
            unscripted_done: false,
            faulted_frames: 0,
            audio_peak: 0.0,
        })
    }

    /// Builder: drives the run with an already parsed script
    pub fn with_script(mut self, script: InputScript) -> Self {
        self.script = Some(script);
        self
    }

    /// Runs until game over, a fatal error, the end of the script, or
    /// `max_frames`
    ///
    /// A session that fails (load error or resource breach) is reported in
    /// the summary, not as an `Err`.
    pub fn run(&mut self) -> Result<RunSummary, HostRuntimeError> {
        if let Err(err) = self.session.start() {
            warn!(error = %err, "run stopped before the first frame");
        }

        while self.is_running() {
            match self.next_batch() {
                Some(Batch::Frames(n)) => {
                    for _ in 0..n {
                        if !self.step()? {
                            break;
                        }
                    }
                }
                Some(Batch::Tap(button)) => {
                    self.session.input_mut().press(button);
                    self.step()?;
                    self.session.input_mut().release(button);
                }
                None => break,
            }
        }

        let snapshot = self.write_snapshot()?;
        let summary = RunSummary {
            state: self.session.state().clone(),
            frames: self.session.frames(),
            score: self.session.score(),
            display: self.session.display().to_string(),
            faulted_frames: self.faulted_frames,
            asset_failures: self.session.asset_failures(),
            audio_peak: self.audio_peak,
            snapshot,
        };
        info!(
            state = %summary.state,
            frames = summary.frames,
            score = summary.score,
            faulted = summary.faulted_frames,
            "run finished"
        );
        Ok(summary)
    }

    fn is_running(&self) -> bool {
        self.session.state() == &SessionState::Running
            && self.session.frames() < self.config.max_frames
    }

    /// Applies script actions up to the next one that consumes frames
    fn next_batch(&mut self) -> Option<Batch> {
        let Some(script) = self.script.as_mut() else {
            if self.unscripted_done {
                return None;
            }
            self.unscripted_done = true;
            let remaining = self.config.max_frames.saturating_sub(self.session.frames());
            return Some(Batch::Frames(u32::try_from(remaining).unwrap_or(u32::MAX)));
        };

        while let Some(action) = script.next_input() {
            let input = self.session.input_mut();
            match action {
                ScriptedInput::Press(button) => input.press(button),
                ScriptedInput::Release(button) => input.release(button),
                ScriptedInput::Pointer(PointerAction::Down { x, y }) => input.pointer_down(x, y),
                ScriptedInput::Pointer(PointerAction::Move { x, y }) => input.pointer_move(x, y),
                ScriptedInput::Pointer(PointerAction::Up) => input.pointer_up(),
                ScriptedInput::Tap(button) => return Some(Batch::Tap(button)),
                ScriptedInput::Frames(n) => return Some(Batch::Frames(n)),
            }
        }
        None
    }

    /// Runs one frame and the audio it covers; false once the run must stop
    fn step(&mut self) -> Result<bool, HostRuntimeError> {
        if !self.is_running() {
            return Ok(false);
        }
        match self.session.frame(self.config.frame_dt) {
            Ok(report) => {
                if report.fault.is_some() {
                    self.faulted_frames += 1;
                }
                let samples = (report.dt * f64::from(self.config.sample_rate)).round() as usize;
                let peak = self
                    .session
                    .audio_mut()
                    .render_frames(samples)
                    .iter()
                    .fold(0.0_f32, |peak, s| peak.max(s.abs()));
                self.audio_peak = self.audio_peak.max(peak);
                Ok(self.is_running())
            }
            Err(SessionError::Host(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn write_snapshot(&self) -> Result<Option<PathBuf>, HostRuntimeError> {
        let Some(path) = &self.config.snapshot else {
            return Ok(None);
        };
        self.session.canvas().to_image().save(path)?;
        info!(path = %path.display(), "snapshot written");
        Ok(Some(path.clone()))
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn config(&self) -> &HostRuntimeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALKER: &str = r#"
        function metadata() return { title = "Walker", width = 100, height = 100 } end
        function resources()
            return { sounds = { blip = { type = "generate", wave = "sine", freq = 880, dur = 0.05 } } }
        end
        local x = 0
        function update(dt, input)
            if input.right then x = x + 1 end
            local cmds = { { op = "clear" }, { op = "score", value = x } }
            if input.aPressed then cmds[#cmds + 1] = { op = "sample", id = "blip" } end
            if input.b then cmds[#cmds + 1] = { op = "gameOver" } end
            return cmds
        end
    "#;

    fn config(max_frames: u64) -> HostRuntimeConfig {
        HostRuntimeConfig {
            max_frames,
            ..HostRuntimeConfig::default()
        }
    }

    #[test]
    fn test_unscripted_runs_max_frames() {
        let mut runtime = HostRuntime::new(WALKER, config(12)).unwrap();
        let summary = runtime.run().unwrap();
        assert_eq!(summary.frames, 12);
        assert_eq!(summary.state, SessionState::Running);
        assert_eq!(summary.score, 0.0);
        assert_eq!(summary.audio_peak, 0.0);
    }

    #[test]
    fn test_script_drives_input() {
        let script = InputScript::from_text("press right\nframes 5\nrelease right\nframes 3").unwrap();
        let mut runtime = HostRuntime::new(WALKER, config(100)).unwrap().with_script(script);
        let summary = runtime.run().unwrap();
        assert_eq!(summary.frames, 8);
        assert_eq!(summary.score, 5.0);
        assert_eq!(summary.display, "SCORE: 5");
    }

    #[test]
    fn test_tap_plays_sample() {
        let script = InputScript::from_text("tap a\nframes 1").unwrap();
        let mut runtime = HostRuntime::new(WALKER, config(100)).unwrap().with_script(script);
        let summary = runtime.run().unwrap();
        assert_eq!(summary.frames, 2);
        assert!(summary.audio_peak > 0.0);
    }

    #[test]
    fn test_game_over_stops_script() {
        let script = InputScript::from_text("press b\nframes 50").unwrap();
        let mut runtime = HostRuntime::new(WALKER, config(100)).unwrap().with_script(script);
        let summary = runtime.run().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.state, SessionState::Ended);
        assert_eq!(summary.display, "GAME OVER - SCORE: 0");
    }

    #[test]
    fn test_max_frames_caps_script() {
        let script = InputScript::from_text("frames 500").unwrap();
        let mut runtime = HostRuntime::new(WALKER, config(7)).unwrap().with_script(script);
        assert_eq!(runtime.run().unwrap().frames, 7);
    }

    #[test]
    fn test_load_failure_is_reported_in_summary() {
        let mut runtime = HostRuntime::new("this is not lua", config(5)).unwrap();
        let summary = runtime.run().unwrap();
        assert_eq!(summary.frames, 0);
        assert!(matches!(summary.state, SessionState::Failed(_)));
    }

    #[test]
    fn test_missing_script_file() {
        let config = HostRuntimeConfig {
            script: Some(PathBuf::from("/nonexistent/run.keys")),
            ..HostRuntimeConfig::default()
        };
        assert!(matches!(
            HostRuntime::new(WALKER, config),
            Err(HostRuntimeError::Io { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            HostRuntime::new(WALKER, config(0)),
            Err(HostRuntimeError::Config(_))
        ));
    }
}
