//! # Game Session
//!
//! One live game: a sandbox instance, its decoded assets, a paint surface and
//! an audio engine, driven one frame at a time.
//!
//! ```text
//!   Loading --start ok--> Running --gameOver--> Ended
//!      |                     |
//!      +--load failed--+     +--resource breach--> Failed
//!                      v
//!                    Failed            restart(): any state --> Loading
//! ```

use asset_decoder::{DecodedAssets, ResourceDecoder};
use audio_synth::AudioEngine;
use command_renderer::{CommandInterpreter, FrameStats, ImagePool};
use game_types::metadata::DEFAULT_DIMENSION;
use game_types::{ClearCmd, Command, CommandClass, Metadata, TextCmd};
use graphics_rasterizer::Canvas;
use resources::SandboxLimits;
use sandbox_host::{FrameFault, HostError, LoadError, SandboxHost};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_FRAME_CAP;
use crate::input_state::InputState;

/// Session error types
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Session ended by the host: {0}")]
    Host(#[from] HostError),

    #[error("Session is {0}, not running")]
    NotRunning(SessionState),
}

/// Lifecycle of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Running,
    /// The guest emitted `gameOver`
    Ended,
    /// Load failed or the instance hit a fatal limit
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Loading => write!(f, "loading"),
            SessionState::Running => write!(f, "running"),
            SessionState::Ended => write!(f, "ended"),
            SessionState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// What one frame did
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// 1-based frame number within the session
    pub frame: u64,
    /// `dt` after clamping
    pub dt: f64,
    pub draw: FrameStats,
    pub audio_commands: usize,
    /// Set when the guest failed this frame and a diagnostic was drawn
    pub fault: Option<FrameFault>,
    pub game_over: bool,
}

/// Commands of one frame split by consumer, order preserved within each
#[derive(Debug, Default)]
struct Partition {
    draw: Vec<Command>,
    audio: Vec<Command>,
    score: Option<f64>,
    game_over: bool,
}

fn partition(commands: Vec<Command>) -> Partition {
    let mut out = Partition::default();
    for command in commands {
        match command {
            Command::Score(s) => out.score = Some(s.value),
            Command::GameOver => out.game_over = true,
            other => match other.class() {
                CommandClass::Audio => out.audio.push(other),
                CommandClass::Draw => out.draw.push(other),
                CommandClass::Meta | CommandClass::Unknown => {}
            },
        }
    }
    out
}

/// The full-surface error screen shown when a session fails
pub fn error_screen(width: u32, height: u32, message: &str) -> Vec<Command> {
    vec![
        Command::Clear(ClearCmd {
            color: Some("#200".to_string()),
        }),
        Command::Text(TextCmd {
            x: f64::from(width) / 2.0,
            y: f64::from(height) / 2.0,
            text: format!("Error: {message}"),
            fill: Some("#f44".to_string()),
            font: Some("14px monospace".to_string()),
            align: Some("center".to_string()),
            baseline: Some("middle".to_string()),
            ..TextCmd::default()
        }),
    ]
}

/// A single game from load to game over
pub struct GameSession {
    source: String,
    limits: SandboxLimits,
    decoder: ResourceDecoder,
    host: SandboxHost,
    state: SessionState,
    metadata: Option<Metadata>,
    canvas: Canvas,
    interpreter: CommandInterpreter,
    images: ImagePool,
    audio: AudioEngine,
    input: InputState,
    score: f64,
    display: String,
    frame_cap: f64,
    frames: u64,
    failures: usize,
}

impl GameSession {
    /// Creates a session in `Loading`; nothing runs until [`start`](Self::start)
    pub fn new(source: impl Into<String>, limits: SandboxLimits) -> Self {
        Self {
            source: source.into(),
            limits,
            decoder: ResourceDecoder::new(),
            host: SandboxHost::new(limits),
            state: SessionState::Loading,
            metadata: None,
            canvas: Canvas::new(DEFAULT_DIMENSION, DEFAULT_DIMENSION),
            interpreter: CommandInterpreter::new(),
            images: ImagePool::new(),
            audio: AudioEngine::default(),
            input: InputState::new(DEFAULT_DIMENSION, DEFAULT_DIMENSION),
            score: 0.0,
            display: score_text(0.0),
            frame_cap: DEFAULT_FRAME_CAP,
            frames: 0,
            failures: 0,
        }
    }

    /// Builder: replaces the resource decoder (generator, budget, seed)
    pub fn with_decoder(mut self, decoder: ResourceDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Builder: replaces the audio engine
    pub fn with_audio(mut self, audio: AudioEngine) -> Self {
        self.audio = audio;
        self
    }

    /// Builder: replaces the `dt` clamp
    pub fn with_frame_cap(mut self, cap: f64) -> Self {
        if cap > 0.0 && cap.is_finite() {
            self.frame_cap = cap;
        }
        self
    }

    /// Loads the guest and decodes its resources
    ///
    /// On failure the session becomes `Failed` and the error screen is drawn.
    /// Assets that fail to decode are logged and left out; they never fail
    /// the load.
    pub fn start(&mut self) -> Result<&Metadata, SessionError> {
        if self.state != SessionState::Loading {
            return Err(SessionError::NotRunning(self.state.clone()));
        }

        let loaded = match self.host.load(&self.source) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(instance = %self.host.id(), error = %err, "game failed to load");
                self.fail(err.to_string());
                return Err(err.into());
            }
        };

        let assets = self.decoder.decode_blocking(&loaded.manifest);
        self.failures = assets.failures.len();
        self.install_assets(assets);

        let metadata = loaded.metadata;
        self.canvas = Canvas::new(metadata.width, metadata.height);
        self.input = InputState::new(metadata.width, metadata.height);
        info!(
            instance = %self.host.id(),
            title = %metadata.title,
            width = metadata.width,
            height = metadata.height,
            images = self.images.len(),
            sounds = self.audio.sample_count(),
            failures = self.failures,
            "session running"
        );
        self.state = SessionState::Running;
        Ok(self.metadata.insert(metadata))
    }

    fn install_assets(&mut self, assets: DecodedAssets) {
        self.images = assets.images;
        for (id, buffer) in assets.sounds {
            self.audio.load_sample(id, buffer);
        }
    }

    /// Runs one frame: guest update, then draw, then audio
    pub fn frame(&mut self, dt: f64) -> Result<FrameReport, SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::NotRunning(self.state.clone()));
        }

        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.frame_cap)
        } else {
            0.0
        };
        let snapshot = self.input.snapshot();

        let output = match self.host.call_update(dt, &snapshot) {
            Ok(output) => output,
            Err(err) => {
                warn!(instance = %self.host.id(), frame = self.frames + 1, error = %err, "session ended by host");
                self.host.dispose();
                self.audio.stop_all();
                self.fail(err.to_string());
                return Err(err.into());
            }
        };
        self.frames += 1;

        let parts = partition(output.commands);
        if let Some(score) = parts.score {
            self.score = score;
            self.display = score_text(score);
        }

        let draw = self
            .interpreter
            .execute(&mut self.canvas, &parts.draw, &self.images);
        let audio_commands = self.audio.process(&parts.audio);

        if parts.game_over {
            self.display = format!("GAME OVER - {}", score_text(self.score));
            self.state = SessionState::Ended;
            info!(instance = %self.host.id(), frame = self.frames, score = self.score, "game over");
        }
        debug!(
            frame = self.frames,
            executed = draw.executed,
            skipped = draw.skipped,
            audio = audio_commands,
            "frame done"
        );

        Ok(FrameReport {
            frame: self.frames,
            dt,
            draw,
            audio_commands,
            fault: output.fault,
            game_over: parts.game_over,
        })
    }

    /// Disposes the instance and goes back to `Loading` with the same source
    pub fn restart(&mut self) {
        self.host.dispose();
        self.host = SandboxHost::new(self.limits);
        self.audio.stop_all();
        self.audio.clear_samples();
        self.interpreter.reset();
        self.input.reset();
        self.images = ImagePool::new();
        self.metadata = None;
        self.score = 0.0;
        self.display = score_text(0.0);
        self.frames = 0;
        self.failures = 0;
        self.state = SessionState::Loading;
        info!(instance = %self.host.id(), "session restarted");
    }

    fn fail(&mut self, reason: String) {
        let commands = error_screen(self.canvas.width(), self.canvas.height(), &reason);
        self.interpreter.reset();
        self.interpreter
            .execute(&mut self.canvas, &commands, &self.images);
        self.state = SessionState::Failed(reason);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Score line as shown next to the game
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Assets that failed to decode at the last start
    pub fn asset_failures(&self) -> usize {
        self.failures
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioEngine {
        &mut self.audio
    }

    pub fn host(&self) -> &SandboxHost {
        &self.host
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("state", &self.state)
            .field("host", &self.host)
            .field("score", &self.score)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

fn score_text(score: f64) -> String {
    format!("SCORE: {score}")
}
