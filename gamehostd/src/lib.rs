//! # gamehostd
//!
//! The frame orchestrator: owns a live game from load to game over and wires
//! the sandbox, the resource decoder, the command interpreter and the audio
//! engine together.
//!
//! ## Philosophy
//!
//! - **Host owns the loop**: Guests are called once per frame and never see
//!   wall-clock time, only a clamped `dt`
//! - **Edges computed here**: `*Pressed` flags come from diffing input state
//!   between frames, never from guest code
//! - **Failures end sessions, not processes**: A fatal sandbox error moves the
//!   session to `Failed` and draws an error screen
//! - **Deterministic when headless**: Scripted input, fixed `dt` and seeded
//!   audio make a run reproducible
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A windowing or audio output layer (frames and samples are produced, not
//!   presented)
//! - A game store (no drafts, jobs or networking)

pub mod cli;
pub mod config;
pub mod input_script;
pub mod input_state;
pub mod preview;
pub mod runtime;
pub mod session;

pub use config::{ConfigError, HostRuntimeConfig};
pub use input_script::{InputScript, InputScriptError, PointerAction, ScriptedInput};
pub use input_state::{key_button, InputState};
pub use preview::render_preview;
pub use runtime::{HostRuntime, HostRuntimeError, RunSummary};
pub use session::{error_screen, FrameReport, GameSession, SessionError, SessionState};
