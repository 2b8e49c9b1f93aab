//! Static preview frames.
//!
//! A preview runs on its own throwaway session: separate sandbox instance,
//! surface and audio engine, so rendering one never disturbs a live game.

use crate::config::DEFAULT_FRAME_DT;
use crate::session::{GameSession, SessionError, SessionState};
use image::RgbaImage;
use resources::SandboxLimits;
use tracing::debug;

/// Renders `frames` frames of `source` with no input and returns the last one
///
/// At least one frame is always rendered. Stops early if the guest ends the
/// game or its instance fails.
pub fn render_preview(
    source: &str,
    limits: SandboxLimits,
    frames: u32,
) -> Result<RgbaImage, SessionError> {
    let mut session = GameSession::new(source, limits);
    session.start()?;

    for _ in 0..frames.max(1) {
        session.frame(DEFAULT_FRAME_DT)?;
        if session.state() != &SessionState::Running {
            break;
        }
    }
    debug!(frames = session.frames(), "preview rendered");
    Ok(session.canvas().to_image())
}
