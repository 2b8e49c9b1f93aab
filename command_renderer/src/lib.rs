//! # Command Renderer
//!
//! This crate executes the draw commands a guest returns each frame against
//! a 2D paint surface.
//!
//! ## Philosophy
//!
//! - **Exhaustive, not stringly typed**: Dispatch is a `match` over
//!   [`Command`](game_types::Command); unknown tags are a deliberate no-op arm
//! - **Forgiving on content**: A bad color, a missing image or a degenerate
//!   shape skips one paint and never fails the frame
//! - **Surface agnostic**: The interpreter only talks to the [`Surface`]
//!   trait; [`Canvas`](graphics_rasterizer::Canvas) is the stock implementation
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An audio consumer (see `audio_synth`)
//! - A score keeper (meta commands belong to the frame orchestrator)

pub mod color;
pub mod interpreter;
pub mod pool;
pub mod state;
pub mod surface;

pub use color::parse_color;
pub use interpreter::{font_size, CommandInterpreter, FrameStats};
pub use pool::ImagePool;
pub use state::PaintStack;
pub use surface::Surface;
