//! # Game Types
//!
//! This crate defines the vocabulary shared by every part of the game host:
//! the command protocol guests return each frame, the input snapshot they
//! receive, and the metadata/resource declarations they make at load time.
//!
//! ## Philosophy
//!
//! - **Plain data only**: Every type here is a serde record; nothing carries a
//!   live handle across the sandbox boundary
//! - **Tagged, not stringly dispatched**: Commands are an enum keyed on `op`
//! - **Forward compatible**: Unknown `op` tags decode to [`Command::Unknown`]
//! - **Strict on shape**: A known command with a wrongly typed field is an
//!   error, never coerced
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A renderer or synthesizer (see `command_renderer` and `audio_synth`)
//! - A scripting API (guests never see these types, only their plain form)

pub mod command;
pub mod input;
pub mod manifest;
pub mod metadata;
pub mod plain;

pub use command::{
    AlphaCmd, ArcCmd, CircleCmd, ClearCmd, ClipCmd, Command, CommandClass, ImageCmd, LineCmd,
    NoiseCmd, PathCmd, PathStep, PolyCmd, RectCmd, RotateCmd, SampleCmd, ScaleCmd, ScoreCmd,
    StopCmd, TextCmd, ToneCmd, TranslateCmd, VolumeCmd,
};
pub use input::{Button, InputSnapshot};
pub use manifest::{
    Adsr, EnvelopeSpec, GeneratedImage, ImageDescriptor, ManifestError, PaletteRows, PixelCell,
    PixelGrid, ProceduralImage, RawManifest, RawSample, SoundDescriptor, Sweep, SynthSound,
};
pub use metadata::{Metadata, MetadataError};
pub use plain::{decode_commands, kind_of, CommandDecodeError};
