//! Error types for asset decoding.

use audio_synth::SoundError;
use thiserror::Error;

/// Failure reported by an [`ImageGenerator`](crate::ImageGenerator)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("no image generator is configured")]
    Unavailable,
    #[error("empty prompt")]
    EmptyPrompt,
    #[error("image generation failed: {0}")]
    Failed(String),
}

/// Why one asset was omitted
///
/// Never fatal: the decoder logs it, records it, and moves on.
#[derive(Debug, Error)]
pub enum AssetDecodeError {
    #[error("malformed descriptor: {0}")]
    Malformed(String),

    #[error("unsupported asset type")]
    UnsupportedType,

    #[error("invalid image size {width}x{height} (sides must be 1..={limit})")]
    InvalidSize { width: u32, height: u32, limit: u32 },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("generated image is unreadable: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Sound(#[from] SoundError),
}
