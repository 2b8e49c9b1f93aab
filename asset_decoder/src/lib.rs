//! # Asset Decoder
//!
//! This crate turns the declarative resource manifest of a guest into
//! images and sample buffers before the first frame runs.
//!
//! ## Philosophy
//!
//! - **Soft failure per asset**: A bad descriptor is logged and left out;
//!   gameplay proceeds with whatever decoded
//! - **Concurrent where it waits**: Generated images are requested together
//!   and joined; everything inline decodes synchronously
//! - **No new paint engine**: Procedural images run through the same
//!   [`CommandInterpreter`](command_renderer::CommandInterpreter) as frames
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An image generation client (callers supply an [`ImageGenerator`])
//! - A persistent cache (the cache lives as long as the decoder)

pub mod bitmap;
pub mod chromakey;
pub mod decoder;
pub mod error;
pub mod generator;

pub use bitmap::{decode_hex, decode_pixels, render_procedural};
pub use chromakey::{ciede2000, remove_background, rgb_to_lab, DELTA_E_THRESHOLD};
pub use decoder::{AssetFailure, AssetKind, DecodedAssets, ResourceDecoder};
pub use error::{AssetDecodeError, GenerationError};
pub use generator::{cache_key, GenerationCache, ImageGenerator};
