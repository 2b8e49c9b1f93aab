//! # Resource Manifest
//!
//! Declarative image and sound descriptors returned by the guest's
//! `resources()` entry point.
//!
//! The manifest is split in two stages. [`RawManifest`] keeps each descriptor
//! as a plain value so that one malformed asset cannot reject the whole
//! manifest; [`ImageDescriptor::from_plain`] and
//! [`SoundDescriptor::from_plain`] type each entry individually when the
//! decoder gets to it.

use crate::command::Command;
use crate::plain::{kind_of, list_or_empty, map_or_empty, opt_whole_u32, whole_u32};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("resources() must return a table, got {0}")]
    NotATable(&'static str),

    #[error("resource manifest is malformed: {0}")]
    Malformed(String),
}

/// Manifest as declared, with descriptors not yet typed
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawManifest {
    #[serde(deserialize_with = "map_or_empty")]
    pub images: BTreeMap<String, Value>,
    #[serde(deserialize_with = "map_or_empty")]
    pub sounds: BTreeMap<String, Value>,
}

impl RawManifest {
    pub fn from_plain(value: Value) -> Result<Self, ManifestError> {
        match &value {
            Value::Object(_) => {}
            // an empty guest table marshals as whichever shape the engine picks
            Value::Array(items) if items.is_empty() => return Ok(Self::default()),
            other => return Err(ManifestError::NotATable(kind_of(other))),
        }
        serde_json::from_value(value).map_err(|e| ManifestError::Malformed(e.to_string()))
    }

    /// Declared `(w, h)` of an image entry, read without typing the descriptor
    pub fn declared_size(descriptor: &Value) -> (Option<f64>, Option<f64>) {
        let dim = |key: &str| descriptor.get(key).and_then(Value::as_f64);
        (dim("w"), dim("h"))
    }
}

// ============================================================================
// Images
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImageDescriptor {
    /// Explicit per-pixel colors
    Pixels(PixelGrid),
    /// Palette-indexed hex-digit rows
    Hex(PaletteRows),
    /// A command list rendered once offscreen
    Procedural(ProceduralImage),
    /// A prompt resolved by the image generation collaborator
    Generate(GeneratedImage),
    #[serde(other)]
    Unknown,
}

impl ImageDescriptor {
    pub fn from_plain(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

/// One pixel of a [`PixelGrid`]: a `#rrggbb` color or transparent
///
/// Any falsy guest value (`nil`, `false`, `""`, `0`) is transparent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PixelCell(pub Option<String>);

impl<'de> Deserialize<'de> for PixelCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null | Value::Bool(false) => Ok(PixelCell(None)),
            Value::String(s) if s.is_empty() => Ok(PixelCell(None)),
            Value::String(s) => Ok(PixelCell(Some(s))),
            Value::Number(n) if n.as_f64() == Some(0.0) => Ok(PixelCell(None)),
            other => Err(D::Error::custom(format!(
                "pixel must be a color or transparent, found {}",
                kind_of(&other)
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PixelGrid {
    #[serde(deserialize_with = "whole_u32")]
    pub w: u32,
    #[serde(deserialize_with = "whole_u32")]
    pub h: u32,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub data: Vec<PixelCell>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaletteRows {
    #[serde(deserialize_with = "whole_u32")]
    pub w: u32,
    #[serde(deserialize_with = "whole_u32")]
    pub h: u32,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub palette: Vec<String>,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProceduralImage {
    #[serde(deserialize_with = "whole_u32")]
    pub w: u32,
    #[serde(deserialize_with = "whole_u32")]
    pub h: u32,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub draw: Vec<Command>,
}

pub const DEFAULT_GENERATED_SIZE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub prompt: String,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub w: Option<u32>,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub h: Option<u32>,
    pub remove_background: Option<bool>,
}

impl GeneratedImage {
    pub fn width(&self) -> u32 {
        self.w.unwrap_or(DEFAULT_GENERATED_SIZE)
    }

    pub fn height(&self) -> u32 {
        self.h.unwrap_or(DEFAULT_GENERATED_SIZE)
    }

    pub fn removes_background(&self) -> bool {
        self.remove_background.unwrap_or(true)
    }
}

// ============================================================================
// Sounds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SoundDescriptor {
    /// Procedurally synthesized buffer
    Generate(SynthSound),
    /// Explicit sample data
    Pcm(RawSample),
    #[serde(other)]
    Unknown,
}

impl SoundDescriptor {
    pub fn from_plain(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthSound {
    pub wave: Option<String>,
    #[serde(deserialize_with = "list_or_empty")]
    pub notes: Vec<String>,
    pub note: Option<String>,
    pub freq: Option<f64>,
    pub sweep: Option<Sweep>,
    pub dur: Option<f64>,
    pub env: Option<EnvelopeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample {
    #[serde(deserialize_with = "list_or_empty")]
    pub data: Vec<f32>,
    pub rate: Option<f64>,
}

// ============================================================================
// Envelopes
// ============================================================================

/// Attack/decay/sustain/release shape in seconds (sustain is a level)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adsr {
    pub a: f64,
    pub d: f64,
    pub s: f64,
    pub r: f64,
}

impl Adsr {
    pub const SHARP: Adsr = Adsr { a: 0.01, d: 0.05, s: 0.3, r: 0.05 };
    pub const SOFT: Adsr = Adsr { a: 0.05, d: 0.1, s: 0.6, r: 0.1 };
    pub const FADE: Adsr = Adsr { a: 0.02, d: 0.3, s: 0.2, r: 0.2 };
    pub const SUSTAIN: Adsr = Adsr { a: 0.01, d: 0.02, s: 0.8, r: 0.1 };

    /// Envelope used by synthesized manifest sounds that declare none
    pub const RESOURCE_DEFAULT: Adsr = Adsr { a: 0.01, d: 0.1, s: 0.5, r: 0.1 };

    pub fn preset(name: &str) -> Option<Adsr> {
        match name {
            "sharp" => Some(Self::SHARP),
            "soft" => Some(Self::SOFT),
            "fade" => Some(Self::FADE),
            "sustain" => Some(Self::SUSTAIN),
            _ => None,
        }
    }
}

/// An envelope given either by preset name or as an explicit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeSpec {
    Preset(String),
    Custom(Adsr),
}

impl EnvelopeSpec {
    /// Unknown preset names fall back to `sharp`
    pub fn resolve(&self) -> Adsr {
        match self {
            EnvelopeSpec::Preset(name) => Adsr::preset(name).unwrap_or(Adsr::SHARP),
            EnvelopeSpec::Custom(adsr) => *adsr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_keeps_entries_untyped() {
        let manifest = RawManifest::from_plain(json!({
            "images": {"ship": {"type": "hex", "w": 2, "h": 1, "palette": ["#000", "#fff"], "rows": ["01"]},
                       "broken": {"type": "hex", "w": "wide"}},
            "sounds": []
        }))
        .unwrap();
        assert_eq!(manifest.images.len(), 2);
        assert!(manifest.sounds.is_empty());
        assert!(ImageDescriptor::from_plain(manifest.images["broken"].clone()).is_err());
        assert!(matches!(
            ImageDescriptor::from_plain(manifest.images["ship"].clone()),
            Ok(ImageDescriptor::Hex(_))
        ));
    }

    #[test]
    fn test_manifest_shape_errors() {
        assert_eq!(
            RawManifest::from_plain(json!("x")),
            Err(ManifestError::NotATable("string"))
        );
        assert_eq!(RawManifest::from_plain(json!([])), Ok(RawManifest::default()));
        assert!(RawManifest::from_plain(json!({"images": 3})).is_err());
    }

    #[test]
    fn test_declared_size() {
        let (w, h) = RawManifest::declared_size(&json!({"type": "generate", "w": 600}));
        assert_eq!(w, Some(600.0));
        assert_eq!(h, None);
    }

    #[test]
    fn test_pixel_cells() {
        let grid: PixelGrid = serde_json::from_value(json!({
            "w": 2, "h": 2, "data": ["#ff0000", false, "", null]
        }))
        .unwrap();
        assert_eq!(grid.data[0], PixelCell(Some("#ff0000".to_string())));
        assert!(grid.data[1..].iter().all(|c| c.0.is_none()));
    }

    #[test]
    fn test_generated_defaults() {
        let img = match ImageDescriptor::from_plain(json!({"type": "generate", "prompt": "a cat"})) {
            Ok(ImageDescriptor::Generate(g)) => g,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!((img.width(), img.height()), (64, 64));
        assert!(img.removes_background());
    }

    #[test]
    fn test_unknown_descriptor_types() {
        assert_eq!(
            ImageDescriptor::from_plain(json!({"type": "svg"})),
            Ok(ImageDescriptor::Unknown)
        );
        assert_eq!(
            SoundDescriptor::from_plain(json!({"type": "midi"})),
            Ok(SoundDescriptor::Unknown)
        );
    }

    #[test]
    fn test_envelopes() {
        let preset: EnvelopeSpec = serde_json::from_value(json!("soft")).unwrap();
        assert_eq!(preset.resolve(), Adsr::SOFT);
        let unknown: EnvelopeSpec = serde_json::from_value(json!("wobbly")).unwrap();
        assert_eq!(unknown.resolve(), Adsr::SHARP);
        let custom: EnvelopeSpec =
            serde_json::from_value(json!({"a": 0.01, "d": 0.3, "s": 0, "r": 0.1})).unwrap();
        assert_eq!(custom.resolve(), Adsr { a: 0.01, d: 0.3, s: 0.0, r: 0.1 });
    }

    #[test]
    fn test_synth_sound() {
        let sound = SoundDescriptor::from_plain(json!({
            "type": "generate", "wave": "sawtooth", "sweep": {"from": 400, "to": 100}, "dur": 0.5
        }))
        .unwrap();
        match sound {
            SoundDescriptor::Generate(s) => {
                assert_eq!(s.sweep, Some(Sweep { from: 400.0, to: 100.0 }));
                assert!(s.notes.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
