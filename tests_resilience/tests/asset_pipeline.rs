//! Asset Pipeline Tests
//!
//! Declared resources from a real guest through decode into frames.

use asset_decoder::{AssetDecodeError, GenerationError, ImageGenerator, ResourceDecoder};
use async_trait::async_trait;
use gamehostd::{GameSession, SessionState};
use graphics_rasterizer::Color;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use resources::SandboxLimits;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tests_resilience::guest_with_resources;

/// Solid blue pictures, bordered in magenta so the background can be keyed out
struct PaintGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for PaintGenerator {
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<Vec<u8>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("offline") {
            return Err(GenerationError::Failed("service offline".to_string()));
        }
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 255, 255]));
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                image.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| GenerationError::Failed(e.to_string()))?;
        Ok(bytes.into_inner())
    }
}

const RESOURCES: &str = r##"
    return {
        images = {
            blank = { type = "hex", w = 4, h = 4, palette = { "#000", "#f00" }, rows = { "0000", "0000", "0000", "0000" } },
            ship = { type = "hex", w = 2, h = 1, palette = { "#000", "#0f0" }, rows = { "11" } },
            dots = { type = "pixels", w = 2, h = 1, data = { "#fff", false } },
            sky = { type = "procedural", w = 8, h = 8, draw = { { op = "clear", color = "#08f" } } },
            hero = { type = "generate", prompt = "a hero", w = 8, h = 8 },
            ghost = { type = "generate", prompt = "offline ghost", w = 8, h = 8 },
        },
        sounds = {
            beep = { type = "generate", wave = "square", notes = { "A4" }, dur = 0.1 },
        },
    }
"##;

const UPDATE: &str = r##"
    return {
        { op = "clear", color = "#444" },
        { op = "img", id = "sky", x = 0, y = 0, w = 20, h = 20 },
        { op = "img", id = "blank", x = 0, y = 0, w = 20, h = 20 },
        { op = "img", id = "ship", x = 30, y = 0, w = 20, h = 10 },
        { op = "img", id = "dots", x = 60, y = 0, w = 20, h = 10 },
        { op = "img", id = "hero", x = 90, y = 0, w = 8, h = 8 },
        { op = "img", id = "ghost", x = 110, y = 0, w = 8, h = 8 },
        { op = "sample", id = "beep", ch = 6 },
    }
"##;

fn started(generator: Option<Arc<PaintGenerator>>) -> GameSession {
    let mut decoder = ResourceDecoder::new();
    if let Some(generator) = generator {
        decoder = decoder.with_generator(generator);
    }
    let mut session = GameSession::new(guest_with_resources(RESOURCES, UPDATE), SandboxLimits::default())
        .with_decoder(decoder);
    session.start().unwrap();
    session
}

/// Test: every image kind lands on the surface, and failures are skipped
#[test]
fn test_declared_images_render() {
    let generator = Arc::new(PaintGenerator {
        calls: AtomicUsize::new(0),
    });
    let mut session = started(Some(generator.clone()));
    assert_eq!(session.state(), &SessionState::Running);
    assert_eq!(session.asset_failures(), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    let report = session.frame(0.016).unwrap();
    assert_eq!(report.audio_commands, 1);

    let canvas = session.canvas();
    // all-zero hex image is fully transparent: the sky shows through
    assert_eq!(canvas.pixel(10, 10), Color::rgb(0, 0x88, 0xff));
    assert_eq!(canvas.pixel(35, 5), Color::rgb(0, 255, 0));
    assert_eq!(canvas.pixel(65, 5), Color::rgb(255, 255, 255));
    assert_eq!(canvas.pixel(75, 5), Color::rgb(0x44, 0x44, 0x44));
    // generated image keeps its subject and loses its keyed border
    assert_eq!(canvas.pixel(94, 4), Color::rgb(0, 0, 255));
    assert_eq!(canvas.pixel(90, 0), Color::rgb(0x44, 0x44, 0x44));
    // the failed generation draws nothing
    assert_eq!(canvas.pixel(114, 4), Color::rgb(0x44, 0x44, 0x44));

    assert!(session.audio().is_active(6));
}

/// Test: with no generator, generated images fail softly
#[test]
fn test_no_generator_is_soft_failure() {
    let mut session = started(None);
    assert_eq!(session.state(), &SessionState::Running);
    assert_eq!(session.asset_failures(), 2);
    assert!(session.frame(0.016).unwrap().fault.is_none());
}

/// Test: decode failures carry the asset id and a typed error
#[test]
fn test_failures_are_typed() {
    let decoder = ResourceDecoder::new();
    let manifest = game_types::RawManifest::from_plain(serde_json::json!({
        "images": { "hero": { "type": "generate", "prompt": "a hero" } }
    }))
    .unwrap();
    let assets = decoder.decode_blocking(&manifest);
    assert_eq!(assets.failures.len(), 1);
    assert_eq!(assets.failures[0].id, "hero");
    assert!(matches!(
        assets.failures[0].error,
        AssetDecodeError::Generation(GenerationError::Unavailable)
    ));
}

/// Test: two manifests asking for the same picture share one generation
#[test]
fn test_generation_cache_shared_within_decoder() {
    let generator = Arc::new(PaintGenerator {
        calls: AtomicUsize::new(0),
    });
    let decoder = ResourceDecoder::new().with_generator(generator.clone());
    let manifest = game_types::RawManifest::from_plain(serde_json::json!({
        "images": {
            "a": { "type": "generate", "prompt": "tree", "w": 16, "h": 16 },
            "b": { "type": "generate", "prompt": "rock", "w": 16, "h": 16 }
        }
    }))
    .unwrap();

    assert!(decoder.decode_blocking(&manifest).is_complete());
    assert!(decoder.decode_blocking(&manifest).is_complete());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(decoder.cache().len(), 2);
}
