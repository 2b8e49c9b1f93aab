//! Manifest-wide decoding.

use crate::bitmap::{check_size, decode_hex, decode_pixels, render_procedural};
use crate::chromakey::remove_background;
use crate::error::{AssetDecodeError, GenerationError};
use crate::generator::{cache_key, GenerationCache, ImageGenerator};
use audio_synth::{decode_sound, SampleBuffer};
use command_renderer::ImagePool;
use futures::future::join_all;
use game_types::{GeneratedImage, ImageDescriptor, RawManifest, SoundDescriptor};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use resources::ManifestBudget;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Sound,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Image => write!(f, "image"),
            AssetKind::Sound => write!(f, "sound"),
        }
    }
}

/// An asset that was logged and left out
#[derive(Debug)]
pub struct AssetFailure {
    pub id: String,
    pub kind: AssetKind,
    pub error: AssetDecodeError,
}

/// Everything a manifest decoded to
#[derive(Debug, Default)]
pub struct DecodedAssets {
    pub images: ImagePool,
    pub sounds: BTreeMap<String, SampleBuffer>,
    pub failures: Vec<AssetFailure>,
}

impl DecodedAssets {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, id: &str, kind: AssetKind, error: AssetDecodeError) {
        warn!(asset = %id, %kind, error = %error, "Asset omitted");
        self.failures.push(AssetFailure {
            id: id.to_string(),
            kind,
            error,
        });
    }
}

/// Decodes every image and sound of a manifest before the first frame
///
/// Inline images and sounds decode synchronously. Generated images are
/// requested from the [`ImageGenerator`] all at once and joined; a failed
/// request omits that image only.
pub struct ResourceDecoder {
    generator: Option<Arc<dyn ImageGenerator>>,
    cache: GenerationCache,
    budget: ManifestBudget,
    seed: u64,
}

impl Default for ResourceDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDecoder")
            .field("generator", &self.generator.is_some())
            .field("cached", &self.cache.len())
            .field("budget", &self.budget)
            .finish()
    }
}

impl ResourceDecoder {
    /// A decoder without a generator; `generate` images fail as unavailable
    pub fn new() -> Self {
        Self {
            generator: None,
            cache: GenerationCache::new(),
            budget: ManifestBudget::default(),
            seed: 0,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_budget(mut self, budget: ManifestBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Seed for synthesized noise in manifest sounds
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn cache(&self) -> &GenerationCache {
        &self.cache
    }

    pub async fn decode(&self, manifest: &RawManifest) -> DecodedAssets {
        let mut assets = DecodedAssets::default();
        let mut pending = Vec::new();

        for (id, value) in &manifest.images {
            match ImageDescriptor::from_plain(value.clone()) {
                Ok(ImageDescriptor::Generate(request)) => pending.push((id, request)),
                Ok(descriptor) => match self.decode_inline(&descriptor) {
                    Ok(image) => assets.images.insert(id.clone(), image),
                    Err(e) => assets.fail(id, AssetKind::Image, e),
                },
                Err(e) => assets.fail(id, AssetKind::Image, AssetDecodeError::Malformed(e)),
            }
        }

        let results = join_all(pending.iter().map(|(_, request)| self.generated(request))).await;
        for ((id, _), result) in pending.iter().zip(results) {
            match result {
                Ok(image) => assets.images.insert((*id).clone(), image),
                Err(e) => assets.fail(id, AssetKind::Image, e),
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for (id, value) in &manifest.sounds {
            match decode_sound_value(value, &mut rng) {
                Ok(buffer) => {
                    assets.sounds.insert(id.clone(), buffer);
                }
                Err(e) => assets.fail(id, AssetKind::Sound, e),
            }
        }

        info!(
            images = assets.images.len(),
            sounds = assets.sounds.len(),
            failed = assets.failures.len(),
            "Resources decoded"
        );
        assets
    }

    /// Runs [`decode`](Self::decode) to completion on the current thread
    pub fn decode_blocking(&self, manifest: &RawManifest) -> DecodedAssets {
        futures::executor::block_on(self.decode(manifest))
    }

    fn decode_inline(&self, descriptor: &ImageDescriptor) -> Result<RgbaImage, AssetDecodeError> {
        let limit = self.budget.max_image_side;
        match descriptor {
            ImageDescriptor::Pixels(grid) => decode_pixels(grid, limit),
            ImageDescriptor::Hex(rows) => decode_hex(rows, limit),
            ImageDescriptor::Procedural(proc) => render_procedural(proc, limit),
            ImageDescriptor::Generate(_) | ImageDescriptor::Unknown => {
                Err(AssetDecodeError::UnsupportedType)
            }
        }
    }

    async fn generated(&self, request: &GeneratedImage) -> Result<RgbaImage, AssetDecodeError> {
        let (width, height) = (request.width(), request.height());
        check_size(width, height, self.budget.max_image_side)?;
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt.into());
        }

        let key = cache_key(&request.prompt, width, height);
        let bytes = match self.cache.get(&key) {
            Some(bytes) => {
                debug!(key = %&key[..12], "Generated image cache hit");
                bytes
            }
            None => {
                let generator = self.generator.as_ref().ok_or(GenerationError::Unavailable)?;
                let bytes: Arc<[u8]> = generator
                    .generate(&request.prompt, width, height)
                    .await?
                    .into();
                self.cache.insert(key, bytes.clone());
                bytes
            }
        };

        let mut image = image::load_from_memory(&bytes)?.to_rgba8();
        if image.dimensions() != (width, height) {
            image = imageops::resize(&image, width, height, FilterType::Nearest);
        }
        if request.removes_background() {
            remove_background(&mut image);
        }
        Ok(image)
    }
}

fn decode_sound_value(value: &Value, rng: &mut StdRng) -> Result<SampleBuffer, AssetDecodeError> {
    let descriptor = SoundDescriptor::from_plain(value.clone()).map_err(AssetDecodeError::Malformed)?;
    Ok(decode_sound(&descriptor, rng)?)
}
