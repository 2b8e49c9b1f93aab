//! Decoded images available to `img` commands.

use graphics_rasterizer::Sprite;
use image::RgbaImage;
use std::collections::BTreeMap;
use tracing::debug;

/// Decoded images keyed by manifest id
#[derive(Debug, Clone, Default)]
pub struct ImagePool {
    sprites: BTreeMap<String, Sprite>,
}

impl ImagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-sized images are dropped; `img` commands naming them draw nothing
    pub fn insert(&mut self, id: impl Into<String>, image: RgbaImage) {
        let id = id.into();
        match Sprite::new(image) {
            Some(sprite) => {
                self.sprites.insert(id, sprite);
            }
            None => debug!(id = %id, "Zero-sized image not pooled"),
        }
    }

    pub fn get(&self, id: &str) -> Option<&RgbaImage> {
        self.sprites.get(id).map(Sprite::image)
    }

    pub fn sprite(&self, id: &str) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sprites.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sprites.keys().map(String::as_str)
    }
}
