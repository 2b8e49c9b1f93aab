//! The image generation collaborator and its per-decoder cache.

use crate::error::GenerationError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Turns a prompt into encoded image bytes (PNG or any format `image` reads)
///
/// Implementations talk to whatever service produces the pictures. Failure
/// is per asset: the decoder logs it and omits that image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, GenerationError>;
}

/// Hex SHA-256 of `prompt|width|height`
pub fn cache_key(prompt: &str, width: u32, height: u32) -> String {
    let digest = Sha256::digest(format!("{prompt}|{width}|{height}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generated bytes keyed by [`cache_key`]
#[derive(Debug, Default)]
pub struct GenerationCache {
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl GenerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, bytes: Arc<[u8]>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, bytes);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
