//! docfuse-embed
//!
//! Local embedding provider. [`HashingEmbedder`] feature-hashes words into a
//! fixed number of buckets: deterministic, dependency-light, and good enough
//! to exercise the vector index end to end. Model-backed or remote providers
//! implement the same `Embedder` trait and plug in at [`get_default_embedder`].
use std::hash::{Hash, Hasher};

use anyhow::Result;
use tracing::info;
use twox_hash::XxHash64;

use docfuse_core::config::EmbeddingSettings;
use docfuse_core::traits::Embedder;

pub mod pool;

pub use pool::l2_normalize;

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        let words = text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty());
        for (i, word) in words.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            word.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.dimension == 0 {
        anyhow::bail!("embedding.dimension must be positive");
    }
    info!(dim = settings.dimension, "using hashing embedder");
    Ok(Box::new(HashingEmbedder::new(settings.dimension)))
}
