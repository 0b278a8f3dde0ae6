//! Collaborator seams. Implementations live outside the retrieval core and
//! report failures through `anyhow`; the core wraps them, it never retries.

use crate::types::{CitedPassage, PageText};

pub trait Embedder: Send + Sync {
    /// Dimensionality of every vector this embedder returns.
    fn dim(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for a single input"))
    }
}

/// Pages of a single source document, once from primary extraction and once
/// from an OCR fallback. Both sequences are ordered by page.
pub trait DocumentSource {
    fn source_id(&self) -> &str;
    fn structured_pages(&self) -> anyhow::Result<Vec<PageText>>;
    fn ocr_pages(&self) -> anyhow::Result<Vec<PageText>>;
}

pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, query: &str, passages: &[CitedPassage]) -> anyhow::Result<String>;
}
