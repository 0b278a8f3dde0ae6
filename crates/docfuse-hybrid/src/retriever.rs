use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use docfuse_core::config::{Bm25Settings, RetrievalSettings};
use docfuse_core::error::{Error, Result};
use docfuse_core::store::DocumentStore;
use docfuse_core::traits::Embedder;
use docfuse_core::types::{Candidate, DocId, DocumentUnit};
use docfuse_text::{top_hits, LexicalIndex};
use docfuse_vector::VectorIndex;

use crate::fusion::fuse;

/// Per-query knobs. `k * candidate_factor` ids are taken from each index
/// before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub k: usize,
    pub alpha: f32,
    pub candidate_factor: usize,
    /// On query-embedding failure, fuse lexical results alone instead of failing.
    pub lexical_fallback: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

impl From<&RetrievalSettings> for RetrieveOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { k: s.top_k, alpha: s.alpha, candidate_factor: s.candidate_factor, lexical_fallback: s.lexical_fallback }
    }
}

impl RetrieveOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidArgument(format!("alpha must be in [0, 1], got {}", self.alpha)));
        }
        if self.candidate_factor == 0 {
            return Err(Error::InvalidArgument("candidate_factor must be at least 1".into()));
        }
        Ok(())
    }

    fn pool_size(&self) -> usize {
        self.k.saturating_mul(self.candidate_factor)
    }
}

/// A fused hit resolved back to its document unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub document: DocumentUnit,
    #[serde(flatten)]
    pub candidate: Candidate,
}

/// A consistent document store plus both indexes built over it.
///
/// Immutable once built; rebuilding produces a new snapshot.
pub struct IndexSnapshot {
    store: DocumentStore,
    lexical: LexicalIndex,
    vector: VectorIndex,
}

impl IndexSnapshot {
    /// Builds both indexes over `store`.
    ///
    /// Documents are embedded in `batch_size` batches while the lexical index
    /// is built on a scoped thread. Any embedding failure fails the build.
    #[instrument(skip_all, fields(docs = store.len(), batch_size = batch_size))]
    pub fn build(store: DocumentStore, embedder: &dyn Embedder, bm25: Bm25Settings, batch_size: usize) -> Result<Self> {
        let texts: Vec<String> = store.iter().map(|u| u.text.clone()).collect();
        let ids: Vec<DocId> = store.iter().map(|u| u.id).collect();

        let (lexical, vectors) = std::thread::scope(|scope| {
            let lexical = scope.spawn(|| {
                let mut index = LexicalIndex::new(bm25);
                index.build(store.units());
                index
            });
            let vectors = embed_all(embedder, &texts, batch_size);
            let lexical = lexical
                .join()
                .map_err(|_| Error::Operation("lexical index build panicked".into()))?;
            Ok::<_, Error>((lexical, vectors?))
        })?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dim()) {
            return Err(Error::DimensionMismatch { expected: embedder.dim(), actual: bad.len() });
        }
        let mut vector = VectorIndex::new();
        vector.build(&ids, &vectors)?;
        info!(docs = store.len(), "index snapshot built");
        Ok(Self { store, lexical, vector })
    }

    /// Assembles a snapshot from indexes built elsewhere. Both must be ready
    /// and cover exactly the documents in `store`.
    pub fn from_parts(store: DocumentStore, lexical: LexicalIndex, vector: VectorIndex) -> Result<Self> {
        if !lexical.is_ready() {
            return Err(Error::NotReady("lexical index"));
        }
        if !vector.is_ready() {
            return Err(Error::NotReady("vector index"));
        }
        if lexical.len() != store.len() || vector.len() != store.len() {
            return Err(Error::InvalidArgument(format!(
                "store holds {} documents but indexes cover {} (lexical) and {} (vector)",
                store.len(),
                lexical.len(),
                vector.len()
            )));
        }
        Ok(Self { store, lexical, vector })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }
}

fn embed_all(embedder: &dyn Embedder, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_batch(batch).map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if embedded.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
    }
    Ok(vectors)
}

/// Query entry point over the currently published [`IndexSnapshot`].
///
/// Queries clone the snapshot `Arc` and run without holding the lock, so a
/// concurrent [`Retriever::publish`] never mixes old and new state within a
/// query.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, current: RwLock::new(None) }
    }

    /// Swaps in `snapshot` and returns the one it replaced.
    pub fn publish(&self, snapshot: IndexSnapshot) -> Result<Option<Arc<IndexSnapshot>>> {
        let mut current = self.current.write().map_err(|_| Error::Operation("snapshot lock poisoned".into()))?;
        info!(docs = snapshot.store.len(), "publishing index snapshot");
        Ok(current.replace(Arc::new(snapshot)))
    }

    /// Builds a snapshot over `store` with this retriever's embedder and
    /// publishes it.
    pub fn rebuild(&self, store: DocumentStore, bm25: Bm25Settings, batch_size: usize) -> Result<()> {
        let snapshot = IndexSnapshot::build(store, self.embedder.as_ref(), bm25, batch_size)?;
        self.publish(snapshot)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        let current = self.current.read().map_err(|_| Error::Operation("snapshot lock poisoned".into()))?;
        current.clone().ok_or(Error::NotReady("retriever"))
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ok()
    }

    /// Top-`k` documents for `query`, best first.
    #[instrument(skip_all, fields(k = options.k, alpha = options.alpha))]
    pub fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<RetrievedDocument>> {
        options.validate()?;
        let snapshot = self.snapshot()?;
        if options.k == 0 {
            return Ok(Vec::new());
        }
        let pool = options.pool_size();

        let tokens = snapshot.lexical.tokenize(query);
        let lexical_scores = snapshot.lexical.score(&tokens)?;
        let lexical_top: HashSet<DocId> = top_hits(lexical_scores.clone(), pool).iter().map(|h| h.id).collect();

        let vector_results = match self.embedder.embed(query) {
            Ok(query_vec) => snapshot.vector.search(&query_vec, pool)?,
            Err(e) if options.lexical_fallback => {
                warn!(error = %format!("{e:#}"), "query embedding failed; fusing lexical results only");
                Vec::new()
            }
            Err(e) => return Err(Error::Embedding(format!("{e:#}"))),
        };
        let vector_top: HashSet<DocId> = vector_results.iter().map(|n| n.id).collect();

        let fused = fuse(&lexical_scores, &lexical_top, &vector_results, &vector_top, options.alpha, options.k)?;
        debug!(tokens = tokens.len(), pool, returned = fused.len(), "retrieved");

        fused
            .into_iter()
            .map(|candidate| {
                snapshot
                    .store
                    .get(candidate.id)
                    .cloned()
                    .map(|document| RetrievedDocument { document, candidate })
                    .ok_or_else(|| Error::NotFound(format!("document {}", candidate.id)))
            })
            .collect()
    }
}
