//! Hybrid retrieval: BM25 and nearest-neighbour results fused into one
//! ranking, plus the citation and prompt helpers that sit on top of it.
//!
//! [`Retriever`] owns the published [`IndexSnapshot`]; [`fusion::fuse`] is
//! the pure scoring step and can be used on its own. [`eval::evaluate`]
//! grades a ranking against relevance judgements.

pub mod context;
pub mod eval;
pub mod fusion;
pub mod retriever;

pub use context::{citation_label, cited_passages, grounded_prompt, Answer, RagPipeline};
pub use eval::{evaluate, page_key, scored_documents, RelevanceLabel, RetrievalEvaluation, ScoredDocument};
pub use fusion::{fuse, min_max_normalize};
pub use retriever::{IndexSnapshot, RetrieveOptions, RetrievedDocument, Retriever};
