//! Domain types shared by the lexical index, the vector index and fusion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a [`DocumentUnit`].
///
/// Assigned by the `DocumentStore` from a monotonic counter and never reused,
/// so ordering by id is ordering by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u64);

impl DocId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of retrieval: one page's merged text plus provenance.
///
/// - `id`: store-assigned identifier, stable for the lifetime of an index pair
/// - `text`: structured text and OCR text joined by a line break, never blank
/// - `source`: collaborator-provided identifier of the originating document
/// - `page`: 1-based page number within `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUnit {
    pub id: DocId,
    pub text: String,
    pub source: String,
    pub page: usize,
}

/// One page of text as produced by a document source.
///
/// `index` is the 1-based position of the page in its sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

impl PageText {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// A lexical hit. `score` is the raw BM25 score; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
}

/// A vector hit. `distance` is squared Euclidean; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: DocId,
    pub distance: f32,
}

/// Query-scoped fusion record.
///
/// `semantic_score` is `None` when the id was not in the vector top set;
/// `lexical_score` is the gated, min-max normalised BM25 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: DocId,
    pub semantic_score: Option<f32>,
    pub lexical_score: f32,
    pub fused_score: f32,
}

/// Retrieved text paired with the citation label shown to an answer generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedPassage {
    pub text: String,
    pub citation: String,
}
