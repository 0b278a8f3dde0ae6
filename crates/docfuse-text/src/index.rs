use std::cmp::Ordering;
use std::collections::BTreeMap;

use bm25::{Embedder, EmbedderBuilder, Embedding, Scorer};
use tracing::{debug, info, instrument};

use docfuse_core::config::Bm25Settings;
use docfuse_core::error::{Error, Result};
use docfuse_core::types::{DocId, DocumentUnit, SearchHit};

use crate::tokenizer::Analyzer;

/// In-memory BM25 index over document units, backed by the `bm25` crate.
///
/// Created empty and not ready; [`LexicalIndex::build`] fits the embedder to
/// the corpus (average document length, `k1`, `b`) and loads every document
/// into a [`Scorer`]. Queries are read-only from then on.
pub struct LexicalIndex {
    params: Bm25Settings,
    analyzer: Analyzer,
    state: Option<Bm25State>,
}

struct Bm25State {
    /// Ascending, one per indexed document.
    ids: Vec<DocId>,
    embedder: Embedder<u32, Analyzer>,
    scorer: Scorer<DocId>,
}

impl LexicalIndex {
    pub fn new(params: Bm25Settings) -> Self {
        Self { params, analyzer: Analyzer::new(), state: None }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.analyzer.tokenize(text)
    }

    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexes `docs`, replacing any previous state.
    #[instrument(skip_all, fields(docs = docs.len()))]
    pub fn build(&mut self, docs: &[DocumentUnit]) {
        let total_tokens: usize = docs.iter().map(|d| self.analyzer.tokenize(&d.text).len()).sum();
        // avgdl must stay positive; a corpus without tokens scores 0 everywhere anyway.
        let avgdl = if total_tokens == 0 { 1.0 } else { total_tokens as f32 / docs.len() as f32 };

        let embedder = EmbedderBuilder::<u32, Analyzer>::with_avgdl(avgdl)
            .k1(self.params.k1)
            .b(self.params.b)
            .build();
        let mut scorer = Scorer::<DocId>::new();
        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            scorer.upsert(&doc.id, embedder.embed(&doc.text));
            ids.push(doc.id);
        }
        info!(docs = ids.len(), avgdl, "lexical index built");
        self.state = Some(Bm25State { ids, embedder, scorer });
    }

    /// Raw BM25 scores for every document, in ascending id order.
    ///
    /// A token absent from the corpus contributes nothing; repeated tokens
    /// count once per occurrence. An empty corpus yields an empty vector.
    pub fn score(&self, query_tokens: &[String]) -> Result<Vec<SearchHit>> {
        let state = self.state.as_ref().ok_or(Error::NotReady("lexical index"))?;

        let mut occurrences: BTreeMap<&str, f32> = BTreeMap::new();
        for token in query_tokens {
            *occurrences.entry(token.as_str()).or_insert(0.0) += 1.0;
        }
        let terms: Vec<(Embedding<u32>, f32)> = occurrences
            .into_iter()
            .map(|(token, count)| (state.embedder.embed(token), count))
            .collect();

        let hits = state
            .ids
            .iter()
            .map(|&id| {
                let score = terms
                    .iter()
                    .map(|(term, count)| count * state.scorer.score(&id, term).unwrap_or(0.0))
                    .sum();
                SearchHit { id, score }
            })
            .collect();
        Ok(hits)
    }

    /// The `n` highest-scoring documents, ties broken by lower id.
    pub fn top_n(&self, query_tokens: &[String], n: usize) -> Result<Vec<SearchHit>> {
        let scores = self.score(query_tokens)?;
        let top = top_hits(scores, n);
        debug!(tokens = query_tokens.len(), n, returned = top.len(), "lexical top-n");
        Ok(top)
    }
}

/// Orders hits by score descending then id ascending, keeping the first `n`.
pub fn top_hits(mut hits: Vec<SearchHit>, n: usize) -> Vec<SearchHit> {
    let cmp = |a: &SearchHit, b: &SearchHit| -> Ordering { b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)) };
    if n == 0 {
        return Vec::new();
    }
    if n < hits.len() {
        hits.select_nth_unstable_by(n - 1, cmp);
        hits.truncate(n);
    }
    hits.sort_unstable_by(cmp);
    hits
}
