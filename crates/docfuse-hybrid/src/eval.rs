//! Retrieval quality metrics against graded relevance judgements.
//!
//! Ground truth is a set of `(document_id, label)` pairs on the integer scale
//! `[label_min, label_max]`. Retrieved documents are ranked by score,
//! highest first, keeping input order among equal scores. A retrieved id with
//! no judgement counts as `label_min` and is reported as a hole.
//!
//! Ranking metrics look at the first three results:
//! - NDCG@3 uses gain `2^(l - min) - 1` and discount `log2(rank + 1)`.
//! - XDCG@3 scales labels to `[0, 100]` and discounts by `0.6^(rank - 1)`.
//!
//! Fidelity compares the gain of everything retrieved with the gain of the
//! full ground truth and is undefined when no judgement is above `label_min`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use docfuse_core::config::EvaluationSettings;
use docfuse_core::error::{Error, Result};
use docfuse_core::types::DocumentUnit;

use crate::retriever::RetrievedDocument;

const TOP_RANKS: usize = 3;
const XDCG_DECAY: f64 = 0.6;

/// A human or model judgement of how relevant a document is to the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceLabel {
    pub document_id: String,
    #[serde(alias = "query_relevance_label")]
    pub label: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document_id: String,
    #[serde(alias = "relevance_score")]
    pub score: f64,
}

/// `<source>#<page>`, the document id used to judge retrieved pages.
pub fn page_key(unit: &DocumentUnit) -> String {
    format!("{}#{}", unit.source, unit.page)
}

/// Retriever output keyed by [`page_key`] and scored by the fused score.
pub fn scored_documents(results: &[RetrievedDocument]) -> Vec<ScoredDocument> {
    results
        .iter()
        .map(|r| ScoredDocument { document_id: page_key(&r.document), score: f64::from(r.candidate.fused_score) })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric<T> {
    pub value: T,
    pub threshold: T,
    pub passed: bool,
}

impl<T: PartialOrd + Copy> Metric<T> {
    fn at_least(value: T, threshold: T) -> Self {
        Self { value, threshold, passed: value >= threshold }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalEvaluation {
    pub ndcg_at_3: Metric<f64>,
    pub xdcg_at_3: Metric<f64>,
    /// `None` when the ground truth carries no gain; never passes.
    pub fidelity: Metric<Option<f64>>,
    pub top1_relevance: Metric<u32>,
    pub top3_max_relevance: Metric<u32>,
    pub total_retrieved_documents: Metric<usize>,
    pub total_ground_truth_documents: Metric<usize>,
    pub holes: usize,
    pub holes_ratio: f64,
}

impl RetrievalEvaluation {
    pub fn passed(&self) -> bool {
        self.ndcg_at_3.passed
            && self.xdcg_at_3.passed
            && self.fidelity.passed
            && self.top1_relevance.passed
            && self.top3_max_relevance.passed
            && self.total_retrieved_documents.passed
            && self.total_ground_truth_documents.passed
    }
}

pub fn evaluate(
    ground_truth: &[RelevanceLabel],
    retrieved: &[ScoredDocument],
    settings: &EvaluationSettings,
) -> Result<RetrievalEvaluation> {
    let (min, max) = (settings.label_min, settings.label_max);
    if min >= max {
        return Err(Error::InvalidConfig(format!("label_min ({min}) must be below label_max ({max})")));
    }
    if ground_truth.is_empty() {
        return Err(Error::InvalidArgument("ground truth is empty".into()));
    }
    if retrieved.is_empty() {
        return Err(Error::InvalidArgument("no retrieved documents to evaluate".into()));
    }

    let mut labels: HashMap<&str, u32> = HashMap::with_capacity(ground_truth.len());
    for judgement in ground_truth {
        if !(min..=max).contains(&judgement.label) {
            return Err(Error::InvalidArgument(format!(
                "label {} for {} is outside [{min}, {max}]",
                judgement.label, judgement.document_id
            )));
        }
        if labels.insert(judgement.document_id.as_str(), judgement.label).is_some() {
            return Err(Error::InvalidArgument(format!("duplicate judgement for {}", judgement.document_id)));
        }
    }

    let mut seen = HashSet::with_capacity(retrieved.len());
    for doc in retrieved {
        if !doc.score.is_finite() {
            return Err(Error::InvalidArgument(format!("score for {} is not finite", doc.document_id)));
        }
        if !seen.insert(doc.document_id.as_str()) {
            return Err(Error::InvalidArgument(format!("{} retrieved more than once", doc.document_id)));
        }
    }

    let mut ranked: Vec<&ScoredDocument> = retrieved.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    let result_labels: Vec<u32> =
        ranked.iter().map(|d| labels.get(d.document_id.as_str()).copied().unwrap_or(min)).collect();
    let holes = ranked.iter().filter(|d| !labels.contains_key(d.document_id.as_str())).count();

    let mut ideal_labels: Vec<u32> = ground_truth.iter().map(|j| j.label).collect();
    ideal_labels.sort_unstable_by(|a, b| b.cmp(a));

    let gain = |label: u32| 2f64.powi((label - min) as i32) - 1.0;
    let dcg = |ls: &[u32]| -> f64 {
        ls.iter().take(TOP_RANKS).enumerate().map(|(i, &l)| gain(l) / ((i + 2) as f64).log2()).sum()
    };

    let ideal_dcg = dcg(&ideal_labels);
    let ndcg = if ideal_dcg > 0.0 { dcg(&result_labels) / ideal_dcg } else { 0.0 };

    let span = f64::from(max - min);
    let (weighted, weights) = result_labels.iter().take(TOP_RANKS).enumerate().fold((0.0, 0.0), |(num, den), (i, &l)| {
        let w = XDCG_DECAY.powi(i as i32);
        (num + w * 100.0 * f64::from(l - min) / span, den + w)
    });
    let xdcg = weighted / weights;

    let ideal_gain: f64 = ideal_labels.iter().map(|&l| gain(l)).sum();
    let fidelity = (ideal_gain > 0.0).then(|| result_labels.iter().map(|&l| gain(l)).sum::<f64>() / ideal_gain);
    let fidelity_threshold = f64::from(settings.fidelity_threshold);

    let top1 = result_labels[0];
    let top3_max = result_labels.iter().take(TOP_RANKS).copied().max().unwrap_or(min);

    debug!(retrieved = ranked.len(), judged = ground_truth.len(), holes, ndcg, "retrieval evaluated");
    Ok(RetrievalEvaluation {
        ndcg_at_3: Metric::at_least(ndcg, f64::from(settings.ndcg_threshold)),
        xdcg_at_3: Metric::at_least(xdcg, f64::from(settings.xdcg_threshold)),
        fidelity: Metric {
            value: fidelity,
            threshold: Some(fidelity_threshold),
            passed: fidelity.is_some_and(|f| f >= fidelity_threshold),
        },
        top1_relevance: Metric::at_least(top1, settings.top1_relevance_threshold),
        top3_max_relevance: Metric::at_least(top3_max, settings.top3_max_relevance_threshold),
        total_retrieved_documents: Metric::at_least(ranked.len(), settings.total_retrieved_documents_threshold),
        total_ground_truth_documents: Metric::at_least(
            ground_truth.len(),
            settings.total_ground_truth_documents_threshold,
        ),
        holes,
        holes_ratio: holes as f64 / ranked.len() as f64,
    })
}
