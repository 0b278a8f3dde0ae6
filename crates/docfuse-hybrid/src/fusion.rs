//! Weighted score fusion with membership gating.
//!
//! Each sub-score only counts for documents its own index ranked in its top
//! set: a lexical score for an id outside the lexical top set contributes 0,
//! and likewise for the vector side. Lexical scores are min-max normalised
//! over the whole score vector; semantic scores are `1 - distance` as is.
//!
//! Semantic scores go negative once a squared distance exceeds 1. At
//! `alpha = 1` an id found only by the lexical side fuses to 0 and therefore
//! ranks above such distant vector hits.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use docfuse_core::error::{Error, Result};
use docfuse_core::types::{Candidate, DocId, Neighbor, SearchHit};

/// Keeps min-max normalisation finite when every score is equal.
pub const NORMALIZATION_EPSILON: f32 = 1e-6;

/// `(s - min) / (max - min + ε)` for every score.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = scores.iter().copied().fold(min, f32::max);
    let range = max - min + NORMALIZATION_EPSILON;
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Fuses lexical and vector results into at most `k` ranked candidates.
///
/// - `lexical_scores`: raw BM25 scores for the whole corpus
/// - `lexical_top`: ids the lexical index ranked in its top set
/// - `vector_results`: `(id, distance)` pairs from the vector index
/// - `vector_top`: ids the vector index ranked in its top set
///
/// Candidates are the union of both top sets, scored
/// `alpha * semantic + (1 - alpha) * lexical` and ordered by fused score
/// descending, then id ascending.
pub fn fuse(
    lexical_scores: &[SearchHit],
    lexical_top: &HashSet<DocId>,
    vector_results: &[Neighbor],
    vector_top: &HashSet<DocId>,
    alpha: f32,
    k: usize,
) -> Result<Vec<Candidate>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(Error::InvalidArgument(format!("alpha must be in [0, 1], got {alpha}")));
    }

    let raw: Vec<f32> = lexical_scores.iter().map(|h| h.score).collect();
    let normalized: HashMap<DocId, f32> = lexical_scores
        .iter()
        .zip(min_max_normalize(&raw))
        .map(|(hit, norm)| (hit.id, norm))
        .collect();

    let mut distances: HashMap<DocId, f32> = HashMap::with_capacity(vector_results.len());
    for n in vector_results {
        distances.entry(n.id).or_insert(n.distance);
    }

    let pool: BTreeSet<DocId> = lexical_top.union(vector_top).copied().collect();
    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .map(|id| {
            let semantic_score = if vector_top.contains(&id) { distances.get(&id).map(|d| 1.0 - d) } else { None };
            let lexical_score = if lexical_top.contains(&id) { normalized.get(&id).copied().unwrap_or(0.0) } else { 0.0 };
            let fused_score = alpha * semantic_score.unwrap_or(0.0) + (1.0 - alpha) * lexical_score;
            Candidate { id, semantic_score, lexical_score, fused_score }
        })
        .collect();

    candidates.sort_by(compare_fused);
    candidates.truncate(k);
    debug!(
        lexical_top = lexical_top.len(),
        vector_top = vector_top.len(),
        returned = candidates.len(),
        alpha,
        "fused candidates"
    );
    Ok(candidates)
}

fn compare_fused(a: &Candidate, b: &Candidate) -> Ordering {
    b.fused_score.total_cmp(&a.fused_score).then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(scores: &[(u64, f32)]) -> Vec<SearchHit> {
        scores.iter().map(|&(id, score)| SearchHit { id: DocId(id), score }).collect()
    }

    fn neighbors(distances: &[(u64, f32)]) -> Vec<Neighbor> {
        distances.iter().map(|&(id, distance)| Neighbor { id: DocId(id), distance }).collect()
    }

    fn set(ids: &[u64]) -> HashSet<DocId> {
        ids.iter().map(|&id| DocId(id)).collect()
    }

    fn order(candidates: &[Candidate]) -> Vec<u64> {
        candidates.iter().map(|c| c.id.as_u64()).collect()
    }

    #[test]
    fn gated_fusion_worked_example() {
        // Doc 4 anchors the max so normalised lexical scores are ~{0.2, 0.8, 0.0}.
        let lexical = hits(&[(1, 0.2), (2, 0.8), (3, 0.0), (4, 1.0)]);
        let vector = neighbors(&[(1, 0.1), (3, 0.6)]);
        let fused = fuse(&lexical, &set(&[2, 3]), &vector, &set(&[1, 3]), 0.5, 3).expect("fuse");

        assert_eq!(order(&fused), vec![1, 2, 3]);
        let expected = [0.45f32, 0.4, 0.2];
        for (c, want) in fused.iter().zip(expected) {
            assert!((c.fused_score - want).abs() < 1e-4, "{:?} vs {want}", c);
        }
        assert_eq!(fused[0].lexical_score, 0.0, "id 1 is outside the lexical top set");
        assert_eq!(fused[1].semantic_score, None, "id 2 is outside the vector top set");
    }

    #[test]
    fn alpha_one_ranks_by_distance() {
        let lexical = hits(&[(0, 9.0), (1, 1.0), (2, 5.0), (3, 0.0)]);
        let vector = neighbors(&[(3, 0.05), (1, 0.2), (2, 0.7)]);
        let fused = fuse(&lexical, &set(&[0, 2]), &vector, &set(&[3, 1, 2]), 1.0, 4).expect("fuse");
        assert_eq!(order(&fused), vec![3, 1, 2, 0]);
    }

    #[test]
    fn lexical_only_id_outranks_distant_vector_hits_at_alpha_one() {
        let lexical = hits(&[(0, 5.0), (1, 0.0), (2, 0.0)]);
        let vector = neighbors(&[(1, 1.5), (2, 3.0)]);
        let fused = fuse(&lexical, &set(&[0]), &vector, &set(&[1, 2]), 1.0, 3).expect("fuse");

        assert_eq!(order(&fused), vec![0, 1, 2]);
        assert_eq!(fused[0].semantic_score, None);
        assert_eq!(fused[0].fused_score, 0.0);
        assert!((fused[1].fused_score + 0.5).abs() < 1e-6);
        assert!((fused[2].fused_score + 2.0).abs() < 1e-6);
    }

    #[test]
    fn alpha_zero_ranks_by_gated_lexical_score() {
        let lexical = hits(&[(0, 9.0), (1, 1.0), (2, 5.0), (3, 0.0)]);
        let vector = neighbors(&[(3, 0.05), (1, 0.2)]);
        let fused = fuse(&lexical, &set(&[0, 2]), &vector, &set(&[3, 1]), 0.0, 4).expect("fuse");
        assert_eq!(order(&fused), vec![0, 2, 1, 3], "ungated ids tie at 0 and fall back to id order");
    }

    #[test]
    fn result_is_truncated_to_k_and_deterministic() {
        let lexical = hits(&[(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)]);
        let vector = neighbors(&[(0, 0.5), (1, 0.5), (2, 0.5), (3, 0.5)]);
        let run = || fuse(&lexical, &set(&[0, 1, 2, 3]), &vector, &set(&[3, 2, 1, 0]), 0.3, 2).expect("fuse");
        let first = run();
        assert_eq!(order(&first), vec![0, 1]);
        assert_eq!(first, run());
        assert!(fuse(&lexical, &set(&[0]), &vector, &set(&[0]), 0.3, 0).expect("fuse").is_empty());
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        let fused = fuse(&[], &HashSet::new(), &[], &HashSet::new(), 0.5, 3).expect("fuse");
        assert!(fused.is_empty());
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        for alpha in [-0.1f32, 1.1, f32::NAN] {
            let err = fuse(&[], &HashSet::new(), &[], &HashSet::new(), alpha, 3).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn min_max_maps_extremes_to_unit_interval() {
        let norm = min_max_normalize(&[3.0, -1.0, 7.0, 2.0]);
        assert!(norm.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(norm[1], 0.0);
        assert!((norm[2] - 1.0).abs() < 1e-6);
        assert!((norm[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn min_max_of_constant_scores_is_zero() {
        assert_eq!(min_max_normalize(&[2.5, 2.5]), vec![0.0, 0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }
}
