use std::cmp::Ordering;

use tracing::{debug, info, instrument};

use docfuse_core::error::{Error, Result};
use docfuse_core::types::{DocId, Neighbor};

/// Exact nearest-neighbour index over fixed-dimension vectors.
///
/// Vectors are stored row-major in one buffer; row `i` belongs to `ids[i]`.
/// The mapping is fixed at build time and only a rebuild renumbers it.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    state: Option<FlatState>,
}

#[derive(Debug, Clone)]
struct FlatState {
    dim: usize,
    ids: Vec<DocId>,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// Dimensionality fixed at build time; `None` before build or when empty.
    pub fn dim(&self) -> Option<usize> {
        self.state.as_ref().filter(|s| !s.ids.is_empty()).map(|s| s.dim)
    }

    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `vectors[i]` for `ids[i]`, replacing any previous contents.
    ///
    /// Fails if the counts differ or the vectors are not all the same length;
    /// the index is left untouched on failure.
    #[instrument(skip_all, fields(count = vectors.len()))]
    pub fn build(&mut self, ids: &[DocId], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::InvalidArgument(format!(
                "{} vectors supplied for {} documents",
                vectors.len(),
                ids.len()
            )));
        }
        let dim = vectors.first().map_or(0, Vec::len);
        if dim == 0 && !vectors.is_empty() {
            return Err(Error::InvalidArgument("vectors must have at least one dimension".into()));
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for v in vectors {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            data.extend_from_slice(v);
        }
        info!(count = ids.len(), dim, "vector index built");
        self.state = Some(FlatState { dim, ids: ids.to_vec(), data });
        Ok(())
    }

    /// The `n` nearest documents by squared Euclidean distance, closest first.
    ///
    /// Ties break by lower id. An empty index returns no neighbours for any
    /// query; otherwise the query must match the build dimensionality.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<Neighbor>> {
        let state = self.state.as_ref().ok_or(Error::NotReady("vector index"))?;
        if state.ids.is_empty() || n == 0 {
            return Ok(Vec::new());
        }
        if query.len() != state.dim {
            return Err(Error::DimensionMismatch { expected: state.dim, actual: query.len() });
        }

        let mut neighbors: Vec<Neighbor> = state
            .data
            .chunks_exact(state.dim)
            .zip(state.ids.iter())
            .map(|(row, &id)| Neighbor { id, distance: squared_l2(row, query) })
            .collect();

        let cmp = |a: &Neighbor, b: &Neighbor| -> Ordering { a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)) };
        if n < neighbors.len() {
            neighbors.select_nth_unstable_by(n - 1, cmp);
            neighbors.truncate(n);
        }
        neighbors.sort_unstable_by(cmp);
        debug!(n, returned = neighbors.len(), "vector search");
        Ok(neighbors)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
