//! docfuse-vector
//!
//! Exact (flat) nearest-neighbour index over dense embeddings, held in
//! memory. Positions map straight back to document ids without any scan.

pub mod index;

pub use index::{squared_l2, VectorIndex};
