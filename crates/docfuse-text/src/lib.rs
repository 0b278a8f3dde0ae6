//! docfuse-text
//!
//! In-memory BM25 lexical index over document units. Tokenization goes
//! through one tantivy analyzer shared by build and query paths.

pub mod index;
pub mod tokenizer;

pub use index::{top_hits, LexicalIndex};
pub use tokenizer::Analyzer;
