//! docfuse-core
//!
//! Data model, error taxonomy, collaborator traits, the page-level document
//! store and layered configuration shared by the other docfuse crates.

pub mod config;
pub mod error;
pub mod source;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
