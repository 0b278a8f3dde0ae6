//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_RETRIEVAL__ALPHA=0.7`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Loads from the working directory, picking the env file from `RUST_ENV`.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(Path::new("."), &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the typed settings.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub bm25: Bm25Settings,
    pub embedding: EmbeddingSettings,
    pub data: DataSettings,
    pub evaluation: EvaluationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub alpha: f32,
    pub candidate_factor: usize,
    /// Fuse with lexical scores only when the query embedding fails.
    pub lexical_fallback: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, alpha: 0.5, candidate_factor: 2, lexical_fallback: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Settings {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Settings {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dimension: 384, batch_size: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub source_dir: String,
    pub page_separator: String,
    pub ocr_suffix: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            source_dir: "./data".to_string(),
            page_separator: "\u{c}".to_string(),
            ocr_suffix: ".ocr.txt".to_string(),
        }
    }
}

/// Graded-relevance scale and pass thresholds for retrieval evaluation.
///
/// Labels run from `label_min` (irrelevant) to `label_max`. A metric passes
/// when its value is at least its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub label_min: u32,
    pub label_max: u32,
    pub ndcg_threshold: f32,
    pub xdcg_threshold: f32,
    pub fidelity_threshold: f32,
    pub top1_relevance_threshold: u32,
    pub top3_max_relevance_threshold: u32,
    pub total_retrieved_documents_threshold: usize,
    pub total_ground_truth_documents_threshold: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            label_min: 0,
            label_max: 4,
            ndcg_threshold: 0.3,
            xdcg_threshold: 30.0,
            fidelity_threshold: 0.3,
            top1_relevance_threshold: 2,
            top3_max_relevance_threshold: 3,
            total_retrieved_documents_threshold: 5,
            total_ground_truth_documents_threshold: 5,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.alpha) {
            return Err(Error::InvalidConfig(format!("retrieval.alpha must be in [0, 1], got {}", r.alpha)));
        }
        if r.candidate_factor == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_factor must be at least 1".into()));
        }
        if self.bm25.k1 < 0.0 {
            return Err(Error::InvalidConfig(format!("bm25.k1 must be non-negative, got {}", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::InvalidConfig(format!("bm25.b must be in [0, 1], got {}", self.bm25.b)));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.data.page_separator.is_empty() {
            return Err(Error::InvalidConfig("data.page_separator must not be empty".into()));
        }
        if self.data.ocr_suffix.is_empty() {
            // Every file name ends with "", so scanning would treat all files as sidecars.
            return Err(Error::InvalidConfig("data.ocr_suffix must not be empty".into()));
        }
        let e = &self.evaluation;
        if e.label_min >= e.label_max {
            return Err(Error::InvalidConfig(format!(
                "evaluation.label_min ({}) must be below evaluation.label_max ({})",
                e.label_min, e.label_max
            )));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
