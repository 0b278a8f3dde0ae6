//! `docfuse` - ingest a directory of paged text files and query it with
//! hybrid BM25 + vector retrieval.
//!
//! ```bash
//! docfuse --dir ./data stats
//! docfuse search "internal use only" -k 5 --alpha 0.7
//! docfuse search "expense policy" --json
//! docfuse context "what is the expense policy?"
//! docfuse evaluate "expense policy" --labels judgements.json
//! ```
//!
//! Every invocation rebuilds the indexes in memory from the source directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docfuse_core::config::{resolve_with_base, Config, Settings};
use docfuse_core::source::TextDirectory;
use docfuse_core::store::DocumentStore;
use docfuse_embed::get_default_embedder;
use docfuse_hybrid::{
    cited_passages, citation_label, evaluate, grounded_prompt, scored_documents, RelevanceLabel, RetrieveOptions,
    RetrievedDocument, Retriever,
};

#[derive(Parser)]
#[command(name = "docfuse", version, about = "Hybrid lexical + semantic retrieval over paged text")]
struct Cli {
    /// Source directory (default: data.source_dir from config)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest and index the directory, then report what was found
    Stats,
    /// Retrieve the best-matching pages for a query
    Search {
        query: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the grounded prompt an answer generator would receive
    Context {
        query: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Grade a query's ranking against relevance judgements
    Evaluate {
        query: String,
        /// JSON array of {"document_id": "<source>#<page>", "label": N}
        #[arg(long)]
        labels: PathBuf,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
}

/// Overrides for the `[retrieval]` config section.
#[derive(Args, Debug, Default)]
struct RetrievalArgs {
    /// Number of results
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    /// Semantic weight in [0, 1]; lexical gets the rest
    #[arg(long)]
    alpha: Option<f32>,
    /// Candidates taken from each index per requested result
    #[arg(long)]
    candidate_factor: Option<usize>,
    /// Fall back to lexical-only ranking if the query cannot be embedded
    #[arg(long)]
    lexical_fallback: bool,
}

impl RetrievalArgs {
    fn options(&self, settings: &Settings) -> RetrieveOptions {
        let mut opts = RetrieveOptions::from(&settings.retrieval);
        if let Some(k) = self.top_k {
            opts.k = k;
        }
        if let Some(alpha) = self.alpha {
            opts.alpha = alpha;
        }
        if let Some(factor) = self.candidate_factor {
            opts.candidate_factor = factor;
        }
        opts.lexical_fallback |= self.lexical_fallback;
        opts
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docfuse=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => resolve_with_base(Path::new("."), &settings.data.source_dir),
    };

    match &cli.command {
        Command::Stats => {
            let (sources, store) = ingest(&dir, &settings)?;
            let retriever = build_retriever(store, &settings)?;
            let snapshot = retriever.snapshot()?;
            let dim = snapshot.vector().dim().map_or_else(|| "-".to_string(), |d| d.to_string());
            println!("Directory: {}", dir.display());
            println!("Sources:   {sources}");
            println!("Pages:     {}", snapshot.store().len());
            println!("Lexical:   {} documents", snapshot.lexical().len());
            println!("Vector:    {} documents, dim {dim}", snapshot.vector().len());
        }
        Command::Search { query, retrieval, json } => {
            let options = retrieval.options(&settings);
            let results = run_query(&dir, &settings, query, &options)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(query, &results);
            }
        }
        Command::Context { query, retrieval } => {
            let options = retrieval.options(&settings);
            let results = run_query(&dir, &settings, query, &options)?;
            println!("{}", grounded_prompt(query, &cited_passages(&results)));
        }
        Command::Evaluate { query, labels, retrieval } => {
            let raw = std::fs::read_to_string(labels).with_context(|| format!("reading {}", labels.display()))?;
            let judgements: Vec<RelevanceLabel> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", labels.display()))?;
            let options = retrieval.options(&settings);
            let results = run_query(&dir, &settings, query, &options)?;
            let evaluation = evaluate(&judgements, &scored_documents(&results), &settings.evaluation)?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
            if !evaluation.passed() {
                warn!(query = %query, "retrieval evaluation below threshold");
            }
        }
    }
    Ok(())
}

/// Reads every source under `dir` into a fresh store. Returns the source count too.
fn ingest(dir: &Path, settings: &Settings) -> Result<(usize, DocumentStore)> {
    let directory = TextDirectory::scan(dir, &settings.data)
        .with_context(|| format!("scanning {}", dir.display()))?;
    if directory.is_empty() {
        warn!(dir = %dir.display(), "no text files found");
    }

    let pb = ProgressBar::new(directory.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sources {msg}")?
            .progress_chars("#>-"),
    );
    let mut store = DocumentStore::new();
    for source in directory.sources() {
        pb.set_message(source.path().display().to_string());
        store.ingest_source(source)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(sources = directory.len(), units = store.len(), "ingestion complete");
    Ok((directory.len(), store))
}

fn build_retriever(store: DocumentStore, settings: &Settings) -> Result<Retriever> {
    let embedder = get_default_embedder(&settings.embedding)?;
    let retriever = Retriever::new(Arc::from(embedder));
    retriever
        .rebuild(store, settings.bm25.clone(), settings.embedding.batch_size)
        .context("building indexes")?;
    Ok(retriever)
}

fn run_query(dir: &Path, settings: &Settings, query: &str, options: &RetrieveOptions) -> Result<Vec<RetrievedDocument>> {
    let (_, store) = ingest(dir, settings)?;
    let retriever = build_retriever(store, settings)?;
    Ok(retriever.retrieve(query, options)?)
}

fn print_results(query: &str, results: &[RetrievedDocument]) {
    if results.is_empty() {
        println!("No results for \"{query}\"");
        return;
    }
    println!("{:>4}  {:>7}  {:>8}  {:>7}  SOURCE", "RANK", "FUSED", "SEMANTIC", "LEXICAL");
    for (rank, r) in results.iter().enumerate() {
        let semantic = r.candidate.semantic_score.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
        println!(
            "{:>4}  {:>7.4}  {:>8}  {:>7.4}  {}",
            rank + 1,
            r.candidate.fused_score,
            semantic,
            r.candidate.lexical_score,
            citation_label(&r.document)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configured_retrieval() {
        let settings = Settings::default();
        let args = RetrievalArgs { top_k: Some(7), alpha: Some(0.9), candidate_factor: None, lexical_fallback: true };
        let opts = args.options(&settings);
        assert_eq!(opts.k, 7);
        assert_eq!(opts.alpha, 0.9);
        assert_eq!(opts.candidate_factor, settings.retrieval.candidate_factor);
        assert!(opts.lexical_fallback);

        assert_eq!(RetrievalArgs::default().options(&settings), RetrieveOptions::from(&settings.retrieval));
    }

    #[test]
    fn cli_parses_global_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["docfuse", "search", "badge access", "-k", "2", "--dir", "/tmp/docs", "--json"])
            .expect("parses");
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/docs")));
        match cli.command {
            Command::Search { query, retrieval, json } => {
                assert_eq!(query, "badge access");
                assert_eq!(retrieval.top_k, Some(2));
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn evaluate_takes_a_labels_file() {
        let cli = Cli::try_parse_from(["docfuse", "evaluate", "badge access", "--labels", "judged.json", "--alpha", "0.2"])
            .expect("parses");
        match cli.command {
            Command::Evaluate { query, labels, retrieval } => {
                assert_eq!(query, "badge access");
                assert_eq!(labels, PathBuf::from("judged.json"));
                assert_eq!(retrieval.alpha, Some(0.2));
            }
            _ => panic!("expected evaluate"),
        }
        assert!(Cli::try_parse_from(["docfuse", "evaluate", "badge access"]).is_err());
    }
}
