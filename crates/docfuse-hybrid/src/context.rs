use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use docfuse_core::error::{Error, Result};
use docfuse_core::traits::AnswerGenerator;
use docfuse_core::types::{CitedPassage, DocumentUnit};

use crate::retriever::{RetrieveOptions, RetrievedDocument, Retriever};

const PROMPT_PREAMBLE: &str = "Answer the question using the context below and provide sources for each point:";

/// `[<source>, Page <page>]`
pub fn citation_label(unit: &DocumentUnit) -> String {
    format!("[{}, Page {}]", unit.source, unit.page)
}

pub fn cited_passages(results: &[RetrievedDocument]) -> Vec<CitedPassage> {
    results
        .iter()
        .map(|r| CitedPassage { text: r.document.text.clone(), citation: citation_label(&r.document) })
        .collect()
}

/// Renders the grounded prompt: preamble, one `text\ncitation` block per
/// passage separated by blank lines, then the question.
pub fn grounded_prompt(query: &str, passages: &[CitedPassage]) -> String {
    let context = passages
        .iter()
        .map(|p| format!("{}\n{}", p.text, p.citation))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {query}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<CitedPassage>,
}

/// Retrieval followed by answer generation over the cited passages.
pub struct RagPipeline<G: AnswerGenerator> {
    retriever: Arc<Retriever>,
    generator: G,
}

impl<G: AnswerGenerator> RagPipeline<G> {
    pub fn new(retriever: Arc<Retriever>, generator: G) -> Self {
        Self { retriever, generator }
    }

    #[instrument(skip_all, fields(k = options.k))]
    pub fn answer(&self, query: &str, options: &RetrieveOptions) -> Result<Answer> {
        let results = self.retriever.retrieve(query, options)?;
        let sources = cited_passages(&results);
        let text = self
            .generator
            .generate(query, &sources)
            .map_err(|e| Error::Generation(format!("{e:#}")))?;
        info!(sources = sources.len(), "answer generated");
        Ok(Answer { text, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfuse_core::types::DocId;

    fn passage(text: &str, source: &str, page: usize) -> CitedPassage {
        let unit = DocumentUnit { id: DocId(0), text: text.into(), source: source.into(), page };
        CitedPassage { text: unit.text.clone(), citation: citation_label(&unit) }
    }

    #[test]
    fn citation_names_source_and_page() {
        let p = passage("x", "handbook.pdf", 2);
        assert_eq!(p.citation, "[handbook.pdf, Page 2]");
    }

    #[test]
    fn prompt_lists_passages_then_question() {
        let passages = vec![passage("alpha text", "a.pdf", 1), passage("beta text", "b.pdf", 3)];
        let prompt = grounded_prompt("what is beta?", &passages);
        assert_eq!(
            prompt,
            "Answer the question using the context below and provide sources for each point:\n\n\
             alpha text\n[a.pdf, Page 1]\n\n\
             beta text\n[b.pdf, Page 3]\n\n\
             Question: what is beta?"
        );
    }
}
