//! Page-level document store.
//!
//! Each source document arrives as two page sequences, one from structured
//! extraction and one from OCR. [`merge_pages`] pairs them by position and
//! [`DocumentStore`] stamps the surviving pages with ids and provenance.
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::{DocId, DocumentUnit, PageText};

/// Pairs structured and OCR pages by position into `(page, text)`.
///
/// The page count is the length of the longer sequence and a missing side
/// reads as an empty string. Text is `structured + "\n" + ocr`; pages whose
/// merged text is blank after trimming are dropped.
pub fn merge_pages(structured: &[PageText], ocr: &[PageText]) -> Vec<(usize, String)> {
    let page_count = structured.len().max(ocr.len());
    let mut pages = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let structured_text = structured.get(i).map_or("", |p| p.text.as_str());
        let ocr_text = ocr.get(i).map_or("", |p| p.text.as_str());
        let merged = format!("{structured_text}\n{ocr_text}");
        if merged.trim().is_empty() {
            debug!(page = i + 1, "dropping blank page");
            continue;
        }
        pages.push((i + 1, merged));
    }
    pages
}

/// In-memory collection of [`DocumentUnit`]s.
///
/// Ids come from a counter owned by the store: they increase with every unit
/// appended, across sources, and are never reused. Units are immutable once
/// stored; rebuilding means starting a new store.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    units: Vec<DocumentUnit>,
    next_id: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one source document's pages and appends the non-blank ones.
    /// Returns the number of units added.
    pub fn ingest_pages(&mut self, source: &str, structured: &[PageText], ocr: &[PageText]) -> usize {
        let merged = merge_pages(structured, ocr);
        let added = merged.len();
        for (page, text) in merged {
            let id = DocId(self.next_id);
            self.next_id += 1;
            self.units.push(DocumentUnit { id, text, source: source.to_string(), page });
        }
        debug!(source, added, dropped = structured.len().max(ocr.len()) - added, "ingested pages");
        added
    }

    /// Pulls both page sequences from `source` and ingests them.
    #[instrument(skip_all, fields(source = source.source_id()))]
    pub fn ingest_source(&mut self, source: &dyn DocumentSource) -> Result<usize> {
        let structured = source
            .structured_pages()
            .map_err(|e| Error::Source(format!("{}: structured extraction: {e:#}", source.source_id())))?;
        let ocr = source
            .ocr_pages()
            .map_err(|e| Error::Source(format!("{}: OCR: {e:#}", source.source_id())))?;
        let added = self.ingest_pages(source.source_id(), &structured, &ocr);
        info!(added, total = self.units.len(), "source ingested");
        Ok(added)
    }

    pub fn get(&self, id: DocId) -> Option<&DocumentUnit> {
        // Units are appended with increasing ids, so the vector is sorted.
        self.units
            .binary_search_by_key(&id, |u| u.id)
            .ok()
            .map(|pos| &self.units[pos])
    }

    pub fn units(&self) -> &[DocumentUnit] {
        &self.units
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
