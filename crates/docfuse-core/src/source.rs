//! Document source over a directory of paged text files.
//!
//! `report.txt` holds the structured extraction with pages separated by
//! `data.page_separator` (form feed by default, as `pdftotext` emits). An
//! optional sidecar `report.ocr.txt` holds the OCR pass, split the same way.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DataSettings;
use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::PageText;

#[derive(Debug, Clone)]
pub struct PagedTextFile {
    source_id: String,
    path: PathBuf,
    ocr_path: PathBuf,
    separator: String,
}

impl PagedTextFile {
    /// `source_id` is `path` relative to `root`.
    pub fn new(root: &Path, path: &Path, settings: &DataSettings) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let ocr_path = path.with_file_name(format!("{}{}", stem, settings.ocr_suffix));
        Self {
            source_id: relative.to_string_lossy().to_string(),
            path: path.to_path_buf(),
            ocr_path,
            separator: settings.page_separator.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for PagedTextFile {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn structured_pages(&self) -> anyhow::Result<Vec<PageText>> {
        let content = read_file_content(&self.path)?;
        Ok(split_pages(&content, &self.separator))
    }

    fn ocr_pages(&self) -> anyhow::Result<Vec<PageText>> {
        if !self.ocr_path.is_file() {
            return Ok(Vec::new());
        }
        let content = read_file_content(&self.ocr_path)?;
        Ok(split_pages(&content, &self.separator))
    }
}

/// All primary text files under a directory, sorted by path.
#[derive(Debug, Clone)]
pub struct TextDirectory {
    files: Vec<PagedTextFile>,
}

impl TextDirectory {
    pub fn scan(root: &Path, settings: &DataSettings) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("source directory {}", root.display())));
        }
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if name.ends_with(&settings.ocr_suffix) {
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) == Some("txt") {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        debug!(root = %root.display(), files = paths.len(), "scanned source directory");
        let files = paths.iter().map(|p| PagedTextFile::new(root, p, settings)).collect();
        Ok(Self { files })
    }

    pub fn sources(&self) -> &[PagedTextFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn read_file_content(path: &Path) -> anyhow::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn split_pages(content: &str, separator: &str) -> Vec<PageText> {
    content
        .split(separator)
        .enumerate()
        .map(|(i, text)| PageText::new(i + 1, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_empty_pages_in_position() {
        let pages = split_pages("a\u{c}\u{c}c", "\u{c}");
        let texts: Vec<&str> = pages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "", "c"]);
        assert_eq!(pages[2].index, 3);
    }
}
