use std::fs;
use tempfile::TempDir;

use docfuse_core::config::{Config, DataSettings, Settings};
use docfuse_core::source::TextDirectory;
use docfuse_core::store::DocumentStore;
use docfuse_core::traits::DocumentSource;
use docfuse_core::types::PageText;
use docfuse_core::Error;

fn pages(texts: &[&str]) -> Vec<PageText> {
    texts.iter().enumerate().map(|(i, t)| PageText::new(i + 1, *t)).collect()
}

#[test]
fn structured_and_ocr_pages_merge_into_two_units() {
    let mut store = DocumentStore::new();
    let added = store.ingest_pages("manual.pdf", &pages(&["A", "", ""]), &pages(&["", "B"]));

    assert_eq!(added, 2, "page 3 is blank on both sides");
    assert_eq!(store.len(), 2);
    let units = store.units();
    assert_eq!((units[0].text.as_str(), units[0].page), ("A\n", 1));
    assert_eq!((units[1].text.as_str(), units[1].page), ("\nB", 2));
    assert!(units.iter().all(|u| u.source == "manual.pdf"));
}

#[test]
fn text_directory_pairs_primary_files_with_ocr_sidecars() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("policies")).unwrap();
    fs::write(dir.join("policies/handbook.txt"), "intro page\u{c}\u{c}").unwrap();
    fs::write(dir.join("policies/handbook.ocr.txt"), "\u{c}scanned table").unwrap();
    fs::write(dir.join("notes.txt"), "loose notes").unwrap();
    fs::write(dir.join("ignored.md"), "not a text source").unwrap();

    let settings = DataSettings::default();
    let directory = TextDirectory::scan(dir, &settings).expect("scan");
    let ids: Vec<&str> = directory.sources().iter().map(|s| s.source_id()).collect();
    assert_eq!(ids.len(), 2, "sidecars and non-txt files are not sources");
    assert!(ids.contains(&"notes.txt"));

    let mut store = DocumentStore::new();
    for source in directory.sources() {
        store.ingest_source(source).expect("ingest");
    }
    let handbook: Vec<_> = store.iter().filter(|u| u.source.ends_with("handbook.txt")).collect();
    assert_eq!(handbook.len(), 2);
    assert_eq!(handbook[0].text, "intro page\n");
    assert_eq!(handbook[1].text, "\nscanned table");
    assert_eq!(handbook[1].page, 2);
}

#[test]
fn scanning_a_missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = TextDirectory::scan(&tmp.path().join("nope"), &DataSettings::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn failing_source_surfaces_as_source_error() {
    struct Broken;
    impl DocumentSource for Broken {
        fn source_id(&self) -> &str { "broken.pdf" }
        fn structured_pages(&self) -> anyhow::Result<Vec<PageText>> { Ok(vec![PageText::new(1, "ok")]) }
        fn ocr_pages(&self) -> anyhow::Result<Vec<PageText>> { Err(anyhow::anyhow!("ocr service timed out")) }
    }
    let mut store = DocumentStore::new();
    let err = store.ingest_source(&Broken).unwrap_err();
    assert!(matches!(err, Error::Source(ref msg) if msg.contains("timed out")));
    assert!(store.is_empty(), "nothing is ingested from a failed source");
}

#[test]
fn config_files_override_defaults_per_environment() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("config.toml"), "[retrieval]\ntop_k = 5\n\n[bm25]\nk1 = 1.2\n").unwrap();
    fs::write(dir.join("config.test.toml"), "[retrieval]\nalpha = 0.7\n").unwrap();

    let settings = Config::load_for_env(dir, "test").expect("load").settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 5);
    assert!((settings.retrieval.alpha - 0.7).abs() < 1e-6);
    assert_eq!(settings.retrieval.candidate_factor, 2, "unset keys keep defaults");
    assert!((settings.bm25.k1 - 1.2).abs() < 1e-6);
    assert!((settings.bm25.b - 0.75).abs() < 1e-6);

    let dev = Config::load_for_env(dir, "dev").expect("load").settings().expect("settings");
    assert!((dev.retrieval.alpha - 0.5).abs() < 1e-6, "test overrides do not leak into dev");
}

#[test]
fn out_of_range_alpha_is_rejected() {
    let mut settings = Settings::default();
    settings.validate().expect("defaults are valid");
    settings.retrieval.alpha = 1.5;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    settings.retrieval.alpha = 0.5;
    settings.retrieval.candidate_factor = 0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn empty_file_name_settings_are_rejected() {
    let mut settings = Settings::default();
    settings.data.ocr_suffix = String::new();
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(ref msg)) if msg.contains("ocr_suffix")));

    let mut settings = Settings::default();
    settings.data.page_separator = String::new();
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(ref msg)) if msg.contains("page_separator")));
}

#[test]
fn evaluation_section_layers_and_validates() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[evaluation]\nlabel_max = 3\nndcg_threshold = 0.5\n").unwrap();

    let settings = Config::load_for_env(tmp.path(), "dev").expect("load").settings().expect("settings");
    assert_eq!(settings.evaluation.label_min, 0);
    assert_eq!(settings.evaluation.label_max, 3);
    assert!((settings.evaluation.ndcg_threshold - 0.5).abs() < 1e-6);
    assert_eq!(settings.evaluation.total_retrieved_documents_threshold, 5, "unset keys keep defaults");

    let mut inverted = Settings::default();
    inverted.evaluation.label_min = 4;
    assert!(matches!(inverted.validate(), Err(Error::InvalidConfig(ref msg)) if msg.contains("label_min")));
}
