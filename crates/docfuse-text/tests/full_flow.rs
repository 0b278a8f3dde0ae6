use docfuse_core::config::Bm25Settings;
use docfuse_core::store::DocumentStore;
use docfuse_core::types::PageText;
use docfuse_text::LexicalIndex;

fn pages(texts: &[&str]) -> Vec<PageText> {
    texts.iter().enumerate().map(|(i, t)| PageText::new(i + 1, *t)).collect()
}

#[test]
fn lexical_full_flow() {
    let mut store = DocumentStore::new();
    store.ingest_pages(
        "handbook.pdf",
        &pages(&["Expense policy: receipts are required for travel.", "Badge access is for internal use only."]),
        &pages(&["", "INTERNAL USE ONLY stamp on scanned page"]),
    );
    store.ingest_pages("faq.pdf", &pages(&["Parking is free on weekends.", "Cafeteria opens at 8am."]), &[]);
    store.ingest_pages("brochure.pdf", &pages(&["Welcome to the campus tour."]), &[]);
    assert_eq!(store.len(), 5);

    let mut index = LexicalIndex::new(Bm25Settings::default());
    assert!(!index.is_ready());
    index.build(store.units());
    assert!(index.is_ready());
    assert_eq!(index.len(), 5);

    let query = index.tokenize("what is the information on internal use only.");
    let scores = index.score(&query).expect("score");
    assert_eq!(scores.len(), store.len(), "one score per document, aligned to ids");
    for (hit, unit) in scores.iter().zip(store.iter()) {
        assert_eq!(hit.id, unit.id);
    }

    let top = index.top_n(&query, 2).expect("top");
    assert_eq!(top.len(), 2);
    let best = store.get(top[0].id).expect("resolves");
    assert_eq!((best.source.as_str(), best.page), ("handbook.pdf", 2));
    assert!(top[0].score > top[1].score);

    // Identical queries yield identical rankings.
    assert_eq!(index.top_n(&query, 5).expect("top"), index.top_n(&query, 5).expect("top"));
}
