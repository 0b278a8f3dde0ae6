use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Splits on non-alphanumeric characters and lowercases.
///
/// The same analyzer tokenizes documents at build time and queries at query
/// time, so both sides see identical terms.
#[derive(Clone)]
pub struct Analyzer {
    inner: TextAnalyzer,
}

impl Analyzer {
    pub fn new() -> Self {
        let inner = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
        Self { inner }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        // token_stream needs &mut; a clone keeps tokenize usable from shared refs.
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets the BM25 embedder split text exactly as queries are split.
impl bm25::Tokenizer for Analyzer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        Analyzer::tokenize(self, input_text)
    }
}
