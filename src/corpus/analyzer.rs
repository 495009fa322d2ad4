//! Query and document analysis.
//!
//! The same analyzer is registered on every index and used to turn query
//! text into terms, so statistics keys and query terms always agree.

use itertools::Itertools;
use tantivy::Index;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream,
};

/// Name under which the analyzer is registered on tantivy indexes.
pub const ANALYZER_NAME: &str = "shardsel_en";

const MAX_TOKEN_LEN: usize = 40;

/// Tokenizer + lowercaser + English stemmer.
///
/// Cheap to clone; construct once and share.
#[derive(Clone)]
pub struct QueryAnalyzer {
    analyzer: TextAnalyzer,
}

impl std::fmt::Debug for QueryAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryAnalyzer")
            .field("name", &ANALYZER_NAME)
            .finish()
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryAnalyzer {
    pub fn new() -> Self {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        Self { analyzer }
    }

    /// Register this analyzer on an index under [`ANALYZER_NAME`].
    pub fn register(&self, index: &Index) {
        index
            .tokenizers()
            .register(ANALYZER_NAME, self.analyzer.clone());
    }

    /// All tokens of `text`, in order, with repeats.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    /// Query terms: tokenized, stemmed, deduplicated in first-seen order.
    pub fn terms(&self, query: &str) -> Vec<String> {
        self.tokens(query).into_iter().unique().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_stems() {
        let analyzer = QueryAnalyzer::new();
        assert_eq!(analyzer.tokens("Running Dogs"), ["run", "dog"]);
    }

    #[test]
    fn terms_deduplicate_preserving_first_seen_order() {
        let analyzer = QueryAnalyzer::new();
        assert_eq!(
            analyzer.terms("search shards, searching SHARD selection"),
            ["search", "shard", "select"]
        );
    }

    #[test]
    fn empty_and_punctuation_only_queries_have_no_terms() {
        let analyzer = QueryAnalyzer::new();
        assert!(analyzer.terms("").is_empty());
        assert!(analyzer.terms("  ?! -- ").is_empty());
    }

    #[test]
    fn drops_overlong_tokens() {
        let analyzer = QueryAnalyzer::new();
        let long = "x".repeat(MAX_TOKEN_LEN + 5);
        assert_eq!(analyzer.terms(&format!("{long} rust")), ["rust"]);
    }
}
