//! Text analysis for indexing and search
//!
//! This module turns page text and queries into lemmas:
//! - Tokenization over the configured language's alphabet
//! - Closed-class word filtering and normalization via [`Morphology`]
//! - Markup stripping, title extraction and snippet building

mod markup;
mod morphology;
mod snippet;

pub use markup::{extract_title, strip_markup};
pub use morphology::{Morphology, SnowballMorphology, WordClass};

use crate::config::Language;
use std::collections::HashMap;
use std::sync::Arc;

/// Lemma frequencies of one text
pub type LemmaFrequencies = HashMap<String, u32>;

/// Lemmatizes text using a pluggable morphology provider
#[derive(Clone)]
pub struct TextAnalyzer {
    morphology: Arc<dyn Morphology>,
}

impl TextAnalyzer {
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        Self { morphology }
    }

    /// Creates an analyzer backed by the Snowball stemmer for `language`
    pub fn for_language(language: Language) -> Self {
        Self::new(Arc::new(SnowballMorphology::new(language)))
    }

    /// Lowercases the text and splits it on every character outside the alphabet
    fn tokens(&self, text: &str) -> Vec<String> {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if self.morphology.is_alphabetic(c) { c } else { ' ' })
            .collect();

        cleaned.split_whitespace().map(str::to_string).collect()
    }

    /// Returns the lemma of a lowercase token, or `None` for closed-class words
    fn lemma_of(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        let classes = self.morphology.morph_info(token);
        if classes.iter().any(|class| class.is_closed()) {
            return None;
        }
        self.morphology.normal_forms(token).into_iter().next()
    }

    /// Counts occurrences of every lemma in `text`
    pub fn normalize_to_lemma_frequency(&self, text: &str) -> LemmaFrequencies {
        let mut frequencies = LemmaFrequencies::new();
        for token in self.tokens(text) {
            if let Some(lemma) = self.lemma_of(&token) {
                *frequencies.entry(lemma).or_insert(0) += 1;
            }
        }
        frequencies
    }

    /// Lemmatizes a query, keeping token order and repeats
    pub fn extract_query_lemmas(&self, query: &str) -> Vec<String> {
        self.tokens(query)
            .iter()
            .filter_map(|token| self.lemma_of(token))
            .collect()
    }

    pub fn strip_markup(&self, html: &str) -> String {
        strip_markup(html)
    }

    pub fn extract_title(&self, html: &str) -> String {
        extract_title(html)
    }
}
