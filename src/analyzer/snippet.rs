use super::{strip_markup, TextAnalyzer};
use std::collections::HashSet;

/// Words kept on each side of the first query match
const SNIPPET_RADIUS: usize = 25;

/// Characters shown when no word of the page matches the query
const FALLBACK_CHARS: usize = 300;

const ELLIPSIS: &str = "...";

impl TextAnalyzer {
    /// Lemma of a single word with punctuation and digits removed
    fn word_lemma(&self, word: &str) -> Option<String> {
        let cleaned: String = word
            .to_lowercase()
            .chars()
            .filter(|c| self.morphology.is_alphabetic(*c))
            .collect();
        self.lemma_of(&cleaned)
    }

    /// Builds a plain-text excerpt of `html` around the first query match
    ///
    /// Matching words inside the window are wrapped in `<b>` tags. Without a
    /// match the excerpt is the beginning of the text.
    pub fn build_snippet(&self, html: &str, query_lemmas: &[String]) -> String {
        let text = strip_markup(html);
        if text.is_empty() {
            return String::new();
        }

        let wanted: HashSet<&str> = query_lemmas.iter().map(String::as_str).collect();
        let words: Vec<&str> = text.split_whitespace().collect();
        let matches: Vec<bool> = words
            .iter()
            .map(|word| {
                self.word_lemma(word)
                    .map(|lemma| wanted.contains(lemma.as_str()))
                    .unwrap_or(false)
            })
            .collect();

        let Some(first) = matches.iter().position(|m| *m) else {
            if text.chars().count() > FALLBACK_CHARS {
                let head: String = text.chars().take(FALLBACK_CHARS).collect();
                return format!("{}{}", head, ELLIPSIS);
            }
            return text;
        };

        let start = first.saturating_sub(SNIPPET_RADIUS);
        let end = (first + SNIPPET_RADIUS).min(words.len());

        let excerpt = (start..end)
            .map(|i| {
                if matches[i] {
                    format!("<b>{}</b>", words[i])
                } else {
                    words[i].to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!("{}{}", excerpt.trim(), ELLIPSIS)
    }
}
