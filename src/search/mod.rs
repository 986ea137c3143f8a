//! Relevance-ranked keyword search over the index
//!
//! A query is lemmatized, lemmas too common on a site are dropped, the
//! posting lists of the rest are intersected per site and the matching pages
//! are ranked by their summed posting ranks.

mod engine;
mod types;

pub use engine::SearchEngine;
pub use types::{SearchResponse, SearchResult};
