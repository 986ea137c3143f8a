use serde::Serialize;

/// One ranked page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub site_url: String,
    pub site_name: String,
    /// Path relative to the site origin
    pub path: String,
    pub title: String,
    pub snippet: String,
    /// Normalized relevance in `(0, 1]`
    pub relevance: f64,
}

/// A page of search results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Number of matching pages before pagination
    pub total_count: usize,
    pub items: Vec<SearchResult>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            items: Vec::new(),
        }
    }
}
