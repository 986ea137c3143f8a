//! Lemmascope: a self-hosted lemma search engine
//!
//! This crate crawls a fixed set of configured web origins, builds a per-site
//! inverted index over normalized word forms (lemmas) and serves
//! relevance-ranked keyword search over the indexed pages.

pub mod analyzer;
pub mod config;
pub mod crawler;
pub mod indexer;
pub mod output;
pub mod search;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Lemmascope operations
#[derive(Debug, Error)]
pub enum LemmascopeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Indexing is already running")]
    AlreadyRunning,

    #[error("Indexing is not running")]
    NotRunning,

    #[error("Page {url} is outside of the configured sites")]
    OutOfScope { url: String },

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("No lemmas could be extracted from the query")]
    NoLemmasExtracted,

    #[error("Site is not indexed: {0}")]
    SiteNotIndexed(String),

    #[error("No sites are indexed")]
    NoSitesIndexed,

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("URL {url} does not belong to origin {origin}")]
    CrossOrigin { url: String, origin: String },
}

impl LemmascopeError {
    /// Returns true for errors a search caller should see as a user-facing
    /// condition rather than an internal failure
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::NoLemmasExtracted
                | Self::SiteNotIndexed(_)
                | Self::NoSitesIndexed
                | Self::OutOfScope { .. }
                | Self::AlreadyRunning
                | Self::NotRunning
        )
    }

    /// Message recorded on a site when processing `url` failed
    ///
    /// Variants that already name their URL are not prefixed again.
    pub fn page_error_message(&self, url: &str) -> String {
        match self {
            Self::FetchFailure { .. } | Self::Http { .. } | Self::OutOfScope { .. } => {
                self.to_string()
            }
            _ => format!("{}: {}", url, self),
        }
    }
}

/// Result type alias for Lemmascope operations
pub type Result<T> = std::result::Result<T, LemmascopeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analyzer::{Morphology, SnowballMorphology, TextAnalyzer};
pub use config::Config;
pub use crawler::Coordinator;
pub use search::{SearchEngine, SearchResponse, SearchResult};
pub use state::{CancellationFlag, RunState, SiteStatus};
