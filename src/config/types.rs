use serde::Deserialize;

/// User-Agent sent when the configuration leaves it unset
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; LemmascopeBot/0.1; +https://github.com/lemmascope)";

/// Referrer sent when the configuration leaves it unset
pub const DEFAULT_REFERRER: &str = "https://www.google.com";

/// Main configuration structure for Lemmascope
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Depth after which a crawl task stops expanding its frontier
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Frontier size above which a crawl task splits itself in two
    #[serde(rename = "split-threshold", default = "default_split_threshold")]
    pub split_threshold: usize,

    /// Lower bound of the politeness delay before each fetch (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the politeness delay before each fetch (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            split_threshold: default_split_threshold(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_depth() -> u32 {
    5
}

fn default_split_threshold() -> usize {
    100
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Request headers presented to crawled sites
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    pub referrer: Option<String>,
}

impl UserAgentConfig {
    /// Returns the configured User-Agent or the built-in default
    pub fn user_agent_or_default(&self) -> &str {
        self.user_agent
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Returns the configured Referrer or the built-in default
    pub fn referrer_or_default(&self) -> &str {
        self.referrer
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_REFERRER)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Search tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Lemmas whose page ratio on a site reaches this value are ignored
    #[serde(rename = "frequency-threshold", default = "default_frequency_threshold")]
    pub frequency_threshold: f64,

    #[serde(rename = "default-limit", default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frequency_threshold: default_frequency_threshold(),
            default_limit: default_limit(),
        }
    }
}

fn default_frequency_threshold() -> f64 {
    0.7
}

fn default_limit() -> usize {
    20
}

/// Language of the indexed corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Russian,
}

/// Text analysis configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub language: Language,
}

/// A site the crawler is allowed to index
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Origin URL (e.g., "https://example.com")
    pub url: String,

    /// Display name
    pub name: String,
}
