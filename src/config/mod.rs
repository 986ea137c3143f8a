//! Configuration module for Lemmascope
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lemmascope::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lemmascope.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalyzerConfig, Config, CrawlerConfig, Language, SearchConfig, SiteEntry, StorageConfig,
    UserAgentConfig, DEFAULT_REFERRER, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
