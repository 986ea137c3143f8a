use crate::config::types::{Config, CrawlerConfig, SearchConfig, SiteEntry, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_search_config(&config.search)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.split_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "split_threshold must be >= 1, got {}",
            config.split_threshold
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !(config.frequency_threshold > 0.0 && config.frequency_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "frequency_threshold must be in (0, 1], got {}",
            config.frequency_threshold
        )));
    }

    if config.default_limit < 1 {
        return Err(ConfigError::Validation(
            "default_limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the site catalog: absolute HTTP(S) origins, no duplicates
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in sites {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site '{}' must have a name",
                entry.url
            )));
        }

        let url = Url::parse(&entry.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", entry.url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Site URL '{}' must use HTTP or HTTPS",
                entry.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Site URL '{}' has no host",
                entry.url
            )));
        }

        let key = entry.url.trim_end_matches('/').to_lowercase();
        if !seen.insert(key) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' is configured more than once",
                entry.url
            )));
        }
    }

    Ok(())
}
