//! Index statistics
//!
//! This module provides functionality for extracting and displaying
//! per-site index statistics from the storage layer.

use crate::config::Config;
use crate::state::SiteStatus;
use crate::storage::Storage;
use crate::url::origin_key;
use crate::Result;
use serde::Serialize;

/// Status reported for configured sites that have no record yet
pub const NOT_INDEXED: &str = "NOT_INDEXED";

/// Totals across all configured sites
#[derive(Debug, Clone, Serialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: u64,
    pub lemmas: u64,
    /// True while any configured site is being indexed
    pub indexing: bool,
}

/// Statistics of one configured site
#[derive(Debug, Clone, Serialize)]
pub struct SiteStatistics {
    pub name: String,
    pub url: String,
    pub status: String,
    #[serde(rename = "statusTime")]
    pub status_time: Option<String>,
    pub error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

/// Index statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatistics {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}

/// Loads statistics for every configured site
///
/// Sites without a database record are reported as [`NOT_INDEXED`] with zero
/// counts.
pub fn load_statistics<S: Storage>(storage: &S, config: &Config) -> Result<IndexStatistics> {
    let mut detailed = Vec::with_capacity(config.sites.len());
    let mut pages = 0;
    let mut lemmas = 0;
    let mut indexing = false;

    for entry in &config.sites {
        let item = match storage.find_site_by_url(&origin_key(&entry.url))? {
            Some(site) => {
                let site_pages = storage.count_pages(site.id)?;
                let site_lemmas = storage.count_lemmas(site.id)?;
                pages += site_pages;
                lemmas += site_lemmas;
                indexing |= site.status == SiteStatus::Indexing;

                SiteStatistics {
                    name: entry.name.clone(),
                    url: entry.url.clone(),
                    status: site.status.to_db_string().to_string(),
                    status_time: Some(site.status_time),
                    error: site.last_error.filter(|e| !e.trim().is_empty()),
                    pages: site_pages,
                    lemmas: site_lemmas,
                }
            }
            None => SiteStatistics {
                name: entry.name.clone(),
                url: entry.url.clone(),
                status: NOT_INDEXED.to_string(),
                status_time: None,
                error: None,
                pages: 0,
                lemmas: 0,
            },
        };
        detailed.push(item);
    }

    Ok(IndexStatistics {
        total: TotalStatistics {
            sites: config.sites.len(),
            pages,
            lemmas,
            indexing,
        },
        detailed,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Configured sites: {}", stats.total.sites);
    println!("  Indexed pages: {}", stats.total.pages);
    println!("  Lemmas: {}", stats.total.lemmas);
    println!(
        "  Indexing in progress: {}",
        if stats.total.indexing { "yes" } else { "no" }
    );
    println!();

    println!("Sites:");
    for site in &stats.detailed {
        println!("  {} ({})", site.name, site.url);
        println!("    Status: {}", site.status);
        if let Some(time) = &site.status_time {
            println!("    Status time: {}", time);
        }
        println!("    Pages: {}, lemmas: {}", site.pages, site.lemmas);
        if let Some(error) = &site.error {
            println!("    Last error: {}", error);
        }
    }
}
