//! Output module for reports printed by the command-line interface
//!
//! This module handles:
//! - Per-site index statistics
//! - JSON rendering of search responses and crawl summaries

pub mod stats;

pub use stats::{load_statistics, print_statistics, IndexStatistics, SiteStatistics, TotalStatistics};

use serde::Serialize;

/// Prints a value as pretty JSON to stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
