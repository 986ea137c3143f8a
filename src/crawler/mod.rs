//! Crawler module for fetching and indexing configured sites
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness headers and delays
//! - HTML link extraction
//! - Recursive, splittable crawl tasks per site
//! - Overall crawl coordination and the run/stop state machine

mod coordinator;
mod fetcher;
mod parser;
mod task;

pub use coordinator::{Coordinator, CrawlSummary, SiteOutcome, StopSummary};
pub use fetcher::{build_http_client, politeness_delay, FetchedPage, Fetcher};
pub use parser::extract_links;
pub use task::{CrawlContext, CrawlTask};

