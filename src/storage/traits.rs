//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::SiteStatus;
use crate::storage::{IndexEntryRecord, LemmaRecord, PageRecord, SiteRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Lemma not found: {0}")]
    LemmaNotFound(i64),

    /// A unique constraint rejected a concurrent insert of the same row
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every persistence operation the crawler, the indexing
/// pipeline and the search engine need.
pub trait Storage {
    // ===== Transactions =====

    /// Runs `f` as one atomic unit; any error rolls every write back
    fn transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
        Self: Sized;

    // ===== Sites =====

    /// Inserts a site or resets the existing record for the same origin
    fn upsert_site(&mut self, url: &str, name: &str, status: SiteStatus)
        -> StorageResult<SiteRecord>;

    /// Gets a site by ID
    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord>;

    /// Finds a site by its origin URL
    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Gets all sites with the given status
    fn find_sites_by_status(&self, status: SiteStatus) -> StorageResult<Vec<SiteRecord>>;

    /// Gets every site
    fn all_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Sets a site's status and last error, refreshing the status time
    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Records a page-level error on a site without changing its status
    fn record_site_error(&mut self, site_id: i64, error: &str) -> StorageResult<()>;

    /// Refreshes a site's status time
    fn touch_site(&mut self, site_id: i64) -> StorageResult<()>;

    /// Deletes a site together with its pages, lemmas and index entries
    fn delete_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Pages =====

    /// Inserts a new page
    ///
    /// Returns `StorageError::Conflict` if the (site, path) pair exists.
    fn insert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord>;

    /// Inserts a page or replaces code and content of the existing one
    fn upsert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Finds a page by site and relative path
    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Checks whether a page exists for the site and relative path
    fn page_exists(&self, site_id: i64, path: &str) -> StorageResult<bool>;

    /// Deletes a page and its index entries
    ///
    /// Lemma frequencies are not adjusted; `Indexer::remove_page` withdraws
    /// the page's contribution first.
    fn delete_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// Counts the pages of a site
    fn count_pages(&self, site_id: i64) -> StorageResult<u64>;

    /// Deletes every page of a site along with the site's lemmas
    fn delete_pages_by_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Lemmas =====

    /// Finds a lemma by site and text
    fn find_lemma(&self, site_id: i64, lemma: &str) -> StorageResult<Option<LemmaRecord>>;

    /// Gets a lemma by ID
    fn get_lemma(&self, lemma_id: i64) -> StorageResult<LemmaRecord>;

    /// Creates the lemma with frequency 1 or increments the existing one by 1
    ///
    /// This is a single atomic statement so concurrent indexers of the same
    /// site can never lose an increment.
    fn increment_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<LemmaRecord>;

    /// Overwrites a lemma's frequency
    fn update_lemma_frequency(&mut self, lemma_id: i64, frequency: i64) -> StorageResult<()>;

    /// Deletes a lemma and its index entries
    fn delete_lemma(&mut self, lemma_id: i64) -> StorageResult<()>;

    /// Counts the lemmas of a site
    fn count_lemmas(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Index entries =====

    /// Inserts a posting for a page and lemma
    fn insert_index_entry(
        &mut self,
        page_id: i64,
        lemma_id: i64,
        rank: f64,
    ) -> StorageResult<IndexEntryRecord>;

    /// Finds the posting for a page and lemma
    fn find_index_entry(
        &self,
        page_id: i64,
        lemma_id: i64,
    ) -> StorageResult<Option<IndexEntryRecord>>;

    /// Gets all postings of a page
    fn find_index_entries_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntryRecord>>;

    /// Gets all postings of a lemma
    fn find_index_entries_by_lemma(&self, lemma_id: i64)
        -> StorageResult<Vec<IndexEntryRecord>>;

    /// Deletes all postings of a page
    fn delete_index_entries_by_page(&mut self, page_id: i64) -> StorageResult<()>;
}
