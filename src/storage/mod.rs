//! Storage module for persisting the search index
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Site, page, lemma and index entry persistence
//! - Atomic lemma frequency updates shared by concurrent crawl tasks

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::SiteStatus;
use crate::LemmascopeError;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the orchestrator, crawl tasks and search
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, LemmascopeError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across tasks
pub fn share(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, surfacing a poisoned lock as a storage error
pub fn lock(storage: &SharedStorage) -> Result<MutexGuard<'_, SqliteStorage>, StorageError> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Represents a site in the database
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub last_error: Option<String>,
}

/// Represents a fetched page in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    /// Path relative to the site origin, always starting with `/`
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// Represents a lemma of one site
#[derive(Debug, Clone, PartialEq)]
pub struct LemmaRecord {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    /// Number of distinct pages of the site containing the lemma
    pub frequency: i64,
}

/// Represents a (page, lemma) posting
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntryRecord {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    /// Occurrences of the lemma on the page
    pub rank: f64,
}
