//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::SiteStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{IndexEntryRecord, LemmaRecord, PageRecord, SiteRecord};
use crate::LemmascopeError;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const SITE_COLUMNS: &str = "id, url, name, status, status_time, last_error";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content";
const LEMMA_COLUMNS: &str = "id, site_id, lemma, frequency";
const INDEX_COLUMNS: &str = "id, page_id, lemma_id, rank";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, LemmascopeError> {
        let conn = init_database(path)?;
        conn.execute_batch(
            "
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, LemmascopeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(SiteStatus::Failed),
        status_time: row.get(4)?,
        last_error: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        content: row.get(4)?,
    })
}

fn lemma_from_row(row: &Row<'_>) -> rusqlite::Result<LemmaRecord> {
    Ok(LemmaRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        lemma: row.get(2)?,
        frequency: row.get(3)?,
    })
}

fn index_entry_from_row(row: &Row<'_>) -> rusqlite::Result<IndexEntryRecord> {
    Ok(IndexEntryRecord {
        id: row.get(0)?,
        page_id: row.get(1)?,
        lemma_id: row.get(2)?,
        rank: row.get(3)?,
    })
}

/// Maps unique-constraint failures to `StorageError::Conflict`
fn conflict_or(err: rusqlite::Error, what: impl FnOnce() -> String) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StorageError::Conflict(what())
        }
        _ => StorageError::Sqlite(err),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Storage for SqliteStorage {
    // ===== Transactions =====

    fn transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> StorageResult<T>,
        Self: Sized,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    // ===== Sites =====

    fn upsert_site(
        &mut self,
        url: &str,
        name: &str,
        status: SiteStatus,
    ) -> StorageResult<SiteRecord> {
        let sql = format!(
            "INSERT INTO sites (url, name, status, status_time, last_error)
             VALUES (?1, ?2, ?3, ?4, NULL)
             ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                status_time = excluded.status_time,
                last_error = NULL
             RETURNING {}",
            SITE_COLUMNS
        );
        let site = self.conn.query_row(
            &sql,
            params![url, name, status.to_db_string(), now()],
            site_from_row,
        )?;
        Ok(site)
    }

    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord> {
        let sql = format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS);
        self.conn
            .query_row(&sql, params![site_id], site_from_row)
            .optional()?
            .ok_or_else(|| StorageError::SiteNotFound(format!("Site ID {}", site_id)))
    }

    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let sql = format!("SELECT {} FROM sites WHERE url = ?1", SITE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![url], site_from_row)
            .optional()?)
    }

    fn find_sites_by_status(&self, status: SiteStatus) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!("SELECT {} FROM sites WHERE status = ?1 ORDER BY id", SITE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let sites = stmt
            .query_map(params![status.to_db_string()], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn all_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let sql = format!("SELECT {} FROM sites ORDER BY id", SITE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET status = ?1, last_error = ?2, status_time = ?3 WHERE id = ?4",
            params![status.to_db_string(), last_error, now(), site_id],
        )?;
        Ok(())
    }

    fn record_site_error(&mut self, site_id: i64, error: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET last_error = ?1, status_time = ?2 WHERE id = ?3",
            params![error, now(), site_id],
        )?;
        Ok(())
    }

    fn touch_site(&mut self, site_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sites SET status_time = ?1 WHERE id = ?2",
            params![now(), site_id],
        )?;
        Ok(())
    }

    fn delete_site(&mut self, site_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM sites WHERE id = ?1", params![site_id])?;
        Ok(())
    }

    // ===== Pages =====

    fn insert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord> {
        self.conn
            .execute(
                "INSERT INTO pages (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)",
                params![site_id, path, code, content],
            )
            .map_err(|e| conflict_or(e, || format!("page {} of site {}", path, site_id)))?;

        Ok(PageRecord {
            id: self.conn.last_insert_rowid(),
            site_id,
            path: path.to_string(),
            code,
            content: content.to_string(),
        })
    }

    fn upsert_page(
        &mut self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord> {
        let sql = format!(
            "INSERT INTO pages (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(site_id, path) DO UPDATE SET
                code = excluded.code,
                content = excluded.content
             RETURNING {}",
            PAGE_COLUMNS
        );
        let page = self
            .conn
            .query_row(&sql, params![site_id, path, code, content], page_from_row)?;
        Ok(page)
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))
    }

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
            PAGE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![site_id, path], page_from_row)
            .optional()?)
    }

    fn page_exists(&self, site_id: i64, path: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE site_id = ?1 AND path = ?2)",
            params![site_id, path],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn delete_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM pages WHERE id = ?1", params![page_id])?;
        Ok(())
    }

    fn count_pages(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete_pages_by_site(&mut self, site_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM pages WHERE site_id = ?1", params![site_id])?;
        self.conn
            .execute("DELETE FROM lemmas WHERE site_id = ?1", params![site_id])?;
        Ok(())
    }

    // ===== Lemmas =====

    fn find_lemma(&self, site_id: i64, lemma: &str) -> StorageResult<Option<LemmaRecord>> {
        let sql = format!(
            "SELECT {} FROM lemmas WHERE site_id = ?1 AND lemma = ?2",
            LEMMA_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![site_id, lemma], lemma_from_row)
            .optional()?)
    }

    fn get_lemma(&self, lemma_id: i64) -> StorageResult<LemmaRecord> {
        let sql = format!("SELECT {} FROM lemmas WHERE id = ?1", LEMMA_COLUMNS);
        self.conn
            .query_row(&sql, params![lemma_id], lemma_from_row)
            .optional()?
            .ok_or(StorageError::LemmaNotFound(lemma_id))
    }

    fn increment_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<LemmaRecord> {
        let sql = format!(
            "INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?1, ?2, 1)
             ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1
             RETURNING {}",
            LEMMA_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![site_id, lemma], lemma_from_row)?;
        Ok(record)
    }

    fn update_lemma_frequency(&mut self, lemma_id: i64, frequency: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE lemmas SET frequency = ?1 WHERE id = ?2",
            params![frequency, lemma_id],
        )?;
        Ok(())
    }

    fn delete_lemma(&mut self, lemma_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM lemmas WHERE id = ?1", params![lemma_id])?;
        Ok(())
    }

    fn count_lemmas(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM lemmas WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Index entries =====

    fn insert_index_entry(
        &mut self,
        page_id: i64,
        lemma_id: i64,
        rank: f64,
    ) -> StorageResult<IndexEntryRecord> {
        self.conn
            .execute(
                "INSERT INTO index_entries (page_id, lemma_id, rank) VALUES (?1, ?2, ?3)",
                params![page_id, lemma_id, rank],
            )
            .map_err(|e| {
                conflict_or(e, || format!("index entry ({}, {})", page_id, lemma_id))
            })?;

        Ok(IndexEntryRecord {
            id: self.conn.last_insert_rowid(),
            page_id,
            lemma_id,
            rank,
        })
    }

    fn find_index_entry(
        &self,
        page_id: i64,
        lemma_id: i64,
    ) -> StorageResult<Option<IndexEntryRecord>> {
        let sql = format!(
            "SELECT {} FROM index_entries WHERE page_id = ?1 AND lemma_id = ?2",
            INDEX_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![page_id, lemma_id], index_entry_from_row)
            .optional()?)
    }

    fn find_index_entries_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntryRecord>> {
        let sql = format!(
            "SELECT {} FROM index_entries WHERE page_id = ?1 ORDER BY id",
            INDEX_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![page_id], index_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn find_index_entries_by_lemma(
        &self,
        lemma_id: i64,
    ) -> StorageResult<Vec<IndexEntryRecord>> {
        let sql = format!(
            "SELECT {} FROM index_entries WHERE lemma_id = ?1 ORDER BY id",
            INDEX_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![lemma_id], index_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn delete_index_entries_by_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM index_entries WHERE page_id = ?1", params![page_id])?;
        Ok(())
    }
}

/// Initializes or opens a database at the given path
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
