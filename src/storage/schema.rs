//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Lemmascope database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Indexed sites, one row per configured origin
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    status_time TEXT NOT NULL,
    last_error TEXT
);

CREATE INDEX IF NOT EXISTS idx_sites_status ON sites(status);

-- Fetched pages
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    code INTEGER NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(site_id, path)
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);

-- Per-site lemmas; frequency counts distinct pages
CREATE TABLE IF NOT EXISTS lemmas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    lemma TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    UNIQUE(site_id, lemma)
);

-- Inverted index postings
CREATE TABLE IF NOT EXISTS index_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    lemma_id INTEGER NOT NULL REFERENCES lemmas(id) ON DELETE CASCADE,
    rank REAL NOT NULL CHECK (rank > 0),
    UNIQUE(page_id, lemma_id)
);

CREATE INDEX IF NOT EXISTS idx_index_entries_lemma ON index_entries(lemma_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
