//! Indexing pipeline
//!
//! Turns stored pages into lemma statistics and inverted-index postings.
//! A lemma's frequency counts the distinct pages of its site that contain
//! it; a posting's rank counts occurrences on one page.

use crate::analyzer::TextAnalyzer;
use crate::storage::{PageRecord, Storage, StorageResult};
use tracing::debug;

/// Applies the lemma statistics of pages to storage
#[derive(Clone)]
pub struct Indexer {
    analyzer: TextAnalyzer,
}

impl Indexer {
    pub fn new(analyzer: TextAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &TextAnalyzer {
        &self.analyzer
    }

    /// Adds the page's contribution to the lemma statistics and postings
    ///
    /// Runs inside the caller's transaction. Returns the number of distinct
    /// lemmas indexed.
    pub fn process_page<S: Storage>(&self, storage: &mut S, page: &PageRecord) -> StorageResult<usize> {
        let text = self.analyzer.strip_markup(&page.content);
        let frequencies = self.analyzer.normalize_to_lemma_frequency(&text);

        for (lemma, count) in &frequencies {
            let record = storage.increment_lemma(page.site_id, lemma)?;
            storage.insert_index_entry(page.id, record.id, f64::from(*count))?;
        }

        debug!(
            "Indexed page {} ({}) with {} lemmas",
            page.id,
            page.path,
            frequencies.len()
        );
        Ok(frequencies.len())
    }

    /// Withdraws the page's contribution from the lemma statistics
    ///
    /// Lemmas whose frequency drops to zero are deleted. Runs inside the
    /// caller's transaction.
    pub fn remove_for_page<S: Storage>(&self, storage: &mut S, page_id: i64) -> StorageResult<()> {
        for entry in storage.find_index_entries_by_page(page_id)? {
            let lemma = storage.get_lemma(entry.lemma_id)?;
            let frequency = lemma.frequency - 1;
            if frequency <= 0 {
                storage.delete_lemma(lemma.id)?;
            } else {
                storage.update_lemma_frequency(lemma.id, frequency)?;
            }
        }
        storage.delete_index_entries_by_page(page_id)
    }

    /// Deletes a page and withdraws its contribution as one atomic unit
    pub fn remove_page<S: Storage>(&self, storage: &mut S, page_id: i64) -> StorageResult<()> {
        storage.transaction(|tx| {
            self.remove_for_page(tx, page_id)?;
            tx.delete_page(page_id)
        })
    }

    /// Stores a newly fetched page and its postings as one atomic unit
    ///
    /// Fails with `StorageError::Conflict` if the page already exists.
    pub fn index_new_page<S: Storage>(
        &self,
        storage: &mut S,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord> {
        storage.transaction(|tx| {
            let page = tx.insert_page(site_id, path, code, content)?;
            self.process_page(tx, &page)?;
            Ok(page)
        })
    }

    /// Replaces a page's content and postings as one atomic unit
    pub fn reindex_page<S: Storage>(
        &self,
        storage: &mut S,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
    ) -> StorageResult<PageRecord> {
        storage.transaction(|tx| {
            if let Some(existing) = tx.find_page(site_id, path)? {
                self.remove_for_page(tx, existing.id)?;
            }
            let page = tx.upsert_page(site_id, path, code, content)?;
            self.process_page(tx, &page)?;
            Ok(page)
        })
    }
}
