//! Crawler coordinator - crawl orchestration
//!
//! This module owns the global run state and drives one crawl lineage per
//! configured site:
//! - Purging previous data and creating fresh site records
//! - Launching and joining the per-site crawl lineages
//! - Settling site statuses when lineages finish
//! - Stopping a run and reindexing single pages on demand

use crate::analyzer::TextAnalyzer;
use crate::config::{Config, SiteEntry};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::task::{CrawlContext, CrawlTask};
use crate::indexer::Indexer;
use crate::state::{CancellationFlag, RunState, SiteStatus, STOPPED_BY_OPERATOR};
use crate::storage::{lock, open_storage, share, PageRecord, SharedStorage, Storage};
use crate::url::{find_site, normalize_url, origin_key, relative_path};
use crate::{LemmascopeError, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Outcome of one site after a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct SiteOutcome {
    pub name: String,
    pub url: String,
    pub status: String,
    pub pages: usize,
    pub error: Option<String>,
}

/// Result of a completed crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub sites: Vec<SiteOutcome>,
    pub elapsed_secs: f64,
}

/// Result of a stop request
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    /// Origins marked failed by the stop
    pub stopped_sites: Vec<String>,
}

struct Lineage {
    site_id: i64,
    entry: SiteEntry,
    ctx: Arc<CrawlContext>,
    handle: JoinHandle<Result<()>>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    fetcher: Arc<Fetcher>,
    indexer: Indexer,
    run_state: RunState,
    cancel: Mutex<CancellationFlag>,
}

impl Coordinator {
    /// Creates a coordinator over an already opened storage
    pub fn new(config: Config, storage: SharedStorage) -> Result<Self> {
        let fetcher = Fetcher::new(&config.crawler, &config.user_agent)?;
        let analyzer = TextAnalyzer::for_language(config.analyzer.language);

        Ok(Self {
            config: Arc::new(config),
            storage,
            fetcher: Arc::new(fetcher),
            indexer: Indexer::new(analyzer),
            run_state: RunState::new(),
            cancel: Mutex::new(CancellationFlag::new()),
        })
    }

    /// Creates a coordinator, opening the database named by the configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let storage = open_storage(Path::new(&config.storage.database_path))?;
        Self::new(config, share(storage))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    pub fn analyzer(&self) -> &TextAnalyzer {
        self.indexer.analyzer()
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    fn cancel_slot(&self) -> MutexGuard<'_, CancellationFlag> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves `Idle -> Running` and installs a fresh cancellation flag
    ///
    /// Both happen under the flag's lock, so a concurrent stop request sees
    /// either no run or the new run's flag.
    fn begin_run(&self) -> Result<CancellationFlag> {
        let mut slot = self.cancel_slot();
        if !self.run_state.try_start() {
            return Err(LemmascopeError::AlreadyRunning);
        }
        let flag = CancellationFlag::new();
        *slot = flag.clone();
        Ok(flag)
    }

    /// Crawls and indexes every configured site
    ///
    /// Returns once every lineage has finished or observed a stop request.
    ///
    /// # Errors
    ///
    /// * `AlreadyRunning` - Another crawl run is in progress
    pub async fn start_crawl(&self) -> Result<CrawlSummary> {
        let cancel = self.begin_run()?;
        let result = self.run_all_sites(&cancel).await;
        self.run_state.finish();
        result
    }

    /// Launches every site and waits for all lineages
    ///
    /// Every lineage is joined and settled even when settling one of them
    /// fails; the first such error is returned afterwards.
    async fn run_all_sites(&self, cancel: &CancellationFlag) -> Result<CrawlSummary> {
        let start_time = Instant::now();
        tracing::info!("Starting crawl of {} sites", self.config.sites.len());

        let mut lineages = Vec::new();
        for entry in &self.config.sites {
            match self.launch_site(entry, cancel) {
                Ok(lineage) => lineages.push(lineage),
                Err(e) => tracing::error!("Failed to start crawling {}: {}", entry.url, e),
            }
        }

        let mut outcomes = Vec::new();
        let mut first_error = None;
        for lineage in lineages {
            let result = match lineage.handle.await {
                Ok(result) => result,
                Err(e) => Err(LemmascopeError::Join(e)),
            };
            match self.settle_site(lineage.site_id, &lineage.entry, &lineage.ctx, result) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Failed to settle {}: {}", lineage.entry.url, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!(
            "Crawl finished: {} sites in {:?}",
            outcomes.len(),
            start_time.elapsed()
        );

        Ok(CrawlSummary {
            sites: outcomes,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Purges previous data of a site, recreates it and spawns its lineage
    fn launch_site(&self, entry: &SiteEntry, cancel: &CancellationFlag) -> Result<Lineage> {
        let origin = normalize_url(&entry.url)?;
        let key = origin_key(&entry.url);

        let site = {
            let mut storage = lock(&self.storage)?;
            storage.transaction(|tx| {
                if let Some(previous) = tx.find_site_by_url(&key)? {
                    tracing::info!("Purging previous index of {}", key);
                    tx.delete_pages_by_site(previous.id)?;
                    tx.delete_site(previous.id)?;
                }
                tx.upsert_site(&key, &entry.name, SiteStatus::Indexing)
            })?
        };

        let ctx = Arc::new(CrawlContext::new(
            site.id,
            origin,
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
            self.indexer.clone(),
            cancel.clone(),
            &self.config.crawler,
        ));

        tracing::info!("Crawling {} ({})", entry.name, key);
        let handle = tokio::spawn(CrawlTask::root(Arc::clone(&ctx)).run());

        Ok(Lineage {
            site_id: site.id,
            entry: entry.clone(),
            ctx,
            handle,
        })
    }

    /// Sets the final status of a site whose lineage has finished
    ///
    /// Only sites still `Indexing` are touched, so a stop request's `Failed`
    /// marking is never overwritten. A lineage that ended after a cancel is
    /// settled as stopped.
    fn settle_site(
        &self,
        site_id: i64,
        entry: &SiteEntry,
        ctx: &CrawlContext,
        result: Result<()>,
    ) -> Result<SiteOutcome> {
        let mut storage = lock(&self.storage)?;
        let site = storage.get_site(site_id)?;

        let site = if site.status == SiteStatus::Indexing {
            match &result {
                Ok(()) if ctx.cancel.is_cancelled() => {
                    storage.update_site_status(
                        site_id,
                        SiteStatus::Failed,
                        Some(STOPPED_BY_OPERATOR),
                    )?;
                    tracing::info!("Indexing {} stopped", entry.url);
                }
                Ok(()) => {
                    storage.update_site_status(
                        site_id,
                        SiteStatus::Indexed,
                        site.last_error.as_deref(),
                    )?;
                    tracing::info!("Indexed {}: {} pages", entry.url, ctx.pages_indexed());
                }
                Err(e) => {
                    let message = e.to_string();
                    storage.update_site_status(site_id, SiteStatus::Failed, Some(&message))?;
                    tracing::error!("Indexing {} failed: {}", entry.url, message);
                }
            }
            storage.get_site(site_id)?
        } else {
            site
        };

        Ok(SiteOutcome {
            name: entry.name.clone(),
            url: site.url,
            status: site.status.to_string(),
            pages: ctx.pages_indexed(),
            error: site.last_error,
        })
    }

    /// Requests the running crawl to stop
    ///
    /// Every site still `Indexing` is marked `Failed`. Fetches already in
    /// flight complete; no new work starts.
    ///
    /// # Errors
    ///
    /// * `NotRunning` - No crawl run is in progress
    pub fn stop_crawl(&self) -> Result<StopSummary> {
        {
            let slot = self.cancel_slot();
            if !self.run_state.is_running() {
                return Err(LemmascopeError::NotRunning);
            }
            slot.cancel();
        }

        let mut storage = lock(&self.storage)?;
        let mut stopped_sites = Vec::new();
        for site in storage.find_sites_by_status(SiteStatus::Indexing)? {
            storage.update_site_status(site.id, SiteStatus::Failed, Some(STOPPED_BY_OPERATOR))?;
            stopped_sites.push(site.url);
        }

        tracing::info!("Stop requested; {} sites marked failed", stopped_sites.len());
        Ok(StopSummary { stopped_sites })
    }

    /// Fetches and reindexes a single page of a configured site
    ///
    /// Runs regardless of whether a crawl is in progress and ignores the
    /// frontier and depth limits.
    ///
    /// # Errors
    ///
    /// * `OutOfScope` - The URL does not belong to any configured site
    /// * `FetchFailure` / `Http` - The page could not be fetched
    pub async fn index_single_page(&self, url: &str) -> Result<PageRecord> {
        let entry = find_site(url, &self.config.sites).ok_or_else(|| {
            LemmascopeError::OutOfScope {
                url: url.to_string(),
            }
        })?;

        let origin = normalize_url(&entry.url)?;
        let target = normalize_url(url)?;
        let path = relative_path(&target, &origin).map_err(|_| LemmascopeError::OutOfScope {
            url: url.to_string(),
        })?;
        let key = origin_key(&entry.url);

        let site = {
            let mut storage = lock(&self.storage)?;
            match storage.find_site_by_url(&key)? {
                Some(site) => site,
                None => storage.upsert_site(&key, &entry.name, SiteStatus::Indexing)?,
            }
        };

        tracing::info!("Reindexing {} ({})", target, path);
        let fetched = match self.fetcher.fetch(&target).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let mut storage = lock(&self.storage)?;
                if let Some(stale) = storage.find_page(site.id, &path)? {
                    self.indexer.remove_page(&mut *storage, stale.id)?;
                    tracing::info!("Removed {} from the index", path);
                }
                storage.record_site_error(site.id, &e.page_error_message(target.as_str()))?;
                return Err(e);
            }
        };
        let code = self.fetcher.head_status(&target).await;

        let mut storage = lock(&self.storage)?;
        let page = self
            .indexer
            .reindex_page(&mut *storage, site.id, &path, code, &fetched.body)?;
        storage.update_site_status(site.id, SiteStatus::Indexed, None)?;

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::storage::SqliteStorage;

    fn coordinator() -> Coordinator {
        let config = parse_config(
            r#"
[storage]
database-path = ":memory:"

[[sites]]
url = "http://example.test"
name = "Example"
"#,
        )
        .unwrap();
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        Coordinator::new(config, storage).unwrap()
    }

    #[test]
    fn test_stop_when_idle_fails() {
        let coordinator = coordinator();
        assert!(!coordinator.is_running());
        assert!(matches!(
            coordinator.stop_crawl(),
            Err(LemmascopeError::NotRunning)
        ));
    }

    #[test]
    fn test_stop_marks_indexing_sites_failed() {
        let coordinator = coordinator();
        let (a, b, done) = {
            let mut storage = lock(&coordinator.storage).unwrap();
            let a = storage
                .upsert_site("http://a.test", "A", SiteStatus::Indexing)
                .unwrap();
            let b = storage
                .upsert_site("http://b.test", "B", SiteStatus::Indexing)
                .unwrap();
            let done = storage
                .upsert_site("http://done.test", "Done", SiteStatus::Indexed)
                .unwrap();
            (a, b, done)
        };
        let cancel = coordinator.begin_run().unwrap();

        let summary = coordinator.stop_crawl().unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(summary.stopped_sites.len(), 2);
        let storage = lock(&coordinator.storage).unwrap();
        for id in [a.id, b.id] {
            let site = storage.get_site(id).unwrap();
            assert_eq!(site.status, SiteStatus::Failed);
            assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_OPERATOR));
        }
        assert_eq!(storage.get_site(done.id).unwrap().status, SiteStatus::Indexed);
    }

    #[tokio::test]
    async fn test_start_while_running_fails() {
        let coordinator = coordinator();
        assert!(coordinator.run_state.try_start());

        let result = coordinator.start_crawl().await;

        assert!(matches!(result, Err(LemmascopeError::AlreadyRunning)));
        assert!(coordinator.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_launch_fails_new_sites() {
        let coordinator = coordinator();
        let cancel = coordinator.begin_run().unwrap();

        let stop = coordinator.stop_crawl().unwrap();
        assert!(stop.stopped_sites.is_empty());
        assert!(cancel.is_cancelled());

        let summary = coordinator.run_all_sites(&cancel).await.unwrap();
        coordinator.run_state.finish();

        assert_eq!(summary.sites.len(), 1);
        assert_eq!(summary.sites[0].status, "FAILED");
        assert_eq!(summary.sites[0].error.as_deref(), Some(STOPPED_BY_OPERATOR));
        assert_eq!(summary.sites[0].pages, 0);
    }

    #[tokio::test]
    async fn test_single_page_out_of_scope() {
        let coordinator = coordinator();
        let result = coordinator
            .index_single_page("http://elsewhere.test/page")
            .await;
        assert!(matches!(result, Err(LemmascopeError::OutOfScope { .. })));
    }
}
