//! Recursive crawl task
//!
//! A task owns a slice of one site's frontier. Large frontiers are split in
//! half: one half runs on a spawned tokio task, the other in the caller, and
//! the two are joined. Small frontiers, and tasks too deep to split further,
//! are walked one URL at a time.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{politeness_delay, Fetcher};
use crate::crawler::parser::extract_links;
use crate::indexer::Indexer;
use crate::state::CancellationFlag;
use crate::storage::{lock, SharedStorage, Storage, StorageError};
use crate::url::{is_skipped_resource, normalize_url, relative_path, same_host};
use crate::{LemmascopeError, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

/// State shared by every task of one site's crawl lineage
pub struct CrawlContext {
    pub site_id: i64,
    pub origin: Url,
    pub storage: SharedStorage,
    pub fetcher: Arc<Fetcher>,
    pub indexer: Indexer,
    pub cancel: CancellationFlag,
    pub max_depth: u32,
    pub split_threshold: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Relative paths already queued somewhere in the lineage
    queued: Mutex<HashSet<String>>,
    pages_indexed: AtomicUsize,
}

impl CrawlContext {
    pub fn new(
        site_id: i64,
        origin: Url,
        storage: SharedStorage,
        fetcher: Arc<Fetcher>,
        indexer: Indexer,
        cancel: CancellationFlag,
        crawler: &CrawlerConfig,
    ) -> Self {
        Self {
            site_id,
            origin,
            storage,
            fetcher,
            indexer,
            cancel,
            max_depth: crawler.max_depth,
            split_threshold: crawler.split_threshold.max(1),
            min_delay_ms: crawler.min_delay_ms,
            max_delay_ms: crawler.max_delay_ms,
            queued: Mutex::new(HashSet::new()),
            pages_indexed: AtomicUsize::new(0),
        }
    }

    /// Pages stored and indexed by the lineage so far
    pub fn pages_indexed(&self) -> usize {
        self.pages_indexed.load(Ordering::Relaxed)
    }

    /// Marks a path as queued; returns false if it already was
    fn mark_queued(&self, path: &str) -> bool {
        match self.queued.lock() {
            Ok(mut queued) => queued.insert(path.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(path.to_string()),
        }
    }

    /// Records a page error as the site's last error
    ///
    /// Nothing is written once the run is cancelled, so the stop reason set
    /// by the coordinator is kept. The flag is checked under the storage lock
    /// because a stop raises it before taking that lock.
    fn record_error(&self, url: &Url, error: &LemmascopeError) {
        warn!("Error processing {}: {}", url, error);
        let message = error.page_error_message(url.as_str());
        match lock(&self.storage) {
            Ok(mut storage) => {
                if self.cancel.is_cancelled() {
                    debug!("Run cancelled, not recording error for {}", url);
                    return;
                }
                if let Err(e) = storage.record_site_error(self.site_id, &message) {
                    warn!("Failed to record error for site {}: {}", self.site_id, e);
                }
            }
            Err(e) => warn!("Failed to record error for site {}: {}", self.site_id, e),
        }
    }
}

/// One node of a site's crawl tree
pub struct CrawlTask {
    ctx: Arc<CrawlContext>,
    frontier: VecDeque<Url>,
    depth: u32,
}

impl CrawlTask {
    pub fn new(ctx: Arc<CrawlContext>, frontier: VecDeque<Url>, depth: u32) -> Self {
        Self {
            ctx,
            frontier,
            depth,
        }
    }

    /// Root task of a lineage, seeded with the site origin
    pub fn root(ctx: Arc<CrawlContext>) -> Self {
        let origin = ctx.origin.clone();
        if let Ok(path) = relative_path(&origin, &ctx.origin) {
            ctx.mark_queued(&path);
        }
        Self::new(ctx, VecDeque::from([origin]), 0)
    }

    /// Runs the task to completion
    ///
    /// Only lineage-fatal errors are returned; per-URL failures are recorded
    /// on the site and skipped.
    pub fn run(mut self) -> BoxFuture<'static, Result<()>> {
        async move {
            if self.ctx.cancel.is_cancelled() {
                return Ok(());
            }

            if !self.should_split() {
                return self.process_sequentially().await;
            }

            let half = self.frontier.len() / 2;
            let forked: VecDeque<Url> = self.frontier.drain(..half).collect();
            let depth = self.depth + 1;
            debug!(
                "Splitting frontier of {} at depth {}: {} + {}",
                self.ctx.origin,
                self.depth,
                forked.len(),
                self.frontier.len()
            );

            let forked = CrawlTask::new(Arc::clone(&self.ctx), forked, depth);
            let handle = tokio::spawn(forked.run());

            let rest = std::mem::take(&mut self.frontier);
            let rest = CrawlTask::new(Arc::clone(&self.ctx), rest, depth);
            let rest_result = rest.run().await;
            let forked_result = handle.await?;

            rest_result.and(forked_result)
        }
        .boxed()
    }

    /// Splits only while both halves could still do work below the ceiling
    fn should_split(&self) -> bool {
        self.frontier.len() > self.ctx.split_threshold && self.depth + 1 < self.ctx.max_depth
    }

    async fn process_sequentially(mut self) -> Result<()> {
        while self.depth < self.ctx.max_depth && !self.ctx.cancel.is_cancelled() {
            let Some(url) = self.frontier.pop_front() else {
                break;
            };

            match self.process_url(&url).await {
                Ok(links) => self.frontier.extend(links),
                Err(e) => self.ctx.record_error(&url, &e),
            }

            if self.should_split() {
                let child = CrawlTask::new(
                    Arc::clone(&self.ctx),
                    std::mem::take(&mut self.frontier),
                    self.depth + 1,
                );
                return child.run().await;
            }
        }

        Ok(())
    }

    /// Fetches, stores and indexes one URL, returning newly discovered links
    async fn process_url(&self, url: &Url) -> Result<Vec<Url>> {
        let ctx = &self.ctx;

        if is_skipped_resource(url) {
            debug!("Skipping resource {}", url);
            return Ok(Vec::new());
        }

        let path = match relative_path(url, &ctx.origin) {
            Ok(path) => path,
            Err(e) => {
                debug!("Discarding {}", e);
                return Ok(Vec::new());
            }
        };

        let exists = lock(&ctx.storage)?.page_exists(ctx.site_id, &path)?;
        if exists {
            debug!("Already indexed: {}", url);
            return Ok(Vec::new());
        }

        politeness_delay(ctx.min_delay_ms, ctx.max_delay_ms).await;
        if ctx.cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let fetched = ctx.fetcher.fetch(url).await?;
        let code = ctx.fetcher.head_status(url).await;

        {
            let mut storage = lock(&ctx.storage)?;
            match ctx
                .indexer
                .index_new_page(&mut *storage, ctx.site_id, &path, code, &fetched.body)
            {
                Ok(page) => {
                    debug!("Stored {} as page {}", url, page.id);
                    ctx.pages_indexed.fetch_add(1, Ordering::Relaxed);
                }
                Err(StorageError::Conflict(what)) => {
                    warn!("Page {} already present: {}", url, what);
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e.into()),
            }
            storage.touch_site(ctx.site_id)?;
        }

        Ok(self.discover_links(&fetched.body, &fetched.url))
    }

    /// Same-origin links of a page that nothing in the lineage has queued yet
    fn discover_links(&self, body: &str, page_url: &Url) -> Vec<Url> {
        let ctx = &self.ctx;
        let mut discovered = Vec::new();

        for link in extract_links(body, page_url) {
            let Ok(link) = normalize_url(link.as_str()) else {
                continue;
            };
            if !same_host(&link, &ctx.origin) || is_skipped_resource(&link) {
                continue;
            }
            let Ok(path) = relative_path(&link, &ctx.origin) else {
                continue;
            };
            if ctx.mark_queued(&path) {
                discovered.push(link);
            }
        }

        if !discovered.is_empty() {
            debug!("Discovered {} new links on {}", discovered.len(), page_url);
        }
        discovered
    }
}
