use crate::analyzer::TextAnalyzer;
use crate::config::SearchConfig;
use crate::search::types::{SearchResponse, SearchResult};
use crate::storage::{lock, LemmaRecord, SharedStorage, SiteRecord, Storage};
use crate::url::origin_key;
use crate::{LemmascopeError, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Lemmas of one site that survived frequency filtering
struct SiteLemmas<'a> {
    site: &'a SiteRecord,
    lemmas: Vec<LemmaRecord>,
}

/// A matching page before titles and snippets are built
struct Candidate<'a> {
    site: &'a SiteRecord,
    page_id: i64,
    relevance: f64,
}

/// Ranks indexed pages against keyword queries
#[derive(Clone)]
pub struct SearchEngine {
    storage: SharedStorage,
    analyzer: TextAnalyzer,
    frequency_threshold: f64,
}

impl SearchEngine {
    pub fn new(storage: SharedStorage, analyzer: TextAnalyzer, config: &SearchConfig) -> Self {
        Self {
            storage,
            analyzer,
            frequency_threshold: config.frequency_threshold,
        }
    }

    /// Searches the index
    ///
    /// `site` restricts the search to one indexed origin. Results are sorted by
    /// relevance, highest first; `offset` and `limit` select the returned
    /// slice while `total_count` reports every match.
    ///
    /// # Errors
    ///
    /// * `NoLemmasExtracted` - The query holds no indexable word
    /// * `SiteNotIndexed` - `site` names an origin with no index
    /// * `NoSitesIndexed` - Nothing has been indexed yet
    pub fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResponse> {
        let storage = lock(&self.storage)?;
        self.search_in(&*storage, query, site, offset, limit)
    }

    /// Runs a search against a specific storage backend
    pub fn search_in<S: Storage>(
        &self,
        storage: &S,
        query: &str,
        site: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResponse> {
        let query_lemmas = self.analyzer.extract_query_lemmas(query);
        if query_lemmas.is_empty() {
            return Err(LemmascopeError::NoLemmasExtracted);
        }
        info!("Searching for {:?} (lemmas {:?})", query, query_lemmas);

        let sites = resolve_sites(storage, site)?;

        let mut per_site = Vec::new();
        for site in &sites {
            let lemmas = self.filter_lemmas(storage, site, &query_lemmas)?;
            if !lemmas.is_empty() {
                per_site.push(SiteLemmas { site, lemmas });
            }
        }

        if per_site.is_empty() {
            debug!("No query lemma survived frequency filtering");
            return Ok(SearchResponse::empty());
        }

        let mut candidates = Vec::new();
        for site_lemmas in &per_site {
            candidates.extend(matching_pages(storage, site_lemmas)?);
        }

        if candidates.is_empty() {
            debug!("No page contains every query lemma");
            return Ok(SearchResponse::empty());
        }

        let max_relevance = candidates
            .iter()
            .map(|c| c.relevance)
            .fold(f64::MIN, f64::max);
        for candidate in &mut candidates {
            candidate.relevance /= max_relevance;
        }

        candidates.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.site.id.cmp(&b.site.id))
                .then_with(|| a.page_id.cmp(&b.page_id))
        });

        let total_count = candidates.len();
        let start = offset.min(total_count);
        let end = offset.saturating_add(limit).min(total_count);

        let items = candidates[start..end]
            .iter()
            .map(|candidate| self.build_result(storage, candidate, &query_lemmas))
            .collect::<Result<Vec<_>>>()?;

        info!("Found {} pages, returning {}", total_count, items.len());
        Ok(SearchResponse { total_count, items })
    }

    /// Looks up the query lemmas on a site, dropping those on too many pages
    ///
    /// The result is ordered rarest first.
    fn filter_lemmas<S: Storage>(
        &self,
        storage: &S,
        site: &SiteRecord,
        query_lemmas: &[String],
    ) -> Result<Vec<LemmaRecord>> {
        let total_pages = storage.count_pages(site.id)?;
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for text in query_lemmas {
            if !seen.insert(text.as_str()) {
                continue;
            }
            let Some(lemma) = storage.find_lemma(site.id, text)? else {
                continue;
            };
            let ratio = if total_pages == 0 {
                f64::INFINITY
            } else {
                lemma.frequency as f64 / total_pages as f64
            };
            if ratio < self.frequency_threshold {
                debug!("Keeping {:?} on {} (ratio {:.2})", text, site.url, ratio);
                kept.push(lemma);
            } else {
                debug!("Dropping {:?} on {} (ratio {:.2})", text, site.url, ratio);
            }
        }

        kept.sort_by_key(|lemma| lemma.frequency);
        Ok(kept)
    }

    fn build_result<S: Storage>(
        &self,
        storage: &S,
        candidate: &Candidate<'_>,
        query_lemmas: &[String],
    ) -> Result<SearchResult> {
        let page = storage.get_page(candidate.page_id)?;
        Ok(SearchResult {
            site_url: candidate.site.url.clone(),
            site_name: candidate.site.name.clone(),
            path: page.path,
            title: self.analyzer.extract_title(&page.content),
            snippet: self.analyzer.build_snippet(&page.content, query_lemmas),
            relevance: candidate.relevance,
        })
    }
}

fn resolve_sites<S: Storage>(storage: &S, site: Option<&str>) -> Result<Vec<SiteRecord>> {
    match site.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => storage
            .find_site_by_url(&origin_key(url))?
            .map(|site| vec![site])
            .ok_or_else(|| LemmascopeError::SiteNotIndexed(url.to_string())),
        None => {
            let sites = storage.all_sites()?;
            if sites.is_empty() {
                return Err(LemmascopeError::NoSitesIndexed);
            }
            Ok(sites)
        }
    }
}

/// Pages of one site holding every surviving lemma, with absolute relevance
fn matching_pages<'a, S: Storage>(
    storage: &S,
    site_lemmas: &SiteLemmas<'a>,
) -> Result<Vec<Candidate<'a>>> {
    let mut relevance: Option<HashMap<i64, f64>> = None;

    for lemma in &site_lemmas.lemmas {
        let postings: HashMap<i64, f64> = storage
            .find_index_entries_by_lemma(lemma.id)?
            .into_iter()
            .map(|entry| (entry.page_id, entry.rank))
            .collect();

        let next = match relevance {
            None => postings,
            Some(mut pages) => {
                pages.retain(|page_id, _| postings.contains_key(page_id));
                for (page_id, sum) in pages.iter_mut() {
                    *sum += postings.get(page_id).copied().unwrap_or(0.0);
                }
                pages
            }
        };

        if next.is_empty() {
            return Ok(Vec::new());
        }
        relevance = Some(next);
    }

    Ok(relevance
        .unwrap_or_default()
        .into_iter()
        .map(|(page_id, relevance)| Candidate {
            site: site_lemmas.site,
            page_id,
            relevance,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use crate::indexer::Indexer;
    use crate::state::SiteStatus;
    use crate::storage::{share, SqliteStorage};

    /// Site A: ten pages. "tree" on 8, "bird" on 8, "cat" on 2 (once on /p0,
    /// three times on /p1), "fish" on 2.
    /// Site B: three pages, "cat" once on /q0.
    fn engine() -> SearchEngine {
        let analyzer = TextAnalyzer::for_language(Language::English);
        let indexer = Indexer::new(analyzer.clone());
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let a = storage
            .upsert_site("http://a.test", "Site A", SiteStatus::Indexed)
            .unwrap();
        let bodies = [
            "tree cat",
            "tree cat cat cat",
            "tree bird",
            "tree bird",
            "tree bird",
            "tree bird",
            "tree bird",
            "tree bird",
            "bird fish",
            "bird fish",
        ];
        for (i, body) in bodies.iter().enumerate() {
            let html = format!("<title>Page {}</title><p>{}</p>", i, body);
            indexer
                .index_new_page(&mut storage, a.id, &format!("/p{}", i), 200, &html)
                .unwrap();
        }

        let b = storage
            .upsert_site("http://b.test", "Site B", SiteStatus::Indexed)
            .unwrap();
        for (i, body) in ["cat dog", "dog", "bird"].iter().enumerate() {
            indexer
                .index_new_page(&mut storage, b.id, &format!("/q{}", i), 200, body)
                .unwrap();
        }

        SearchEngine::new(share(storage), analyzer, &SearchConfig::default())
    }

    #[test]
    fn test_relevance_is_normalized_and_sorted() {
        let response = engine().search("cat", Some("http://a.test"), 0, 10).unwrap();

        assert_eq!(response.total_count, 2);
        assert_eq!(response.items[0].path, "/p1");
        assert_eq!(response.items[0].relevance, 1.0);
        assert_eq!(response.items[1].path, "/p0");
        assert!((response.items[1].relevance - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(response.items[0].title, "Page 1");
        assert!(response.items[0].snippet.contains("<b>cat</b>"));
        assert_eq!(response.items[0].site_name, "Site A");
    }

    #[test]
    fn test_search_across_sites() {
        let response = engine().search("cat", None, 0, 10).unwrap();

        assert_eq!(response.total_count, 3);
        assert_eq!(response.items[0].relevance, 1.0);
        for pair in response.items.windows(2) {
            assert!(pair[0].relevance >= pair[1].relevance);
        }
        assert!(response
            .items
            .iter()
            .all(|item| item.relevance > 0.0 && item.relevance <= 1.0));
        assert!(response.items.iter().any(|item| item.site_url == "http://b.test"));
    }

    #[test]
    fn test_common_lemma_is_ignored() {
        let engine = engine();

        let common = engine.search("tree", Some("http://a.test"), 0, 10).unwrap();
        assert_eq!(common, SearchResponse::empty());

        let mixed = engine.search("trees cat", Some("http://a.test"), 0, 10).unwrap();
        assert_eq!(mixed.total_count, 2);
    }

    #[test]
    fn test_rare_lemma_is_kept() {
        let response = engine().search("fish", None, 0, 10).unwrap();
        assert_eq!(response.total_count, 2);
    }

    #[test]
    fn test_disjoint_lemmas_yield_no_pages() {
        let response = engine().search("cat fish", Some("http://a.test"), 0, 10).unwrap();
        assert_eq!(response, SearchResponse::empty());
    }

    #[test]
    fn test_pagination() {
        let engine = engine();

        let page = engine.search("cat", None, 1, 1).unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 1);

        let past_end = engine.search("cat", None, 5, 10).unwrap();
        assert_eq!(past_end.total_count, 3);
        assert!(past_end.items.is_empty());
    }

    #[test]
    fn test_service_words_only() {
        let result = engine().search("the and of", None, 0, 10);
        assert!(matches!(result, Err(LemmascopeError::NoLemmasExtracted)));
    }

    #[test]
    fn test_unknown_site() {
        let result = engine().search("cat", Some("http://missing.test"), 0, 10);
        assert!(matches!(result, Err(LemmascopeError::SiteNotIndexed(_))));
    }

    #[test]
    fn test_empty_catalog() {
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        let engine = SearchEngine::new(
            storage,
            TextAnalyzer::for_language(Language::English),
            &SearchConfig::default(),
        );

        let result = engine.search("cat", None, 0, 10);
        assert!(matches!(result, Err(LemmascopeError::NoSitesIndexed)));
    }
}
