//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl, search and stop cycle end-to-end.

use lemmascope::config::{parse_config, Config};
use lemmascope::crawler::Coordinator;
use lemmascope::state::{SiteStatus, STOPPED_BY_OPERATOR};
use lemmascope::storage::{lock, share, SqliteStorage, Storage};
use lemmascope::{LemmascopeError, SearchEngine};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling the given `(url, name)` sites
fn create_test_config(sites: &[(&str, &str)], db_path: &str) -> Config {
    create_split_config(sites, db_path, 100)
}

/// Like [`create_test_config`] with an explicit frontier split threshold
fn create_split_config(sites: &[(&str, &str)], db_path: &str, split_threshold: usize) -> Config {
    let mut toml = format!(
        r#"
[crawler]
max-depth = 5
split-threshold = {}
min-delay-ms = 0
max-delay-ms = 5
request-timeout-secs = 5

[user-agent]
user-agent = "LemmascopeTest/1.0"

[storage]
database-path = "{}"
"#,
        split_threshold, db_path
    );
    for (url, name) in sites {
        toml.push_str(&format!("\n[[sites]]\nurl = \"{}\"\nname = \"{}\"\n", url, name));
    }
    parse_config(&toml).expect("test config should be valid")
}

fn in_memory_coordinator(config: Config) -> Coordinator {
    let storage = share(SqliteStorage::new_in_memory().expect("in-memory storage"));
    Coordinator::new(config, storage).expect("Failed to create coordinator")
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_head(server: &MockServer) {
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Polls until `condition` holds or two seconds pass
async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;

    mount_page(
        &mock_server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="/page2#top">Page 2</a>
            <a href="http://other.test/x">Elsewhere</a>
            <a href="/logo.png">Logo</a>
            <a href="/missing">Missing</a>
            </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<html><head><title>Big cats</title></head><body>
            <p>Leopards climb trees.</p><a href="/a/b">Deeper</a><a href="/">Home</a>
            </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/page2",
        "<html><head><title>Page 2</title></head><body>Rivers and lakes</body></html>".to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/a/b",
        "<html><head><title>Nested</title></head><body>Mountains</body></html>".to_string(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    let config = create_test_config(&[(&base_url, "Mock")], &db_path.to_string_lossy());
    let coordinator = Coordinator::from_config(config.clone()).expect("Failed to create coordinator");

    let summary = coordinator.start_crawl().await.expect("Crawl failed");

    assert!(!coordinator.is_running());
    assert_eq!(summary.sites.len(), 1);
    assert_eq!(summary.sites[0].pages, 4);

    let storage = coordinator.storage();
    {
        let storage = lock(&storage).unwrap();
        let site = storage
            .find_site_by_url(&base_url)
            .unwrap()
            .expect("site should exist");
        assert_eq!(site.status, SiteStatus::Indexed);
        assert_eq!(storage.count_pages(site.id).unwrap(), 4);
        for page_path in ["/", "/page1", "/page2", "/a/b"] {
            let page = storage.find_page(site.id, page_path).unwrap();
            assert!(page.is_some(), "{} should be stored", page_path);
            assert_eq!(page.unwrap().code, 200);
        }
        assert!(storage.find_page(site.id, "/logo.png").unwrap().is_none());

        // The 404 is recorded on the site without failing it
        let error = site.last_error.expect("page error should be recorded");
        assert!(error.contains("/missing"), "unexpected error: {}", error);
    }

    let engine = SearchEngine::new(storage, coordinator.analyzer().clone(), &config.search);
    let response = engine.search("leopard", None, 0, 10).unwrap();
    assert_eq!(response.total_count, 1);
    assert_eq!(response.items[0].path, "/page1");
    assert_eq!(response.items[0].title, "Big cats");
    assert_eq!(response.items[0].relevance, 1.0);
    assert!(response.items[0].snippet.contains("<b>Leopards</b>"));
}

#[tokio::test]
async fn test_recrawl_purges_previous_index() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;
    mount_page(&mock_server, "/", "<p>Leopards</p>".to_string()).await;

    let coordinator = in_memory_coordinator(create_test_config(&[(&base_url, "Mock")], "unused.db"));

    coordinator.start_crawl().await.unwrap();
    coordinator.start_crawl().await.unwrap();

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();
    assert_eq!(storage.count_pages(site.id).unwrap(), 1);
    let lemma = storage.find_lemma(site.id, "leopard").unwrap().unwrap();
    assert_eq!(lemma.frequency, 1);
}

#[tokio::test]
async fn test_redirect_is_followed_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/old">Old</a><a href="/broken">Broken</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/new", "<p>Leopards moved here</p>".to_string()).await;

    let coordinator = in_memory_coordinator(create_test_config(&[(&base_url, "Mock")], "unused.db"));
    coordinator.start_crawl().await.unwrap();

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();

    let old = storage.find_page(site.id, "/old").unwrap().expect("redirected page stored");
    assert!(old.content.contains("moved here"));
    assert!(storage.find_page(site.id, "/broken").unwrap().is_none());
    assert!(site
        .last_error
        .expect("redirect failure recorded")
        .contains("/broken"));
}

#[tokio::test]
async fn test_index_single_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;
    mount_page(
        &mock_server,
        "/news/1",
        "<title>News</title><p>Leopard leopard cub</p>".to_string(),
    )
    .await;

    let coordinator = in_memory_coordinator(create_test_config(&[(&base_url, "Mock")], "unused.db"));
    let url = format!("{}/news/1", base_url);

    let page = coordinator.index_single_page(&url).await.unwrap();
    assert_eq!(page.path, "/news/1");
    coordinator.index_single_page(&url).await.unwrap();

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(storage.count_pages(site.id).unwrap(), 1);

    let lemma = storage.find_lemma(site.id, "leopard").unwrap().unwrap();
    assert_eq!(lemma.frequency, 1);
    let entry = storage.find_index_entry(page.id, lemma.id).unwrap().unwrap();
    assert_eq!(entry.rank, 2.0);
}

#[tokio::test]
async fn test_index_single_page_removes_vanished_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;
    mount_page(&mock_server, "/gone", "<p>Leopard cub</p>".to_string()).await;
    mount_page(&mock_server, "/kept", "<p>Leopard</p>".to_string()).await;

    let coordinator = in_memory_coordinator(create_test_config(&[(&base_url, "Mock")], "unused.db"));
    let gone = format!("{}/gone", base_url);
    coordinator.index_single_page(&gone).await.unwrap();
    coordinator
        .index_single_page(&format!("{}/kept", base_url))
        .await
        .unwrap();

    mock_server.reset().await;
    mount_head(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let result = coordinator.index_single_page(&gone).await;
    assert!(matches!(result, Err(LemmascopeError::FetchFailure { .. })));

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();
    assert!(storage.find_page(site.id, "/gone").unwrap().is_none());
    assert_eq!(storage.find_lemma(site.id, "leopard").unwrap().unwrap().frequency, 1);
    assert!(storage.find_lemma(site.id, "cub").unwrap().is_none());
    assert_eq!(
        site.last_error.as_deref(),
        Some(format!("Failed to fetch {}: HTTP 404", gone).as_str())
    );
}

#[tokio::test]
async fn test_index_single_page_out_of_scope() {
    let mock_server = MockServer::start().await;
    let coordinator = in_memory_coordinator(create_test_config(
        &[(&mock_server.uri(), "Mock")],
        "unused.db",
    ));

    let result = coordinator.index_single_page("http://other.test/x").await;

    assert!(matches!(result, Err(LemmascopeError::OutOfScope { .. })));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_start_while_running() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>Slow page</p>")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let coordinator = Arc::new(in_memory_coordinator(create_test_config(
        &[(&base_url, "Mock")],
        "unused.db",
    )));

    let running = Arc::clone(&coordinator);
    let crawl = tokio::spawn(async move { running.start_crawl().await });
    wait_for(|| coordinator.is_running()).await;

    let second = coordinator.start_crawl().await;
    assert!(matches!(second, Err(LemmascopeError::AlreadyRunning)));

    crawl.await.unwrap().unwrap();
    assert!(!coordinator.is_running());
    assert!(matches!(coordinator.stop_crawl(), Err(LemmascopeError::NotRunning)));
}

#[tokio::test]
async fn test_stop_fails_indexing_sites() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        mount_head(server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<p>Slow</p><a href="/next">Next</a>"#)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(server)
            .await;
        mount_page(server, "/next", "<p>Never fetched</p>".to_string()).await;
    }

    let config = create_test_config(
        &[(&first.uri(), "First"), (&second.uri(), "Second")],
        "unused.db",
    );
    let coordinator = Arc::new(in_memory_coordinator(config));
    let done_id = {
        let storage = coordinator.storage();
        let mut storage = lock(&storage).unwrap();
        storage
            .upsert_site("http://done.test", "Done", SiteStatus::Indexed)
            .unwrap()
            .id
    };

    let running = Arc::clone(&coordinator);
    let crawl = tokio::spawn(async move { running.start_crawl().await });

    let storage = coordinator.storage();
    wait_for(|| {
        lock(&storage)
            .map(|s| s.find_sites_by_status(SiteStatus::Indexing).unwrap().len() == 2)
            .unwrap_or(false)
    })
    .await;

    let stop = coordinator.stop_crawl().unwrap();
    assert_eq!(stop.stopped_sites.len(), 2);

    let summary = crawl.await.unwrap().unwrap();
    assert!(summary.sites.iter().all(|s| s.status == "FAILED"));

    let storage = lock(&storage).unwrap();
    for server in [&first, &second] {
        let site = storage.find_site_by_url(&server.uri()).unwrap().unwrap();
        assert_eq!(site.status, SiteStatus::Failed);
        assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_OPERATOR));
        assert!(storage.find_page(site.id, "/next").unwrap().is_none());
    }
    assert_eq!(storage.get_site(done_id).unwrap().status, SiteStatus::Indexed);
}

#[tokio::test]
async fn test_error_in_flight_keeps_stop_reason() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(400)))
        .mount(&mock_server)
        .await;

    let coordinator = Arc::new(in_memory_coordinator(create_test_config(
        &[(&base_url, "Mock")],
        "unused.db",
    )));

    let running = Arc::clone(&coordinator);
    let crawl = tokio::spawn(async move { running.start_crawl().await });
    wait_for(|| coordinator.is_running()).await;

    // Let the GET reach the server before stopping
    tokio::time::sleep(Duration::from_millis(100)).await;
    coordinator.stop_crawl().unwrap();
    crawl.await.unwrap().unwrap();

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Failed);
    assert_eq!(site.last_error.as_deref(), Some(STOPPED_BY_OPERATOR));
}

#[tokio::test]
async fn test_settle_failure_still_joins_other_sites() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        mount_head(server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>Leopards</p>")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(server)
            .await;
    }

    let config = create_test_config(
        &[(&first.uri(), "First"), (&second.uri(), "Second")],
        "unused.db",
    );
    let coordinator = Arc::new(in_memory_coordinator(config));

    let running = Arc::clone(&coordinator);
    let crawl = tokio::spawn(async move { running.start_crawl().await });

    let storage = coordinator.storage();
    wait_for(|| {
        lock(&storage)
            .map(|s| s.find_sites_by_status(SiteStatus::Indexing).unwrap().len() == 2)
            .unwrap_or(false)
    })
    .await;

    // The first site disappears underneath its lineage, so settling it fails
    {
        let mut storage = lock(&storage).unwrap();
        let site = storage.find_site_by_url(&first.uri()).unwrap().unwrap();
        storage.delete_site(site.id).unwrap();
    }

    let result = crawl.await.unwrap();
    assert!(result.is_err());
    assert!(!coordinator.is_running());

    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&second.uri()).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
    assert!(storage.find_page(site.id, "/").unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_split_crawl_visits_every_page_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_head(&mock_server).await;

    // Three levels of three children each below the root, every page
    // linking back to the root and to its first sibling
    let mut paths = vec!["/".to_string()];
    let mut level = vec![String::new()];
    for _ in 0..3 {
        let mut next = Vec::new();
        for parent in &level {
            for i in 1..=3 {
                next.push(format!("{}/n{}", parent, i));
            }
        }
        paths.extend(next.iter().cloned());
        level = next;
    }
    assert_eq!(paths.len(), 40);

    for page_path in &paths {
        let base = if page_path == "/" { "" } else { page_path.as_str() };
        let children: String = if page_path.matches("/n").count() < 3 {
            (1..=3)
                .map(|i| format!(r#"<a href="{}/n{}">child</a>"#, base, i))
                .collect()
        } else {
            String::new()
        };
        let body = format!(
            r#"<html><head><title>{}</title></head><body>
                <p>Leopards live here.</p>{}
                <a href="/">Home</a><a href="/n1">First</a>
                </body></html>"#,
            page_path, children
        );
        mount_page(&mock_server, page_path, body).await;
    }

    let config = create_split_config(&[(&base_url, "Mock")], "unused.db", 2);
    let coordinator = in_memory_coordinator(config);

    let summary = coordinator.start_crawl().await.unwrap();
    assert_eq!(summary.sites[0].pages, paths.len());

    let requests = mock_server.received_requests().await.unwrap_or_default();
    let mut gets: HashMap<String, usize> = HashMap::new();
    for request in requests.iter().filter(|r| r.method.to_string() == "GET") {
        *gets.entry(request.url.path().to_string()).or_default() += 1;
    }

    let storage = coordinator.storage();
    let storage = lock(&storage).unwrap();
    let site = storage.find_site_by_url(&base_url).unwrap().unwrap();
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(storage.count_pages(site.id).unwrap(), paths.len() as u64);

    for page_path in &paths {
        assert!(storage.find_page(site.id, page_path).unwrap().is_some());
        assert_eq!(gets.get(page_path), Some(&1), "GET count for {}", page_path);
    }

    let lemma = storage.find_lemma(site.id, "leopard").unwrap().unwrap();
    let pages: HashSet<i64> = storage
        .find_index_entries_by_lemma(lemma.id)
        .unwrap()
        .into_iter()
        .map(|entry| entry.page_id)
        .collect();
    assert_eq!(lemma.frequency, pages.len() as i64);
    assert_eq!(lemma.frequency, paths.len() as i64);
}
