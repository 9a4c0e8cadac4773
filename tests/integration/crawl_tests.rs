//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use rufus::config::{Config, TabularFormat};
use rufus::crawler::{Coordinator, KeywordRefiner, RefineFuture, RenderError, Renderer};
use rufus::state::SkipReason;
use rufus::ContentRecord;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration writing into `dir`
fn create_test_config(dir: &Path, max_depth: u32) -> Config {
    let mut config = Config::default();
    config.crawler.max_depth = max_depth;
    config.crawler.max_concurrent_fetches = 4;
    config.crawler.politeness_delay_min_ms = 0;
    config.crawler.politeness_delay_max_ms = 0;
    config.crawler.backoff_base_ms = 1;
    config.crawler.backoff_max_ms = 5;
    config.crawler.per_request_timeout_ms = 5_000;
    config.output.json_path = dir.join("output.json");
    config.output.tabular_path = dir.join("output.csv");
    config.output.persist_backoff_ms = 1;
    config
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

/// Accepts every HEAD request; mount after any specific HEAD mocks
async fn mount_head_ok(server: &MockServer) {
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("Failed to read JSON output");
    serde_json::from_str(&text).expect("Output is not valid JSON")
}

#[tokio::test]
async fn test_relevant_sections_only() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let seed = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header_exists("user-agent"))
        .and(header("referer", seed.as_str()))
        .respond_with(html_page(
            "<h1>AI News</h1>\
             <p>AI is transforming industries</p>\
             <p>Weather today is sunny</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(dir.path(), 1), &seed, "AI").unwrap();
    let outcome = coordinator.run_with_results().await;

    assert_eq!(outcome.report.pages_accepted, 1);
    assert!(outcome.report.aborted.is_none());

    let mut expected = serde_json::Map::new();
    expected.insert(
        seed.clone(),
        serde_json::json!({ "AI News": ["AI is transforming industries"] }),
    );
    let json = read_json(&dir.path().join("output.json"));
    assert_eq!(json, serde_json::Value::Object(expected));

    let csv = std::fs::read_to_string(dir.path().join("output.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("URL,Heading,Content"));
    assert_eq!(
        lines.next(),
        Some(format!("{},AI News,AI is transforming industries", seed).as_str())
    );
}

#[tokio::test]
async fn test_duplicate_content_is_discarded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let content = "<h2>AI</h2><p>AI research roundup</p><a href=\"/about\">About</a>";

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(content))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html_page(content))
        .expect(1)
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let seed = format!("{}/", server.uri());
    let coordinator = Coordinator::new(create_test_config(dir.path(), 2), &seed, "AI").unwrap();
    let outcome = coordinator.run_with_results().await;

    assert_eq!(outcome.report.pages_fetched, 2);
    assert_eq!(outcome.report.pages_accepted, 1);
    assert_eq!(outcome.report.pages_duplicate, 1);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results.get(&seed).is_some());
}

#[tokio::test]
async fn test_redirect_onto_linked_page_fetches_it_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            "<h1>AI</h1><p>AI hub</p>\
             <a href=\"/old\">AI archive</a>\
             <a href=\"/new\">AI latest</a>",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_page("<h1>AI</h1><p>AI moved here</p>"))
        .expect(1)
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(create_test_config(dir.path(), 2), &seed, "AI")
        .unwrap()
        .run_with_results()
        .await;

    assert_eq!(outcome.report.pages_fetched, 2);
    assert_eq!(outcome.report.pages_duplicate, 0);
    assert_eq!(
        outcome.report.skip_reasons.get(&SkipReason::RedirectVisited),
        Some(&1)
    );
    assert!(outcome.results.get(&format!("{}/new", server.uri())).is_some());
    assert!(outcome.results.get(&format!("{}/old", server.uri())).is_none());
    assert!(outcome.report.aborted.is_none());
}

#[tokio::test]
async fn test_depth_one_fetches_no_children() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let links: String = (1..=5)
        .map(|i| format!("<a href=\"/child{}\">AI child {}</a>", i, i))
        .collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!("<h1>AI</h1><p>AI hub</p>{}", links)))
        .expect(1)
        .mount(&server)
        .await;

    for i in 1..=5 {
        Mock::given(method("GET"))
            .and(path(format!("/child{}", i)))
            .respond_with(html_page("<h1>AI</h1><p>AI child</p>"))
            .expect(0)
            .mount(&server)
            .await;
    }

    // No validation happens at the depth floor either
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let report = Coordinator::new(create_test_config(dir.path(), 1), &seed, "AI")
        .unwrap()
        .run()
        .await;

    assert_eq!(report.pages_dispatched, 1);
    assert_eq!(report.pages_accepted, 1);
}

#[tokio::test]
async fn test_depth_two_stops_at_grandchildren() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("<h1>AI</h1><p>AI hub</p><a href=\"/child\">AI child</a>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/child"))
        .respond_with(html_page(
            "<h1>AI</h1><p>AI child page</p><a href=\"/grandchild\">AI deeper</a>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/grandchild"))
        .respond_with(html_page("<h1>AI</h1><p>AI grandchild</p>"))
        .expect(0)
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(create_test_config(dir.path(), 2), &seed, "AI")
        .unwrap()
        .run_with_results()
        .await;

    assert_eq!(outcome.report.pages_dispatched, 2);
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_retries_are_bounded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // One initial attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config(dir.path(), 1);
    config.crawler.max_retries_on_rate_limit = 2;

    let seed = format!("{}/", server.uri());
    let report = Coordinator::new(config, &seed, "AI").unwrap().run().await;

    assert_eq!(report.pages_accepted, 0);
    assert_eq!(report.skip_reasons.get(&SkipReason::RateLimited), Some(&1));
}

#[tokio::test]
async fn test_rate_limit_recovers_within_budget() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("<h1>AI</h1><p>AI after backoff</p>"))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let report = Coordinator::new(create_test_config(dir.path(), 1), &seed, "AI")
        .unwrap()
        .run()
        .await;

    assert_eq!(report.pages_accepted, 1);
}

#[tokio::test]
async fn test_links_failing_validation_are_not_fetched() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            "<h1>AI</h1><p>AI hub</p>\
             <a href=\"/ok\">AI ok</a>\
             <a href=\"/missing\">AI missing</a>",
        ))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(html_page("<h1>AI</h1><p>AI should not be fetched</p>"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html_page("<h1>AI</h1><p>AI ok page</p>"))
        .expect(1)
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(create_test_config(dir.path(), 2), &seed, "AI")
        .unwrap()
        .run_with_results()
        .await;

    assert_eq!(outcome.results.len(), 2);
    assert!(outcome
        .results
        .get(&format!("{}/missing", server.uri()))
        .is_none());
}

#[tokio::test]
async fn test_max_pages_stops_crawl() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let links: String = (1..=6)
        .map(|i| format!("<a href=\"/p{}\">AI {}</a>", i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!("<h1>AI</h1><p>AI index</p>{}", links)))
        .mount(&server)
        .await;

    for i in 1..=6 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(html_page(&format!("<h1>AI</h1><p>AI story number {}</p>", i)))
            .mount(&server)
            .await;
    }

    mount_head_ok(&server).await;

    let mut config = create_test_config(dir.path(), 2);
    config.crawler.max_pages = Some(3);

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(config, &seed, "AI")
        .unwrap()
        .run_with_results()
        .await;

    assert_eq!(outcome.report.pages_accepted, 3);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome
        .report
        .aborted
        .as_deref()
        .is_some_and(|reason| reason.contains("page limit")));

    let json = read_json(&dir.path().join("output.json"));
    assert_eq!(json.as_object().map(|o| o.len()), Some(3));
}

#[tokio::test]
async fn test_failure_rate_aborts_session() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let links: String = (1..=10)
        .map(|i| format!("<a href=\"/broken{}\">AI {}</a>", i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!("<h1>AI</h1><p>AI index</p>{}", links)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let mut config = create_test_config(dir.path(), 2);
    config.crawler.max_concurrent_fetches = 1;
    config.breaker.window = 4;
    config.breaker.min_samples = 4;
    config.breaker.max_failure_rate = 0.75;

    let seed = format!("{}/", server.uri());
    let report = Coordinator::new(config, &seed, "AI").unwrap().run().await;

    assert!(report
        .aborted
        .as_deref()
        .is_some_and(|reason| reason.contains("failure rate")));
    assert!(report.pages_dispatched < 11);

    // The page accepted before the abort is still on disk
    let json = read_json(&dir.path().join("output.json"));
    assert!(json.get(&seed).is_some());
}

#[tokio::test]
async fn test_sqlite_tabular_output() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            "<h1>AI</h1><p>AI one</p><li>AI two</li><h2>Other</h2><p>nothing here</p>",
        ))
        .mount(&server)
        .await;

    let mut config = create_test_config(dir.path(), 1);
    config.output.tabular_format = TabularFormat::Sqlite;
    config.output.tabular_path = dir.path().join("output.db");

    let seed = format!("{}/", server.uri());
    Coordinator::new(config, &seed, "AI").unwrap().run().await;

    let conn = rusqlite::Connection::open(dir.path().join("output.db")).unwrap();
    let (url, heading, content): (String, String, String) = conn
        .query_row("SELECT url, heading, content FROM records", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();

    assert_eq!(url, seed);
    assert_eq!(heading, "AI");
    assert_eq!(content, "AI one AI two");
}

struct FixedRenderer;

impl Renderer for FixedRenderer {
    fn render(&self, _url: &url::Url, _cancel: &CancellationToken) -> Result<String, RenderError> {
        Ok("<html><body><h1>AI Feed</h1><p>AI loaded by script</p></body></html>".to_string())
    }
}

#[tokio::test]
async fn test_renderer_fallback_for_script_shell() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<div id="root"></div><script src="/app.js"></script>"#))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(create_test_config(dir.path(), 1), &seed, "AI")
        .unwrap()
        .with_renderer(Arc::new(FixedRenderer))
        .run_with_results()
        .await;

    assert_eq!(outcome.report.pages_rendered, 1);
    let record = outcome.results.get(&seed).unwrap();
    assert_eq!(record.get("AI Feed"), Some(&["AI loaded by script".to_string()][..]));
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _url: &url::Url, _cancel: &CancellationToken) -> Result<String, RenderError> {
        Err(RenderError::EmptyOutput)
    }
}

#[tokio::test]
async fn test_render_failure_keeps_static_result() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Relevant text but a script shell marker, so rendering is attempted
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<div data-reactroot><h1>AI</h1><p>AI static text</p></div>"#,
        ))
        .mount(&server)
        .await;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(create_test_config(dir.path(), 1), &seed, "AI")
        .unwrap()
        .with_renderer(Arc::new(FailingRenderer))
        .run_with_results()
        .await;

    assert_eq!(outcome.report.pages_rendered, 0);
    assert_eq!(outcome.report.pages_accepted, 1);
}

struct StaticRefiner;

impl KeywordRefiner for StaticRefiner {
    fn refine<'a>(&'a self, _record: &'a ContentRecord, _instruction: &'a str) -> RefineFuture<'a> {
        Box::pin(async { Ok(vec!["robotics".to_string()]) })
    }
}

#[tokio::test]
async fn test_refined_keywords_reach_later_pages() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            "<h1>AI</h1><p>AI overview</p><a href=\"/next\">next</a>",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("<h1>Robotics</h1><p>Robotics in factories</p>"))
        .mount(&server)
        .await;

    mount_head_ok(&server).await;

    let mut config = create_test_config(dir.path(), 2);
    // Give the refinement time to land before the child starts
    config.crawler.politeness_delay_min_ms = 300;
    config.crawler.politeness_delay_max_ms = 300;

    let seed = format!("{}/", server.uri());
    let outcome = Coordinator::new(config, &seed, "AI")
        .unwrap()
        .with_refiner(Arc::new(StaticRefiner))
        .run_with_results()
        .await;

    assert_eq!(outcome.report.final_keywords, vec!["robotics".to_string()]);
    let next = format!("{}/next", server.uri());
    assert_eq!(
        outcome.results.get(&next).and_then(|r| r.get("Robotics")),
        Some(&["Robotics in factories".to_string()][..])
    );
}
