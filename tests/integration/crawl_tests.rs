//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the listings site and run the
//! full cycle: landing page, region pages, activities endpoint, detail pages
//! and the output files.

use listing_harvest::config::Config;
use listing_harvest::crawler::{crawl, Coordinator};
use listing_harvest::output::{OutputError, OutputResult, RecordSink};
use listing_harvest::{CompanyRecord, HarvestError};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/wp-json/FH/activities";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = base_url.to_string();
    config.site.api_url = format!("{}{}", base_url, API_PATH);
    config.crawler.workers = 4;
    config.crawler.max_attempts = 5;
    config.crawler.initial_backoff_ms = 1;
    config.crawler.max_backoff_ms = 5;
    config.crawler.request_timeout_secs = 10;
    config.output.records_path = dir.join("data.csv").to_string_lossy().into_owned();
    config.output.dead_letter_path = dir.join("dead_letters.csv").to_string_lossy().into_owned();
    config
}

fn landing_page(regions: &[(&str, &str)]) -> String {
    let body: String = regions
        .iter()
        .map(|(name, link)| {
            format!(
                r#"<div class="inner prose"><h4>{}</h4></div><a class="link a-image-button" href="{}">Explore</a>"#,
                name, link
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", body)
}

fn region_page(post_id: Option<&str>) -> String {
    match post_id {
        Some(id) => format!(
            r#"<html><body><div id="activity-grid-1" data-post-id="{}"></div></body></html>"#,
            id
        ),
        None => "<html><body><p>Nothing listed yet</p></body></html>".to_string(),
    }
}

fn detail_page(website: Option<&str>) -> String {
    match website {
        Some(href) => format!(
            r#"<html><body><div class="button-block"><a href="/book">Book</a></div><div class="button-block"><a href="{}">Website</a></div></body></html>"#,
            href
        ),
        None => r#"<html><body><div class="button-block"></div></body></html>"#.to_string(),
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

async fn mount_landing(server: &MockServer, regions: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(landing_page(regions)))
        .mount(server)
        .await;
}

async fn mount_region(server: &MockServer, link: &str, post_id: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(link))
        .and(query_param("page", "1"))
        .respond_with(html(region_page(post_id)))
        .mount(server)
        .await;
}

async fn mount_batch(server: &MockServer, post_id: &str, companies: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("post_id", post_id))
        .and(query_param("key", "rows_2_grid_activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(companies))
        .mount(server)
        .await;
}

fn read_lines(path: &str) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Record sink that keeps every appended batch in memory
#[derive(Clone, Default)]
struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<CompanyRecord>>>>,
}

impl RecordSink for MemorySink {
    fn append_rows(&self, rows: &[CompanyRecord]) -> OutputResult<()> {
        self.batches.lock().unwrap().push(rows.to_vec());
        Ok(())
    }
}

/// Record sink whose every append fails
struct FailingSink;

impl RecordSink for FailingSink {
    fn append_rows(&self, _rows: &[CompanyRecord]) -> OutputResult<()> {
        Err(OutputError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

#[tokio::test]
async fn test_full_harvest_two_regions() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps"), ("Coast", "/coast")]).await;
    mount_region(&mock_server, "/alps", Some("42")).await;
    mount_region(&mock_server, "/coast", None).await;
    mount_batch(
        &mock_server,
        "42",
        json!([{
            "title": "Acme Tours",
            "taxonomies": {"activity_category": {"termString": "Hiking"}},
            "link": "/co/acme"
        }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/acme"))
        .respond_with(html(detail_page(Some("http://acme.example"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();
    let dead_letter_path = config.output.dead_letter_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert_eq!(
        read_lines(&records_path),
        vec!["Alps;Acme Tours;Hiking;;http://acme.example"]
    );
    // Both files are created up front, even when nothing is dead-lettered
    assert!(Path::new(&dead_letter_path).exists());
    assert!(read_lines(&dead_letter_path).is_empty());

    assert_eq!(stats.regions_discovered, 2);
    assert_eq!(stats.regions_completed, 1);
    assert_eq!(stats.failed_regions, vec!["Coast".to_string()]);
    assert_eq!(stats.records_written, 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("7")).await;
    mount_batch(
        &mock_server,
        "7",
        json!([{"title": "Flaky Rafting", "link": "/co/flaky", "taxonomies": []}]),
    )
    .await;

    // Three challenge responses, then the real page
    Mock::given(method("GET"))
        .and(path("/co/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/co/flaky"))
        .respond_with(html(detail_page(Some("https://flaky.example"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert_eq!(
        read_lines(&records_path),
        vec!["Alps;Flaky Rafting;;;https://flaky.example"]
    );
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.dead_letters, 0);
}

#[tokio::test]
async fn test_exhausted_retries_produce_dead_letter() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("7")).await;
    mount_batch(
        &mock_server,
        "7",
        json!([
            {"title": "Down Kayaks", "link": "/co/down"},
            {"title": "Up Kayaks", "link": "/co/up"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/co/up"))
        .respond_with(html(detail_page(Some("https://up.example"))))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.crawler.max_attempts = 3;
    let records_path = config.output.records_path.clone();
    let dead_letter_path = config.output.dead_letter_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert_eq!(
        read_lines(&records_path),
        vec!["Alps;Up Kayaks;;;https://up.example"]
    );

    let letters = read_lines(&dead_letter_path);
    assert_eq!(letters.len(), 1);
    assert!(
        letters[0].starts_with("Alps;Down Kayaks;/co/down;3;retries exhausted"),
        "unexpected dead letter: {}",
        letters[0]
    );

    assert_eq!(stats.regions_completed, 1);
    assert_eq!(stats.records_written, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.dead_letters, 1);
}

#[tokio::test]
async fn test_malformed_company_is_not_retried() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("7")).await;
    mount_batch(
        &mock_server,
        "7",
        json!([
            {"title": "No Link Lodge"},
            {"title": "Good Guides", "link": "/co/good",
             "taxonomies": {"location": {"termString": "Zermatt"}}}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/good"))
        .respond_with(html(detail_page(None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();
    let dead_letter_path = config.output.dead_letter_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    // A detail page without a website link still yields a record
    assert_eq!(read_lines(&records_path), vec!["Alps;Good Guides;;Zermatt;"]);

    let letters = read_lines(&dead_letter_path);
    assert_eq!(letters.len(), 1);
    assert!(letters[0].starts_with("Alps;No Link Lodge;;1;listing has no link"));
    assert_eq!(stats.retries, 0);
}

#[tokio::test]
async fn test_records_independent_of_completion_order() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let companies: Vec<serde_json::Value> = (0..20)
        .map(|n| {
            json!({
                "title": format!("Company {:02}", n),
                "link": format!("/co/{}", n),
                "taxonomies": {"activity_category": {"termString": "Climbing"}}
            })
        })
        .collect();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("9")).await;
    mount_batch(&mock_server, "9", serde_json::Value::Array(companies)).await;
    for n in 0..20u64 {
        // Later companies answer faster, so completion order differs from batch order
        Mock::given(method("GET"))
            .and(path(format!("/co/{}", n)))
            .respond_with(
                html(detail_page(Some(&format!("https://c{}.example", n))))
                    .set_delay(Duration::from_millis((20 - n) * 5)),
            )
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server.uri(), dir.path());
    let sink = MemorySink::default();
    let coordinator = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_record_sink(Box::new(sink.clone()));

    let stats = coordinator.run().await.expect("Harvest failed");
    coordinator.shutdown().await.expect("Shutdown failed");

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1, "one append per region");

    let mut records = batches[0].clone();
    records.sort();
    let expected: Vec<CompanyRecord> = (0..20)
        .map(|n| CompanyRecord {
            region: "Alps".to_string(),
            title: format!("Company {:02}", n),
            category: "Climbing".to_string(),
            location: String::new(),
            website: format!("https://c{}.example", n),
        })
        .collect();
    assert_eq!(records, expected);
    assert_eq!(stats.records_written, 20);
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_next_region() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps"), ("Coast", "/coast")]).await;
    mount_region(&mock_server, "/alps", Some("1")).await;
    mount_region(&mock_server, "/coast", Some("2")).await;
    mount_batch(&mock_server, "1", json!({"error": "not a list"})).await;
    mount_batch(
        &mock_server,
        "2",
        json!([{"title": "Surf School", "link": "/co/surf"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/surf"))
        .respond_with(html(detail_page(Some("https://surf.example"))))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert_eq!(
        read_lines(&records_path),
        vec!["Coast;Surf School;;;https://surf.example"]
    );
    assert_eq!(stats.failed_regions, vec!["Alps".to_string()]);
    assert_eq!(stats.regions_completed, 1);
}

#[tokio::test]
async fn test_region_mismatch_aborts_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body>
            <div class="inner prose"><h4>Alps</h4></div>
            <div class="inner prose"><h4>Coast</h4></div>
            <a class="link a-image-button" href="/alps">Explore</a>
            </body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let result = crawl(config).await;

    assert!(matches!(
        result,
        Err(HarvestError::RegionMismatch { names: 2, links: 1 })
    ));
}

#[tokio::test]
async fn test_landing_page_failure_aborts_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();
    let result = crawl(config).await;

    assert!(matches!(result, Err(HarvestError::Fetch(_))));
    assert!(read_lines(&records_path).is_empty());
}

#[tokio::test]
async fn test_unopenable_records_file_aborts_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(html(landing_page(&[("Alps", "/alps")])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), dir.path());
    config.output.records_path = dir
        .path()
        .join("missing")
        .join("data.csv")
        .to_string_lossy()
        .into_owned();

    let result = crawl(config).await;

    assert!(matches!(result, Err(HarvestError::Output(_))));
}

#[tokio::test]
async fn test_record_write_failure_keeps_dead_letters_and_stops_run() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps"), ("Coast", "/coast")]).await;
    mount_region(&mock_server, "/alps", Some("1")).await;
    mount_batch(
        &mock_server,
        "1",
        json!([
            {"title": "No Link Lodge"},
            {"title": "Good Guides", "link": "/co/good"}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/good"))
        .respond_with(html(detail_page(Some("https://good.example"))))
        .mount(&mock_server)
        .await;
    // The run stops after the first region
    Mock::given(method("GET"))
        .and(path("/coast"))
        .respond_with(html(region_page(Some("2"))))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let dead_letter_path = config.output.dead_letter_path.clone();
    let coordinator = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_record_sink(Box::new(FailingSink));

    let result = coordinator.run().await;
    coordinator.shutdown().await.expect("Shutdown failed");

    match result {
        Err(HarvestError::RegionPersist {
            region,
            dead_letters,
            records,
            ..
        }) => {
            assert_eq!(region, "Alps");
            assert_eq!(dead_letters, 1);
            assert_eq!(records, 1);
        }
        other => panic!("expected a persistence failure, got {:?}", other),
    }

    let letters = read_lines(&dead_letter_path);
    assert_eq!(letters.len(), 1);
    assert!(letters[0].starts_with("Alps;No Link Lodge;;1;listing has no link"));
}

#[tokio::test]
async fn test_transient_then_not_found_is_dead_lettered() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("7")).await;
    mount_batch(
        &mock_server,
        "7",
        json!([{"title": "Gone Gliding", "link": "/co/gone"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/co/gone"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/co/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();
    let dead_letter_path = config.output.dead_letter_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert!(read_lines(&records_path).is_empty());

    let letters = read_lines(&dead_letter_path);
    assert_eq!(letters.len(), 1);
    assert!(
        letters[0].starts_with("Alps;Gone Gliding;/co/gone;2;HTTP 404"),
        "unexpected dead letter: {}",
        letters[0]
    );
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.dead_letters, 1);
    assert_eq!(stats.records_written, 0);
}

#[tokio::test]
async fn test_listing_without_title_is_kept() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&mock_server, &[("Alps", "/alps")]).await;
    mount_region(&mock_server, "/alps", Some("7")).await;
    mount_batch(&mock_server, "7", json!([{"link": "/co/acme"}])).await;
    Mock::given(method("GET"))
        .and(path("/co/acme"))
        .respond_with(html(detail_page(Some("http://acme.example"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let records_path = config.output.records_path.clone();
    let dead_letter_path = config.output.dead_letter_path.clone();

    let stats = crawl(config).await.expect("Harvest failed");

    assert_eq!(read_lines(&records_path), vec!["Alps;;;;http://acme.example"]);
    assert!(read_lines(&dead_letter_path).is_empty());
    assert_eq!(stats.companies, 1);
    assert_eq!(stats.dead_letters, 0);
}
