//! End-to-end harvest runs against a mocked catalog and document host,
//! uploading into an in-memory object store.

use std::time::Duration;

use httpmock::prelude::*;
use tempfile::tempdir;
use url::Url;

use archive_ingest::catalog::{CatalogLister, CatalogWriter};
use archive_ingest::config::CatalogConfig;
use archive_ingest::fetch::Downloader;
use archive_ingest::harvest::Harvester;
use archive_ingest::retry::RetryPolicy;
use archive_ingest::store::DocumentStore;

fn catalog_page(rows: &[(&str, &str)]) -> String {
    let mut body = String::from(
        "<html><body><table>\n<tr><th>Record Number</th><th>NARA Release Date</th></tr>\n",
    );
    for (name, date) in rows {
        body.push_str(&format!(
            "<tr><td><a href=\"/files/{name}\">{name}</a></td><td>{date}</td></tr>\n"
        ));
    }
    body.push_str("</table></body></html>");
    body
}

const EMPTY_PAGE: &str = "<html><body><p>No further records.</p></body></html>";

fn lister_for(server: &MockServer, retry: RetryPolicy) -> CatalogLister {
    let config = CatalogConfig::new(Url::parse(&server.url("/records")).unwrap());
    let client = archive_ingest::fetch::http_client(&config.user_agent).unwrap();
    CatalogLister::new(client, config, retry)
}

fn harvester_for(
    server: &MockServer,
    store: DocumentStore,
    output_dir: &std::path::Path,
) -> Harvester {
    let client = archive_ingest::fetch::http_client("archive-ingest-tests").unwrap();
    Harvester::builder()
        .lister(lister_for(server, RetryPolicy::none()))
        .downloader(Downloader::new(client, RetryPolicy::none()))
        .store(store)
        .writer(CatalogWriter::new(output_dir))
        .build()
}

#[tokio::test]
async fn run_reports_exact_success_and_failure_counts() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(200).body(catalog_page(&[
                ("doc-1.pdf", "July 2025"),
                ("doc-2.pdf", "July 2025"),
                ("doc-3.pdf", "July 2025"),
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/doc-1.pdf");
            then.status(200).body("first document bytes");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/doc-2.pdf");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/doc-3.pdf");
            then.status(200).body("third document bytes");
        })
        .await;

    let dir = tempdir().unwrap();
    let store = DocumentStore::in_memory("archive/", RetryPolicy::none());
    let harvester = harvester_for(&server, store, dir.path());

    let report = harvester.run().await.unwrap();
    assert_eq!(report.summary.listed, 3);
    assert_eq!(report.summary.uploaded, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.skipped, 0);

    // The permanently failed record still appears in the catalog, marked failed.
    let csv = std::fs::read_to_string(&report.catalog.csv).unwrap();
    assert!(csv.contains("doc-2.pdf"));
    assert!(csv.lines().any(|line| line.contains("doc-2.pdf") && line.contains("failed")));
    let urls = std::fs::read_to_string(&report.catalog.urls).unwrap();
    assert_eq!(urls.lines().count(), 3);
}

#[tokio::test]
async fn rerunning_an_unchanged_catalog_skips_every_upload() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(200)
                .body(catalog_page(&[("doc-1.pdf", "July 2025"), ("doc-2.pdf", "July 2025")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;
    for name in ["doc-1.pdf", "doc-2.pdf"] {
        server
            .mock_async(move |when, then| {
                when.method(GET).path(format!("/files/{name}"));
                then.status(200).body("stable payload");
            })
            .await;
    }

    let dir = tempdir().unwrap();
    let store = DocumentStore::in_memory("archive/", RetryPolicy::none());
    let harvester = harvester_for(&server, store, dir.path());

    let first = harvester.run().await.unwrap();
    assert_eq!(first.summary.uploaded, 2);

    let second = harvester.run().await.unwrap();
    assert_eq!(second.summary.uploaded, 0);
    assert_eq!(second.summary.skipped, 2, "idempotent puts must not duplicate");
    assert_eq!(second.summary.failed, 0);
}

#[tokio::test]
async fn listed_records_have_identifiers_and_valid_urls() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(200)
                .body(catalog_page(&[("doc-a.pdf", "July 2025"), ("doc-b.pdf", "August 2025")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;

    let lister = lister_for(&server, RetryPolicy::none());
    let records = lister.collect_records().await;

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.identifier.is_empty());
        assert!(Url::parse(record.url.as_str()).is_ok());
        assert!(record.release_date.is_some());
    }
}

#[tokio::test]
async fn empty_first_page_terminates_listing() {
    let server = MockServer::start_async().await;

    let page_zero = server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;
    let page_one = server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;

    let lister = lister_for(&server, RetryPolicy::none());
    let records = lister.collect_records().await;

    assert!(records.is_empty());
    page_zero.assert_hits_async(1).await;
    page_one.assert_hits_async(0).await;
}

#[tokio::test]
async fn transient_download_failures_are_retried_then_reported() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(200).body(catalog_page(&[("doc-1.pdf", "July 2025")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;
    let flaky = server
        .mock_async(|when, then| {
            when.method(GET).path("/files/doc-1.pdf");
            then.status(502);
        })
        .await;

    let dir = tempdir().unwrap();
    let client = archive_ingest::fetch::http_client("archive-ingest-tests").unwrap();
    let retry = RetryPolicy::new(3, Duration::from_millis(1)).with_jitter(0.0);
    let harvester = Harvester::builder()
        .lister(lister_for(&server, RetryPolicy::none()))
        .downloader(Downloader::new(client, retry))
        .store(DocumentStore::in_memory("archive/", RetryPolicy::none()))
        .writer(CatalogWriter::new(dir.path()))
        .build();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.summary.failed, 1);
    flaky.assert_hits_async(3).await;

    let json = std::fs::read_to_string(&report.catalog.json).unwrap();
    let outcomes: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["status"], "failed");
}

#[tokio::test]
async fn failed_catalog_pages_are_skipped_not_fatal() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "0");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "1");
            then.status(200).body(catalog_page(&[("late.pdf", "July 2025")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/records").query_param("page", "2");
            then.status(200).body(EMPTY_PAGE);
        })
        .await;

    let lister = lister_for(&server, RetryPolicy::none());
    let records = lister.collect_records().await;

    assert_eq!(records.len(), 1, "records after the failed page are still listed");
    assert_eq!(records[0].identifier, "late.pdf");
}

#[tokio::test]
async fn repeated_page_failures_trip_the_guard() {
    let server = MockServer::start_async().await;

    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/records");
            then.status(500);
        })
        .await;

    let lister = lister_for(&server, RetryPolicy::none());
    let records = lister.collect_records().await;

    assert!(records.is_empty());
    // Default guard allows three consecutive failed pages.
    failing.assert_hits_async(3).await;
}
