//! Paginated enumeration of catalog records.
//!
//! The lister walks the catalog page by page and parses each page with a
//! three-tier strategy, mirroring how public archive catalogs degrade:
//!
//! 1. a table whose header row names the configured identifier and release
//!    date columns;
//! 2. failing that, any table dense with document links;
//! 3. failing that, every document link on the page.
//!
//! Listing stops at the first page that yields zero records. A page whose
//! fetch fails even after retries is logged and skipped; a run of
//! consecutive failures trips a guard so a dead endpoint cannot spin
//! forever.

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CatalogConfig;
use crate::retry::RetryPolicy;
use crate::types::{HarvestError, Record};

/// File extensions treated as catalog documents.
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".mp3"];

pub struct CatalogLister {
    client: Client,
    config: CatalogConfig,
    retry: RetryPolicy,
}

struct PageCursor {
    page: usize,
    consecutive_failures: usize,
    done: bool,
}

impl CatalogLister {
    pub fn new(client: Client, config: CatalogConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    /// URL for a given zero-based catalog page.
    pub fn page_url(&self, page: usize) -> Url {
        let mut url = self.config.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.config.page_param, &page.to_string());
        url
    }

    /// Lazy stream of per-page record batches.
    ///
    /// Each item is either a page's records or the error that exhausted the
    /// page's retries. The stream ends at the first empty page or once the
    /// consecutive-failure guard trips.
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<Record>, HarvestError>> + '_ {
        let cursor = PageCursor {
            page: 0,
            consecutive_failures: 0,
            done: false,
        };
        futures_util::stream::unfold(cursor, move |mut cursor| async move {
            if cursor.done {
                return None;
            }
            let page = cursor.page;
            cursor.page += 1;

            match self.fetch_page(page).await {
                Ok(html) => {
                    cursor.consecutive_failures = 0;
                    match parse_page(&html, &self.config) {
                        Ok(records) if records.is_empty() => {
                            debug!(page, "empty catalog page, listing complete");
                            None
                        }
                        Ok(records) => {
                            info!(page, count = records.len(), "listed catalog page");
                            Some((Ok(records), cursor))
                        }
                        Err(err) => {
                            cursor.done = true;
                            Some((Err(err), cursor))
                        }
                    }
                }
                Err(err) => {
                    cursor.consecutive_failures += 1;
                    if cursor.consecutive_failures >= self.config.max_page_failures {
                        warn!(
                            page,
                            failures = cursor.consecutive_failures,
                            "too many consecutive page failures, stopping listing"
                        );
                        cursor.done = true;
                    }
                    Some((Err(err), cursor))
                }
            }
        })
    }

    /// Drains [`pages`](Self::pages), logging failed pages and keeping the
    /// records of every page that succeeded (best-effort completeness).
    pub async fn collect_records(&self) -> Vec<Record> {
        let mut records = Vec::new();
        let mut pages = std::pin::pin!(self.pages());
        while let Some(outcome) = pages.next().await {
            match outcome {
                Ok(batch) => records.extend(batch),
                Err(err) => warn!(error = %err, "catalog page failed, continuing"),
            }
        }
        records
    }

    async fn fetch_page(&self, page: usize) -> Result<String, HarvestError> {
        let url = self.page_url(page);
        self.retry
            .run("fetch catalog page", || {
                let url = url.clone();
                async move {
                    let response = self.client.get(url.clone()).send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(HarvestError::Status {
                            status,
                            url: url.to_string(),
                        });
                    }
                    Ok(response.text().await?)
                }
            })
            .await
    }
}

fn selector(expr: &str) -> Result<Selector, HarvestError> {
    Selector::parse(expr).map_err(|err| HarvestError::Parse(err.to_string()))
}

fn is_document_href(href: &str) -> bool {
    let href = href.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| href.contains(ext))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parses one catalog page into records. Pure and synchronous; the parsed
/// DOM never crosses an await point.
pub(crate) fn parse_page(html: &str, config: &CatalogConfig) -> Result<Vec<Record>, HarvestError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let header_sel = selector("th")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td, th")?;
    let link_sel = selector("a[href]")?;

    // Tier 1: the table whose headers name the expected columns.
    for table in document.select(&table_sel) {
        let headers: Vec<String> = table.select(&header_sel).map(|th| cell_text(&th)).collect();
        let has_identifier = headers.iter().any(|h| h == &config.identifier_header);
        let has_date = headers.iter().any(|h| h == &config.date_header);
        if has_identifier && has_date {
            return Ok(records_from_table(&table, config, &row_sel, &cell_sel, &link_sel));
        }
    }

    // Tier 2: any table dense with document links.
    for table in document.select(&table_sel) {
        let document_links = table
            .select(&link_sel)
            .filter(|link| link.value().attr("href").is_some_and(is_document_href))
            .count();
        if document_links > config.min_table_links {
            debug!(links = document_links, "falling back to link-dense table");
            return Ok(records_from_table(&table, config, &row_sel, &cell_sel, &link_sel));
        }
    }

    // Tier 3: every document link on the page.
    let mut records = Vec::new();
    for link in document.select(&link_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !is_document_href(href) {
            continue;
        }
        push_record(&mut records, config, href, cell_text(&link), None);
    }
    Ok(records)
}

fn records_from_table(
    table: &ElementRef<'_>,
    config: &CatalogConfig,
    row_sel: &Selector,
    cell_sel: &Selector,
    link_sel: &Selector,
) -> Vec<Record> {
    let mut records = Vec::new();
    for row in table.select(row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        let Some(link) = cells[0].select(link_sel).next() else {
            continue; // header or decorative row
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let release_date = cells
            .get(1)
            .map(|cell| cell_text(cell))
            .filter(|text| !text.is_empty());
        push_record(&mut records, config, href, cell_text(&link), release_date);
    }
    records
}

fn push_record(
    records: &mut Vec<Record>,
    config: &CatalogConfig,
    href: &str,
    link_text: String,
    release_date: Option<String>,
) {
    if href.starts_with('#') {
        return;
    }
    let Ok(mut url) = config.base_url.join(href) else {
        warn!(href, "skipping unresolvable catalog link");
        return;
    };
    url.set_fragment(None);

    if records.iter().any(|existing| existing.url == url) {
        return;
    }

    let identifier = if link_text.is_empty() {
        match url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
        {
            Some(basename) => basename.to_string(),
            None => {
                warn!(%url, "skipping link with no usable identifier");
                return;
            }
        }
    } else {
        link_text
    };

    let mut record = Record::new(identifier, url);
    if let Some(date) = release_date {
        record = record.with_release_date(date);
    }
    records.push(record);
}
