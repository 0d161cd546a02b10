//! The end-to-end harvest pipeline: list, fetch, upload, report.
//!
//! Per-record failures are folded into the run's outcomes and never abort
//! the batch; only startup failures (configuration, store construction)
//! surface as errors from [`Harvester::run`]. Records are processed with
//! bounded concurrency — `max_workers = 1` keeps the run fully sequential —
//! and outcomes are reported in listing order either way.

use std::time::Instant;

use futures_util::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogFiles, CatalogLister, CatalogWriter};
use crate::fetch::Downloader;
use crate::store::DocumentStore;
use crate::types::{HarvestError, Record, RecordOutcome, RunSummary, UploadStatus};

pub struct Harvester {
    lister: CatalogLister,
    downloader: Downloader,
    store: DocumentStore,
    writer: CatalogWriter,
    max_workers: usize,
}

/// What a completed run produced: the summary plus the catalog file paths.
#[derive(Debug)]
pub struct HarvestReport {
    pub summary: RunSummary,
    pub catalog: CatalogFiles,
}

impl Harvester {
    pub fn builder() -> HarvesterBuilder {
        HarvesterBuilder::default()
    }

    /// Runs the full pipeline and writes the end-of-run catalog.
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let records = self.lister.collect_records().await;
        info!(run_id = %run_id, count = records.len(), "catalog listing complete");

        let outcomes: Vec<RecordOutcome> = futures_util::stream::iter(
            records.into_iter().map(|record| self.process(record)),
        )
        .buffered(self.max_workers.max(1))
        .collect()
        .await;

        let catalog = self.writer.write_outcomes(&outcomes).await?;
        let summary = RunSummary::from_outcomes(run_id, &outcomes, started.elapsed());
        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "harvest complete"
        );
        Ok(HarvestReport { summary, catalog })
    }

    /// Fetch + upload for one record; failure becomes the record's outcome.
    async fn process(&self, record: Record) -> RecordOutcome {
        let status = match self.downloader.fetch(&record).await {
            Ok(document) => match self.store.put_document(&document).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(identifier = %record.identifier, error = %err, "upload failed");
                    UploadStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            },
            Err(err) => {
                warn!(identifier = %record.identifier, error = %err, "download failed");
                UploadStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        RecordOutcome { record, status }
    }
}

/// Builder wiring the pipeline stages together.
#[derive(Default)]
pub struct HarvesterBuilder {
    lister: Option<CatalogLister>,
    downloader: Option<Downloader>,
    store: Option<DocumentStore>,
    writer: Option<CatalogWriter>,
    max_workers: usize,
}

impl HarvesterBuilder {
    #[must_use]
    pub fn lister(mut self, lister: CatalogLister) -> Self {
        self.lister = Some(lister);
        self
    }

    #[must_use]
    pub fn downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    #[must_use]
    pub fn store(mut self, store: DocumentStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn writer(mut self, writer: CatalogWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Concurrent fetch/upload slots. Defaults to sequential.
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// # Panics
    ///
    /// Panics if any pipeline stage is missing.
    pub fn build(self) -> Harvester {
        Harvester {
            lister: self.lister.expect("HarvesterBuilder requires a lister"),
            downloader: self
                .downloader
                .expect("HarvesterBuilder requires a downloader"),
            store: self.store.expect("HarvesterBuilder requires a store"),
            writer: self.writer.expect("HarvesterBuilder requires a writer"),
            max_workers: self.max_workers.max(1),
        }
    }
}
