//! Serializes a run's records into durable catalog files.
//!
//! One catalog generation per run: a CSV table, a JSON array, and a
//! plain-text URL list, all stamped with the run's generation time. When
//! upload outcomes are available the CSV and JSON rows carry them, so a
//! record whose download failed still appears, marked failed.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::info;

use crate::types::{HarvestError, Record, RecordOutcome};

const CSV_HEADER: &[&str] = &["identifier", "url", "release_date", "title"];

/// Paths of one catalog generation.
#[derive(Clone, Debug)]
pub struct CatalogFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub urls: PathBuf,
}

pub struct CatalogWriter {
    output_dir: PathBuf,
}

impl CatalogWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes a records-only catalog (no upload outcomes yet).
    pub async fn write_records(&self, records: &[Record]) -> Result<CatalogFiles, HarvestError> {
        let stamp = generation_stamp();
        let csv = records_csv(records)?;
        let json = serde_json::to_vec_pretty(records).map_err(json_error)?;
        let urls = url_lines(records.iter().map(|record| &record.url));
        self.write_set(&stamp, csv, json, urls).await
    }

    /// Writes the end-of-run catalog with per-record outcomes attached.
    pub async fn write_outcomes(
        &self,
        outcomes: &[RecordOutcome],
    ) -> Result<CatalogFiles, HarvestError> {
        let stamp = generation_stamp();
        let csv = outcomes_csv(outcomes)?;
        let json = serde_json::to_vec_pretty(outcomes).map_err(json_error)?;
        let urls = url_lines(outcomes.iter().map(|outcome| &outcome.record.url));
        self.write_set(&stamp, csv, json, urls).await
    }

    async fn write_set(
        &self,
        stamp: &str,
        csv: Vec<u8>,
        json: Vec<u8>,
        urls: String,
    ) -> Result<CatalogFiles, HarvestError> {
        fs::create_dir_all(&self.output_dir).await?;
        let files = CatalogFiles {
            csv: self.output_dir.join(format!("records_{stamp}.csv")),
            json: self.output_dir.join(format!("records_{stamp}.json")),
            urls: self.output_dir.join(format!("urls_{stamp}.txt")),
        };
        fs::write(&files.csv, csv).await?;
        fs::write(&files.json, json).await?;
        fs::write(&files.urls, urls).await?;
        info!(
            csv = %files.csv.display(),
            json = %files.json.display(),
            urls = %files.urls.display(),
            "catalog generation written"
        );
        Ok(files)
    }
}

fn generation_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn json_error(err: serde_json::Error) -> HarvestError {
    HarvestError::Io(std::io::Error::other(err))
}

fn records_csv(records: &[Record]) -> Result<Vec<u8>, HarvestError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.identifier.as_str(),
            record.url.as_str(),
            record.release_date.as_deref().unwrap_or_default(),
            record.title.as_deref().unwrap_or_default(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| HarvestError::Io(std::io::Error::other(err)))
}

fn outcomes_csv(outcomes: &[RecordOutcome]) -> Result<Vec<u8>, HarvestError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = CSV_HEADER.to_vec();
    header.extend(["status", "detail"]);
    writer.write_record(&header)?;
    for outcome in outcomes {
        let record = &outcome.record;
        let detail = outcome.status.detail();
        writer.write_record([
            record.identifier.as_str(),
            record.url.as_str(),
            record.release_date.as_deref().unwrap_or_default(),
            record.title.as_deref().unwrap_or_default(),
            outcome.status.label(),
            detail.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| HarvestError::Io(std::io::Error::other(err)))
}

fn url_lines<'a>(urls: impl Iterator<Item = &'a url::Url>) -> String {
    let mut out = String::new();
    for url in urls {
        out.push_str(url.as_str());
        out.push('\n');
    }
    out
}
