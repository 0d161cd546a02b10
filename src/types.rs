//! Core data model: catalog records, per-record outcomes, and the error
//! taxonomy shared across the harvest pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// One catalog entry identifying a source document to fetch.
///
/// Records are created by the lister, serialized once into the run's catalog
/// files, and never updated in place. The lister guarantees a non-empty
/// identifier and a syntactically valid absolute URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub identifier: String,
    pub url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Record {
    pub fn new(identifier: impl Into<String>, url: Url) -> Self {
        Self {
            identifier: identifier.into(),
            url,
            release_date: None,
            title: None,
        }
    }

    #[must_use]
    pub fn with_release_date(mut self, date: impl Into<String>) -> Self {
        self.release_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Last path segment of the source URL, used for display and as the
    /// fallback identifier when a catalog link carries no text.
    pub fn url_basename(&self) -> Option<&str> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
    }
}

/// Terminal status of one record after the fetch/upload stages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    /// Bytes were fetched and written to the object store.
    Uploaded { bytes: u64 },
    /// An object with the same key and byte length already exists.
    SkippedExisting,
    /// The record could not be fetched or stored; the reason is terminal
    /// for this run but the record still appears in the catalog output.
    Failed { reason: String },
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Uploaded { .. } => "uploaded",
            UploadStatus::SkippedExisting => "skipped_existing",
            UploadStatus::Failed { .. } => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            UploadStatus::Uploaded { bytes } => format!("{bytes} bytes"),
            UploadStatus::SkippedExisting => String::new(),
            UploadStatus::Failed { reason } => reason.clone(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UploadStatus::Failed { .. })
    }
}

/// A record paired with how its upload ended, in listing order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub record: Record,
    #[serde(flatten)]
    pub status: UploadStatus,
}

/// End-of-run accounting printed by the harvest binary.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub listed: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_uploaded: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_outcomes(run_id: String, outcomes: &[RecordOutcome], elapsed: Duration) -> Self {
        let mut summary = Self {
            run_id,
            listed: outcomes.len(),
            uploaded: 0,
            skipped: 0,
            failed: 0,
            bytes_uploaded: 0,
            elapsed,
        };
        for outcome in outcomes {
            match &outcome.status {
                UploadStatus::Uploaded { bytes } => {
                    summary.uploaded += 1;
                    summary.bytes_uploaded += bytes;
                }
                UploadStatus::SkippedExisting => summary.skipped += 1,
                UploadStatus::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn render(&self) -> String {
        format!(
            "run {}: {} listed, {} uploaded, {} skipped, {} failed, {:.2} MB in {:.1}s",
            self.run_id,
            self.listed,
            self.uploaded,
            self.skipped,
            self.failed,
            self.bytes_uploaded as f64 / (1024.0 * 1024.0),
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Error taxonomy for the scrape/upload pipeline.
///
/// Transient failures (connect errors, timeouts, 5xx responses, storage
/// hiccups) are retried under a [`RetryPolicy`](crate::retry::RetryPolicy);
/// everything else is permanent for the current item. Configuration errors
/// are raised before any work begins and abort the run.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("failed to parse catalog page: {0}")]
    Parse(String),

    #[error("object storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

impl HarvestError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HarvestError::Http(err) => err.is_timeout() || err.is_connect(),
            HarvestError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            HarvestError::Storage(err) => !matches!(
                err,
                object_store::Error::NotFound { .. }
                    | object_store::Error::InvalidPath { .. }
                    | object_store::Error::NotSupported { .. }
                    | object_store::Error::NotImplemented
            ),
            _ => false,
        }
    }
}
