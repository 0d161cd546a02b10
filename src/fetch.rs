//! Fetches document bytes for catalog records.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::retry::RetryPolicy;
use crate::types::{HarvestError, Record};

/// Default timeout for a single document request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A record's raw bytes, buffered and ready for upload.
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    pub record: Record,
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl FetchedDocument {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Shared HTTP client for the catalog and document hosts.
pub fn http_client(user_agent: &str) -> Result<Client, HarvestError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Fetches the record's document bytes.
    ///
    /// Transient failures (connect errors, timeouts, 5xx) retry under the
    /// policy; a 4xx response is permanent and surfaces immediately.
    pub async fn fetch(&self, record: &Record) -> Result<FetchedDocument, HarvestError> {
        let bytes = self
            .retry
            .run("fetch document", || self.fetch_once(record))
            .await?;
        debug!(
            identifier = %record.identifier,
            bytes = bytes.len(),
            "downloaded document"
        );
        Ok(FetchedDocument {
            content_type: content_type_for(record.url.path()),
            record: record.clone(),
            bytes,
        })
    }

    async fn fetch_once(&self, record: &Record) -> Result<Bytes, HarvestError> {
        let response = self.client.get(record.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                status,
                url: record.url.to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Content type inferred from the path's extension.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "txt" => "text/plain",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("/files/doc.pdf"), "application/pdf");
        assert_eq!(content_type_for("/files/DOC.PDF"), "application/pdf");
        assert_eq!(content_type_for("/media/tape.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("/notes.txt"), "text/plain");
        assert_eq!(content_type_for("/blob"), "application/octet-stream");
        assert_eq!(content_type_for("/archive.unknown"), "application/octet-stream");
    }
}
