//! Idempotent document uploads to object storage.
//!
//! Keys are a deterministic function of the source URL so re-runs overwrite
//! instead of duplicating, and so the external processing platform can
//! re-associate provenance from the stored metadata. A `head` probe that
//! reports an identical byte length skips the upload entirely.

use std::sync::Arc;

use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::fetch::FetchedDocument;
use crate::retry::RetryPolicy;
use crate::types::{HarvestError, Record, UploadStatus};

/// One stored object under the configured prefix.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    /// Key with prefix and folders stripped, for display.
    pub display_name: String,
    pub size: u64,
}

pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    retry: RetryPolicy,
    // LocalFileSystem rejects put attributes, so the local backend runs bare.
    attach_attributes: bool,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            retry,
            attach_attributes: true,
        }
    }

    /// S3 backend; credentials resolve from the environment the way the
    /// AWS SDK family does.
    pub fn s3(config: &StorageConfig, retry: RetryPolicy) -> Result<Self, HarvestError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        let store = builder.build()?;
        Ok(Self::new(Arc::new(store), config.prefix.clone(), retry))
    }

    /// Local filesystem backend, mostly for offline runs.
    pub fn local(
        root: impl AsRef<std::path::Path>,
        prefix: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, HarvestError> {
        let store = LocalFileSystem::new_with_prefix(root)?;
        let mut this = Self::new(Arc::new(store), prefix, retry);
        this.attach_attributes = false;
        Ok(this)
    }

    /// In-memory backend for tests.
    pub fn in_memory(prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self::new(Arc::new(InMemory::new()), prefix, retry)
    }

    /// Deterministic storage key for a record: the sanitized basename of
    /// its URL path under the configured prefix.
    pub fn key_for(&self, record: &Record) -> ObjectPath {
        let name = record
            .url_basename()
            .map(sanitize_component)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| sanitize_component(&record.identifier));
        ObjectPath::from(format!("{}{}", self.prefix, name))
    }

    /// Idempotent put: skip when an object of the same key and length
    /// already exists, overwrite otherwise.
    pub async fn put_document(&self, doc: &FetchedDocument) -> Result<UploadStatus, HarvestError> {
        let key = self.key_for(&doc.record);

        match self.store.head(&key).await {
            Ok(meta) if meta.size == doc.len() => {
                debug!(key = %key, "object already stored with matching size, skipping");
                return Ok(UploadStatus::SkippedExisting);
            }
            Ok(meta) => {
                debug!(
                    key = %key,
                    stored = meta.size,
                    fetched = doc.len(),
                    "stored object size differs, overwriting"
                );
            }
            Err(object_store::Error::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let attributes = self.attributes_for(doc);
        self.retry
            .run("upload document", || {
                let key = key.clone();
                let options = PutOptions {
                    attributes: attributes.clone(),
                    ..Default::default()
                };
                let payload = PutPayload::from(doc.bytes.clone());
                async move {
                    self.store.put_opts(&key, payload, options).await?;
                    Ok::<_, HarvestError>(())
                }
            })
            .await?;

        info!(key = %key, bytes = doc.len(), "uploaded document");
        Ok(UploadStatus::Uploaded { bytes: doc.len() })
    }

    fn attributes_for(&self, doc: &FetchedDocument) -> Attributes {
        if !self.attach_attributes {
            return Attributes::new();
        }
        Attributes::from_iter([
            (
                Attribute::ContentType,
                AttributeValue::from(doc.content_type),
            ),
            (
                Attribute::Metadata("source-url".into()),
                AttributeValue::from(doc.record.url.to_string()),
            ),
            (
                Attribute::Metadata("fetched-at".into()),
                AttributeValue::from(chrono::Utc::now().to_rfc3339()),
            ),
            (
                Attribute::Metadata("content-length".into()),
                AttributeValue::from(doc.len().to_string()),
            ),
        ])
    }

    /// Every object currently stored under the prefix, in key order.
    pub async fn list_documents(&self) -> Result<Vec<StoredObject>, HarvestError> {
        let prefix = if self.prefix.is_empty() {
            None
        } else {
            Some(ObjectPath::from(self.prefix.trim_end_matches('/')))
        };
        let mut objects: Vec<StoredObject> = self
            .store
            .list(prefix.as_ref())
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|meta| {
                let key = meta.location.to_string();
                let display_name = key
                    .rsplit_once('/')
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_else(|| key.clone());
                StoredObject {
                    key,
                    display_name,
                    size: meta.size,
                }
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;

    fn store() -> DocumentStore {
        DocumentStore::in_memory("archive/", RetryPolicy::none())
    }

    fn doc(name: &str, payload: &'static [u8]) -> FetchedDocument {
        let record = Record::new(
            name,
            Url::parse(&format!("https://example.com/files/{name}")).unwrap(),
        );
        FetchedDocument {
            content_type: crate::fetch::content_type_for(record.url.path()),
            record,
            bytes: Bytes::from_static(payload),
        }
    }

    #[test]
    fn keys_are_deterministic_and_sanitized() {
        let store = store();
        let record = Record::new(
            "Record 1",
            Url::parse("https://example.com/files/some record%281%29.pdf").unwrap(),
        );
        let first = store.key_for(&record);
        let second = store.key_for(&record);
        assert_eq!(first, second);
        assert!(first.as_ref().starts_with("archive/"));
        assert!(!first.as_ref().contains('%'));
        assert!(!first.as_ref().contains(' '));
    }

    #[test]
    fn key_falls_back_to_identifier() {
        let store = store();
        let record = Record::new("fallback id", Url::parse("https://example.com/").unwrap());
        assert_eq!(store.key_for(&record).as_ref(), "archive/fallback_id");
    }

    #[tokio::test]
    async fn put_is_idempotent_by_key_and_size() {
        let store = store();
        let doc = doc("a.pdf", b"pdf bytes");

        let first = store.put_document(&doc).await.unwrap();
        assert_eq!(first, UploadStatus::Uploaded { bytes: 9 });

        let second = store.put_document(&doc).await.unwrap();
        assert_eq!(second, UploadStatus::SkippedExisting);

        let objects = store.list_documents().await.unwrap();
        assert_eq!(objects.len(), 1, "re-upload must not duplicate");
        assert_eq!(objects[0].key, "archive/a.pdf");
        assert_eq!(objects[0].display_name, "a.pdf");
        assert_eq!(objects[0].size, 9);
    }

    #[tokio::test]
    async fn changed_payload_overwrites_in_place() {
        let store = store();
        store.put_document(&doc("a.pdf", b"v1")).await.unwrap();

        let status = store.put_document(&doc("a.pdf", b"v2 longer")).await.unwrap();
        assert_eq!(status, UploadStatus::Uploaded { bytes: 9 });

        let objects = store.list_documents().await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].size, 9);
    }
}
