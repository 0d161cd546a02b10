//! Static index page over the stored archive.
//!
//! Renders a single HTML page linking the externally processed dataset and
//! every raw document currently in object storage, then writes it to disk.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::config::StorageConfig;
use crate::store::{DocumentStore, StoredObject};
use crate::types::HarvestError;

pub struct IndexPage {
    storage: StorageConfig,
    processed_dataset_url: Option<String>,
}

impl IndexPage {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage,
            processed_dataset_url: None,
        }
    }

    #[must_use]
    pub fn with_processed_dataset_url(mut self, url: impl Into<String>) -> Self {
        self.processed_dataset_url = Some(url.into());
        self
    }

    /// Renders the page for the given object listing.
    pub fn render(&self, objects: &[StoredObject]) -> String {
        let mut html = String::from("<html><body>\n");

        if let Some(dataset_url) = &self.processed_dataset_url {
            html.push_str("<h1>Processed Dataset</h1>\n");
            html.push_str(&format!(
                "<p><a href=\"{dataset_url}\">Download the processed dataset</a></p>\n"
            ));
        }

        html.push_str("<h1>Source Documents</h1>\n<ul>\n");
        for object in objects {
            if object.key.ends_with('/') {
                continue; // folder placeholder
            }
            let url = self.storage.public_url(&object.key);
            html.push_str(&format!(
                "<li><a href=\"{url}\">{}</a></li>\n",
                object.display_name
            ));
        }
        html.push_str("</ul>\n</body></html>\n");
        html
    }

    /// Lists the store and writes the rendered page to `output`.
    pub async fn write(
        &self,
        store: &DocumentStore,
        output: impl AsRef<Path>,
    ) -> Result<PathBuf, HarvestError> {
        let objects = store.list_documents().await?;
        let html = self.render(&objects);
        let output = output.as_ref().to_path_buf();
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&output, html).await?;
        info!(path = %output.display(), objects = objects.len(), "index page written");
        Ok(output)
    }
}
