//! Explicit configuration for every component.
//!
//! Each pipeline stage receives its configuration struct at construction
//! instead of reading ambient process state. The `from_env` constructors are
//! the only place environment variables (optionally seeded from a `.env`
//! file via `dotenvy`) are consulted; missing required settings surface as
//! [`HarvestError::Config`] before any work begins.

use std::path::PathBuf;

use url::Url;

use crate::types::HarvestError;

fn required(name: &str) -> Result<String, HarvestError> {
    dotenvy::dotenv().ok();
    std::env::var(name)
        .map_err(|_| HarvestError::Config(format!("missing required setting {name}")))
}

fn optional(name: &str) -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_url(name: &str, raw: &str) -> Result<Url, HarvestError> {
    Url::parse(raw).map_err(|err| HarvestError::Config(format!("{name} is not a valid URL: {err}")))
}

/// Where and how the record catalog is enumerated.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Page-zero URL of the paginated catalog.
    pub base_url: Url,
    /// Query parameter that selects a catalog page.
    pub page_param: String,
    /// User-Agent presented to the catalog and document hosts.
    pub user_agent: String,
    /// Header cell naming the record identifier column.
    pub identifier_header: String,
    /// Header cell naming the release date column.
    pub date_header: String,
    /// Minimum document links for a table to qualify in the fallback scan.
    pub min_table_links: usize,
    /// Consecutive page failures tolerated before listing gives up.
    pub max_page_failures: usize,
}

impl CatalogConfig {
    pub const DEFAULT_USER_AGENT: &'static str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/91.0.4472.124 Safari/537.36";

    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            page_param: "page".to_string(),
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            identifier_header: "Record Number".to_string(),
            date_header: "NARA Release Date".to_string(),
            min_table_links: 10,
            max_page_failures: 3,
        }
    }

    pub fn from_env() -> Result<Self, HarvestError> {
        let base_url = parse_url("CATALOG_URL", &required("CATALOG_URL")?)?;
        let mut config = Self::new(base_url);
        if let Some(param) = optional("CATALOG_PAGE_PARAM") {
            config.page_param = param;
        }
        if let Some(agent) = optional("HARVEST_USER_AGENT") {
            config.user_agent = agent;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_page_param(mut self, param: impl Into<String>) -> Self {
        self.page_param = param.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    #[must_use]
    pub fn with_table_headers(
        mut self,
        identifier: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        self.identifier_header = identifier.into();
        self.date_header = date.into();
        self
    }
}

/// Object storage destination.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    /// Key prefix every stored object lands under. Always ends with `/`.
    pub prefix: String,
    pub region: Option<String>,
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            bucket: bucket.into(),
            prefix,
            region: None,
        }
    }

    pub fn from_env() -> Result<Self, HarvestError> {
        let bucket = required("S3_BUCKET")?;
        let prefix = optional("S3_PREFIX").unwrap_or_else(|| "archive/".to_string());
        let mut config = Self::new(bucket, prefix);
        config.region = optional("AWS_REGION");
        Ok(config)
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Public HTTPS URL for an object key, virtual-hosted S3 style.
    pub fn public_url(&self, key: &str) -> String {
        match &self.region {
            Some(region) => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, region, key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}

/// Run-level knobs for the harvest pipeline.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    /// Directory the catalog generation files are written into.
    pub output_dir: PathBuf,
    /// Concurrent fetch/upload slots. `1` keeps the run fully sequential.
    pub max_workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            max_workers: 1,
        }
    }
}

impl HarvestConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = optional("HARVEST_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(workers) = optional("HARVEST_MAX_WORKERS") {
            if let Ok(parsed) = workers.parse::<usize>() {
                config.max_workers = parsed.max(1);
            }
        }
        config
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }
}

/// Endpoints and credentials for the external search index and the hosted
/// completion model. Presence is the only schema enforced.
#[derive(Clone, Debug)]
pub struct RagConfig {
    pub search_endpoint: Url,
    pub search_api_key: String,
    pub completion_endpoint: Url,
    pub completion_api_key: String,
    pub completion_model: String,
    pub top_k: usize,
}

impl RagConfig {
    pub const DEFAULT_TOP_K: usize = 5;

    pub fn from_env() -> Result<Self, HarvestError> {
        let search_endpoint = parse_url("SEARCH_ENDPOINT", &required("SEARCH_ENDPOINT")?)?;
        let completion_endpoint =
            parse_url("COMPLETION_ENDPOINT", &required("COMPLETION_ENDPOINT")?)?;
        let top_k = optional("RAG_TOP_K")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(Self::DEFAULT_TOP_K);
        Ok(Self {
            search_endpoint,
            search_api_key: required("SEARCH_API_KEY")?,
            completion_endpoint,
            completion_api_key: required("COMPLETION_API_KEY")?,
            completion_model: optional("COMPLETION_MODEL")
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            top_k,
        })
    }
}

/// Optional link to the externally processed dataset, surfaced on the
/// generated index page.
pub fn processed_dataset_url() -> Option<String> {
    optional("PROCESSED_DATASET_URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_prefix_gains_trailing_slash() {
        let config = StorageConfig::new("bucket", "archive");
        assert_eq!(config.prefix, "archive/");

        let already = StorageConfig::new("bucket", "archive/");
        assert_eq!(already.prefix, "archive/");

        let empty = StorageConfig::new("bucket", "");
        assert_eq!(empty.prefix, "");
    }

    #[test]
    fn public_url_includes_region_when_set() {
        let config = StorageConfig::new("b", "p/").with_region("us-east-1");
        assert_eq!(
            config.public_url("p/doc.pdf"),
            "https://b.s3.us-east-1.amazonaws.com/p/doc.pdf"
        );

        let plain = StorageConfig::new("b", "p/");
        assert_eq!(
            plain.public_url("p/doc.pdf"),
            "https://b.s3.amazonaws.com/p/doc.pdf"
        );
    }

    #[test]
    fn catalog_defaults() {
        let config = CatalogConfig::new(Url::parse("https://example.com/records").unwrap());
        assert_eq!(config.page_param, "page");
        assert_eq!(config.identifier_header, "Record Number");
        assert_eq!(config.max_page_failures, 3);
    }
}
