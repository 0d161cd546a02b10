//! ```text
//! catalog::lister ──► Records ──► fetch::Downloader ──► FetchedDocument
//!        │                                                    │
//!        │                                          store::DocumentStore
//!        │                                                    │
//!        └──► catalog::writer ◄── RecordOutcomes ◄── harvest::Harvester
//!                                                             │
//!                     object storage ──► [external processing platform]
//!                                                             │
//!              site::IndexPage ◄── stored objects      [external index]
//!                                                             │
//!      rag::RetrievalPipeline ──► search + completion ──► Answer
//! ```
//!
//! Scrapes a paginated archival record catalog, ships each document to
//! object storage under deterministic keys, writes auditable catalog files
//! per run, and answers questions against the externally processed index
//! through a two-call retrieval pipeline.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod harvest;
pub mod rag;
pub mod retry;
pub mod site;
pub mod store;
pub mod types;

pub use catalog::{CatalogLister, CatalogWriter};
pub use config::{CatalogConfig, HarvestConfig, RagConfig, StorageConfig};
pub use fetch::{Downloader, FetchedDocument};
pub use harvest::{Harvester, HarvestReport};
pub use retry::RetryPolicy;
pub use store::DocumentStore;
pub use types::{HarvestError, Record, RecordOutcome, RunSummary, UploadStatus};
