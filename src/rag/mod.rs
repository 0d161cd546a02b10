//! Retrieval-augmented querying of the externally processed archive.
//!
//! ```text
//! question ──► SearchClient::query ──► ranked ProcessedElements
//!                                          │
//!                         grounded prompt (text + provenance)
//!                                          │
//!              CompletionClient::complete ─┴─► Answer { text, citations }
//! ```
//!
//! Everything heavy happens off-repo: the search service embeds the query
//! and ranks elements, the hosted model generates the answer. This module
//! only deserializes elements, composes the prompt, and carries citations
//! back to the caller — at most two sequential external calls per question.

pub mod completion;
pub mod pipeline;
pub mod search;

pub use completion::{CompletionClient, HttpCompletionClient};
pub use pipeline::{Answer, Citation, RetrievalPipeline};
pub use search::{HttpSearchClient, ScoredElement, SearchClient};

use serde::{Deserialize, Serialize};

/// An externally produced, embedded and entity-annotated chunk derived from
/// a source document. Read-only here: this crate never constructs or
/// mutates elements, it only queries and formats them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessedElement {
    pub element_id: String,
    pub text: String,
    #[serde(default, rename = "type")]
    pub element_type: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

/// Provenance and enrichment carried alongside each element.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Errors raised by the retrieval pipeline and its service clients.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search service error: {0}")]
    Search(String),

    #[error("completion service error: {0}")]
    Completion(String),

    #[error("the search index returned no matching elements")]
    EmptyIndex,
}
