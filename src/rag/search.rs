//! Client for the external semantic search index.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ProcessedElement, RagError};

/// One ranked hit from the index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredElement {
    pub score: f32,
    pub element: ProcessedElement,
}

/// Issues a semantic-similarity query against an index of processed
/// elements. Embedding and ranking happen inside the service; one request
/// per query.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredElement>, RagError>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<ScoredElement>,
}

/// HTTP implementation: `POST { "query", "top_k" }` with an `ApiKey`
/// authorization header, expecting `{ "results": [ { score, element } ] }`.
pub struct HttpSearchClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpSearchClient {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredElement>, RagError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("authorization", format!("ApiKey {}", self.api_key))
            .json(&SearchRequest { query: text, top_k })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Search(format!(
                "search endpoint returned {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|err| RagError::Search(format!("malformed search response: {err}")))?;
        debug!(hits = parsed.results.len(), "search query complete");
        Ok(parsed.results)
    }
}
