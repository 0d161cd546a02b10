//! Composes retrieval and generation into one question-answer flow.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::search::ScoredElement;
use super::{CompletionClient, RagError, SearchClient};

/// Provenance attached to an answer, one entry per retrieved element.
#[derive(Clone, Debug, Serialize)]
pub struct Citation {
    pub element_id: String,
    pub score: f32,
    pub filename: Option<String>,
    pub source_url: Option<String>,
}

/// The model's answer plus the sources it was grounded on.
#[derive(Clone, Debug, Serialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

pub struct RetrievalPipeline {
    search: Arc<dyn SearchClient>,
    completion: Arc<dyn CompletionClient>,
    top_k: usize,
}

impl RetrievalPipeline {
    pub fn new(
        search: Arc<dyn SearchClient>,
        completion: Arc<dyn CompletionClient>,
        top_k: usize,
    ) -> Self {
        Self {
            search,
            completion,
            top_k: top_k.max(1),
        }
    }

    /// Answers a natural-language question from the processed archive.
    ///
    /// Exactly two sequential external calls: the search query, then the
    /// completion. No caching, no re-ranking.
    pub async fn ask(&self, question: &str) -> Result<Answer, RagError> {
        let hits = self.search.query(question, self.top_k).await?;
        if hits.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        debug!(hits = hits.len(), "composing grounded prompt");

        let prompt = build_prompt(question, &hits);
        let text = self.completion.complete(&prompt).await?;

        let citations = hits
            .iter()
            .map(|hit| Citation {
                element_id: hit.element.element_id.clone(),
                score: hit.score,
                filename: hit.element.metadata.filename.clone(),
                source_url: hit.element.metadata.source_url.clone(),
            })
            .collect();

        Ok(Answer { text, citations })
    }
}

/// Interleaves each element's text with its provenance so the model can
/// cite the underlying documents.
pub(crate) fn build_prompt(question: &str, hits: &[ScoredElement]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the excerpts below. \
         Cite the source document for every claim.\n\n",
    );
    for (idx, hit) in hits.iter().enumerate() {
        let filename = hit.element.metadata.filename.as_deref().unwrap_or("unknown");
        let source = hit
            .element
            .metadata
            .source_url
            .as_deref()
            .unwrap_or("unknown source");
        prompt.push_str(&format!("[{}] file: {filename} ({source})\n", idx + 1));
        prompt.push_str(&hit.element.text);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Question: {question}\n"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{ElementMetadata, ProcessedElement};

    fn hit(text: &str, filename: &str, source_url: &str) -> ScoredElement {
        ScoredElement {
            score: 0.87,
            element: ProcessedElement {
                element_id: "el-1".into(),
                text: text.into(),
                element_type: Some("NarrativeText".into()),
                record_id: Some("rec-1".into()),
                embedding: None,
                metadata: ElementMetadata {
                    filename: Some(filename.into()),
                    source_url: Some(source_url.into()),
                    entities: vec!["Eric S. Galt".into()],
                    extra: Default::default(),
                },
            },
        }
    }

    #[test]
    fn prompt_contains_text_and_provenance() {
        let hits = vec![hit(
            "Eric S. Galt rented Safe Deposit Box No. 5517 on July 13.",
            "box-records.pdf",
            "https://archive.example.gov/files/box-records.pdf",
        )];

        let prompt = build_prompt("Who rented Safe Deposit Box No. 5517?", &hits);
        assert!(prompt.contains("Eric S. Galt rented Safe Deposit Box No. 5517"));
        assert!(prompt.contains("box-records.pdf"));
        assert!(prompt.contains("https://archive.example.gov/files/box-records.pdf"));
        assert!(prompt.contains("Question: Who rented Safe Deposit Box No. 5517?"));
    }

    #[test]
    fn prompt_numbers_excerpts_in_rank_order() {
        let hits = vec![
            hit("first excerpt", "a.pdf", "https://example.com/a.pdf"),
            hit("second excerpt", "b.pdf", "https://example.com/b.pdf"),
        ];
        let prompt = build_prompt("q", &hits);
        let first = prompt.find("[1] file: a.pdf").unwrap();
        let second = prompt.find("[2] file: b.pdf").unwrap();
        assert!(first < second);
    }
}
