//! Retrieval seam for RAG pipelines.
//!
//! The vector store itself is an external collaborator; the crate only defines the
//! [`KnowledgeStore`] interface it is called through, plus a naive in-memory
//! implementation for tests and demos.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrievable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Retrieval service: answers a query with the best-matching documents, most
/// relevant first.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn retrieve(&self, query: &str, n_results: usize) -> Result<Vec<Document>>;
}

/// In-memory store ranking documents by shared-term count with the query.
///
/// Deliberately naive; it stands in for a real vector database in tests and demos.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    documents: Vec<Document>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn score(query_terms: &[String], content: &str) -> usize {
        let content = content.to_lowercase();
        query_terms
            .iter()
            .filter(|term| content.contains(term.as_str()))
            .count()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn retrieve(&self, query: &str, n_results: usize) -> Result<Vec<Document>> {
        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();

        let mut scored: Vec<(usize, &Document)> = self
            .documents
            .iter()
            .map(|doc| (Self::score(&query_terms, &doc.content), doc))
            .collect();

        // Stable sort keeps insertion order among equally scored documents.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(n_results)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
