//! Context Retriever
//!
//! Fixed-policy wrapper over the Document Index that turns a question into a
//! single context string for the agent prompt. It never fails: an empty hit
//! list becomes [`NO_CONTEXT`] and a retrieval error becomes a note that the
//! agent proceeds without schema context.

use crate::error::Result;
use crate::index::DocumentIndex;
use crate::schema::SchemaDocument;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Returned when the index has nothing to offer
pub const NO_CONTEXT: &str = "No context retrieved.";

/// Joins retrieved documents
pub const SEPARATOR: &str = "\n---\n";

pub struct ContextRetriever {
    index: Arc<DocumentIndex>,
    k: usize,
}

impl ContextRetriever {
    pub fn new(index: Arc<DocumentIndex>, k: usize) -> Self {
        Self { index, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Up to `k` documents, most similar first
    pub async fn retrieve_documents(&self, query: &str) -> Result<Vec<SchemaDocument>> {
        let hits = self.index.query(query, self.k).await?;
        Ok(hits.into_iter().map(|h| h.document).collect())
    }

    /// Context string for `query`; never empty
    pub async fn retrieve(&self, query: &str) -> String {
        info!("Retrieving context for query: {}", query);
        match self.retrieve_documents(query).await {
            Ok(documents) if documents.is_empty() => {
                warn!("No context retrieved from vector store");
                NO_CONTEXT.to_string()
            }
            Ok(documents) => {
                info!("Retrieved {} context documents", documents.len());
                join_context(&documents)
            }
            Err(e) => {
                error!("Error retrieving context: {}", e);
                format!(
                    "Error retrieving context: {}. Proceeding without schema context.",
                    e
                )
            }
        }
    }
}

/// Join document contents with [`SEPARATOR`]
pub fn join_context(documents: &[SchemaDocument]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}
