//! Document Index
//!
//! Embeds schema documents and keeps them in the vector store, keyed by a
//! stable per-object point id. A rebuild only embeds documents that are new
//! or whose content hash changed, so restarting the service does not grow
//! the collection.

use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::schema::{SchemaDocument, SourceType};
use crate::store::{point_id, rank, SchemaPoint, ScoredDocument, VectorStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// What a build changed in the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Placeholder points dropped once real documents exist
    pub removed: usize,
}

pub struct DocumentIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl DocumentIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and store `documents`, skipping those already stored unchanged.
    ///
    /// Any embedding failure fails the whole build with [`Error::IndexBuild`];
    /// nothing is written in that case.
    pub async fn build(&self, documents: &[SchemaDocument]) -> Result<IndexReport> {
        self.store.ensure_collection().await?;

        let mut seen = HashSet::new();
        let documents: Vec<&SchemaDocument> = documents
            .iter()
            .filter(|d| seen.insert(point_id(d)))
            .collect();

        let ids: Vec<_> = documents.iter().map(|d| point_id(d)).collect();
        let stored = self.store.content_hashes(&ids).await?;

        let mut report = IndexReport::default();
        let mut pending = Vec::new();
        for (doc, id) in documents.iter().zip(&ids) {
            match stored.get(id) {
                Some(hash) if *hash == doc.content_hash() => report.unchanged += 1,
                Some(_) => {
                    report.updated += 1;
                    pending.push(*doc);
                }
                None => {
                    report.added += 1;
                    pending.push(*doc);
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                "Embedding {} documents with {}",
                pending.len(),
                self.embedder.model_name()
            );
            let texts: Vec<String> = pending.iter().map(|d| d.content.clone()).collect();
            let vectors = embed_in_batches(self.embedder.as_ref(), texts, self.batch_size)
                .await
                .map_err(|e| {
                    Error::IndexBuild(format!("Failed to embed {} documents: {}", pending.len(), e))
                })?;

            let points: Vec<SchemaPoint> = pending
                .iter()
                .zip(vectors)
                .map(|(doc, vector)| SchemaPoint::new(doc, vector))
                .collect();
            self.store.upsert(points).await?;
        }

        if documents
            .iter()
            .any(|d| d.source_type != SourceType::Placeholder)
        {
            let placeholder = point_id(&SchemaDocument::placeholder());
            if !self.store.content_hashes(&[placeholder]).await?.is_empty() {
                self.store.delete(&[placeholder]).await?;
                report.removed += 1;
            }
        }

        info!(
            "Index build complete: {} added, {} updated, {} unchanged, {} removed",
            report.added, report.updated, report.unchanged, report.removed
        );
        Ok(report)
    }

    /// The `k` documents most similar to `text`, most similar first
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))?;

        let mut results = self.store.search(vector, k).await?;
        rank(&mut results);
        results.truncate(k);
        Ok(results)
    }
}
