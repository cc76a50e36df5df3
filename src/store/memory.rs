//! In-memory [`VectorStore`] for tests and `vector.backend = "memory"`.
//!
//! Points live in a `HashMap` behind a `tokio::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector.

use super::{ScoredDocument, SchemaPoint, VectorStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct InMemoryStore {
    dimension: usize,
    points: RwLock<HashMap<Uuid, SchemaPoint>>,
}

impl InMemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored points
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

pub(crate) fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn content_hashes(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        let points = self.points.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                points
                    .get(id)
                    .map(|p| (*id, p.payload.content_hash.clone()))
            })
            .collect())
    }

    async fn upsert(&self, points: Vec<SchemaPoint>) -> Result<()> {
        if let Some(bad) = points.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(Error::IndexBuild(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                bad.vector.len()
            )));
        }

        let mut stored = self.points.write().await;
        for point in points {
            stored.insert(point.id, point);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = self.points.write().await;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredDocument>> {
        let stored = self.points.read().await;
        let mut scored: Vec<ScoredDocument> = stored
            .values()
            .map(|p| ScoredDocument {
                id: p.id,
                score: cosine_sim(&vector, &p.vector),
                document: p.payload.clone().into_document(),
            })
            .collect();

        super::rank(&mut scored);
        scored.truncate(limit);
        Ok(scored)
    }

    async fn heartbeat(&self) -> Result<()> {
        Ok(())
    }
}
