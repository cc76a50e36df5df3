//! Vector storage for schema documents
//!
//! This module provides:
//! - The [`VectorStore`] trait the Document Index writes through
//! - A Qdrant implementation (collection management, upsert/delete, search)
//! - An in-memory implementation for tests and single-process runs

mod memory;
mod payload;

pub use memory::InMemoryStore;
pub use payload::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::schema::SchemaDocument;
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetCollectionInfoResponse,
    GetPointsBuilder, PointId, PointStruct, ScalarQuantizationBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A stored document with its similarity to the query vector
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: Uuid,
    /// Higher is more similar
    pub score: f32,
    pub document: SchemaDocument,
}

/// Sort by score descending, ties broken by point id ascending
pub fn rank(results: &mut [ScoredDocument]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Storage capability behind the Document Index
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &str;

    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self) -> Result<()>;

    /// Content hashes currently stored for the given ids; absent ids are omitted
    async fn content_hashes(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>>;

    /// Insert or overwrite points by id
    async fn upsert(&self, points: Vec<SchemaPoint>) -> Result<()>;

    async fn delete(&self, ids: &[Uuid]) -> Result<()>;

    /// Nearest neighbours of `vector`, at most `limit`, ranked by [`rank`]
    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredDocument>>;

    /// Liveness probe of the storage service
    async fn heartbeat(&self) -> Result<()>;
}

/// Create the configured vector store
pub fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.vector.backend.as_str() {
        "memory" => {
            info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryStore::new(config.embedding.dimension)))
        }
        "qdrant" => Ok(Arc::new(QdrantStore::connect(config)?)),
        other => Err(Error::Config(format!("Unknown vector backend '{}'", other))),
    }
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Build the client from config; no request is made until first use
    pub fn connect(config: &Config) -> Result<Self> {
        Self::new(
            &config.vector.url(),
            config.vector.api_key(),
            &config.vector.collection_name,
            config.embedding.dimension,
        )
    }

    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    async fn collection_vector_size(&self) -> Result<Option<u64>> {
        let info = self.client.collection_info(&self.collection).await?;
        Ok(extract_vector_size(&info))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend_name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            debug!("Collection {} already exists", self.collection);

            if let Some(size) = self.collection_vector_size().await? {
                if size as usize != self.dimension {
                    return Err(Error::Qdrant(format!(
                        "Collection '{}' has vector size {}, but the embedding model produces {}. \
                         Use a new collection name or drop the collection.",
                        self.collection, size, self.dimension
                    )));
                }
            }
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await?;

        info!("Collection {} created successfully", self.collection);
        Ok(())
    }

    async fn content_hashes(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, point_ids)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await?;

        let mut hashes = HashMap::new();
        for point in response.result {
            let Some(id) = point.id.as_ref().and_then(point_id_to_uuid) else {
                continue;
            };
            if let Some(hash) = point
                .payload
                .get("content_hash")
                .map(|v| json_from_qdrant_value(v.clone()))
                .and_then(|v| v.as_str().map(str::to_string))
            {
                hashes.insert(id, hash);
            }
        }
        Ok(hashes)
    }

    async fn upsert(&self, points: Vec<SchemaPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        if let Some(mismatch) = points.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(Error::Qdrant(format!(
                "Vector dimension mismatch for collection '{}': expected {} (got {})",
                self.collection,
                self.dimension,
                mismatch.vector.len()
            )));
        }

        debug!(
            "Upserting {} points to collection {}",
            points.len(),
            self.collection
        );

        let point_structs: Vec<PointStruct> =
            points.into_iter().map(|p| p.to_point_struct()).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, point_structs).wait(true))
            .await?;

        Ok(())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points from collection {}",
            ids.len(),
            self.collection
        );

        let ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(ids).wait(true))
            .await?;

        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredDocument>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, limit
        );

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, limit as u64).with_payload(true),
            )
            .await?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(id) = point.id.as_ref().and_then(point_id_to_uuid) else {
                continue;
            };
            let map: serde_json::Map<String, Value> = point
                .payload
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect();
            match SchemaPayload::try_from(map) {
                Ok(payload) => results.push(ScoredDocument {
                    id,
                    score: point.score,
                    document: payload.into_document(),
                }),
                Err(e) => warn!("Skipping point {} with unreadable payload: {}", id, e),
            }
        }

        rank(&mut results);
        Ok(results)
    }

    async fn heartbeat(&self) -> Result<()> {
        self.client.health_check().await?;
        Ok(())
    }
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<u64> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => Some(params.size),
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Convert PointId to UUID
fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid_str)) => {
            Uuid::try_parse(uuid_str).ok()
        }
        _ => None,
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
