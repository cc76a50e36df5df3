//! Payload schema for Qdrant points

use crate::error::{Error, Result};
use crate::schema::{SchemaDocument, SourceType};
use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Prefix of the name hashed into every point id
const POINT_ID_NAMESPACE: &str = "sqlrag://schema/";

/// Stable point id for a document: UUIDv5 of its object identity
pub fn point_id(document: &SchemaDocument) -> Uuid {
    let name = format!("{}{}", POINT_ID_NAMESPACE, document.identity());
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// A point ready to be upserted
#[derive(Debug, Clone)]
pub struct SchemaPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: SchemaPayload,
}

impl SchemaPoint {
    pub fn new(document: &SchemaDocument, vector: Vec<f32>) -> Self {
        Self {
            id: point_id(document),
            vector,
            payload: SchemaPayload::from_document(document),
        }
    }

    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPayload {
    /// Rendered document text
    pub content: String,

    /// "table", "view" or "placeholder"
    pub source_type: SourceType,

    pub schema_name: String,

    pub object_name: String,

    /// BLAKE3 hash of `content`, compared on rebuild
    pub content_hash: String,

    /// When this point was last written
    pub updated_at: String,
}

impl SchemaPayload {
    pub fn from_document(document: &SchemaDocument) -> Self {
        Self {
            content: document.content.clone(),
            source_type: document.source_type,
            schema_name: document.schema_name.clone(),
            object_name: document.object_name.clone(),
            content_hash: document.content_hash(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn into_document(self) -> SchemaDocument {
        SchemaDocument {
            content: self.content,
            source_type: self.source_type,
            schema_name: self.schema_name,
            object_name: self.object_name,
        }
    }

    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("content".to_string(), string_to_qdrant(&self.content));
        map.insert(
            "source_type".to_string(),
            string_to_qdrant(&self.source_type.to_string()),
        );
        map.insert("schema_name".to_string(), string_to_qdrant(&self.schema_name));
        map.insert("object_name".to_string(), string_to_qdrant(&self.object_name));
        map.insert("content_hash".to_string(), string_to_qdrant(&self.content_hash));
        map.insert("updated_at".to_string(), string_to_qdrant(&self.updated_at));

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

impl TryFrom<Map<String, Value>> for SchemaPayload {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}
