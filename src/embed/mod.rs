//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - An OpenAI-compatible HTTP backend
//! - Batch processing for efficiency

mod openai;

pub use openai::*;

use crate::api_client::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; output order matches input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = ApiClient::new(&config.llm, config.openai_api_key()?)?;
    let embedder = OpenAiEmbedder::new(client, &config.embedding);
    Ok(Arc::new(embedder))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let expected = batch_texts.len();
        let embeddings = embedder.embed(batch_texts).await?;
        if embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "Model '{}' returned {} embeddings for {} inputs",
                embedder.model_name(),
                embeddings.len(),
                expected
            )));
        }
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingEmbedder {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_batch_splitting_preserves_order() {
        let embedder = CountingEmbedder {
            batches: Mutex::new(Vec::new()),
        };
        let texts: Vec<String> = (0..10).map(|i| "x".repeat(i)).collect();

        let out = embed_in_batches(&embedder, texts, 3).await.unwrap();

        assert_eq!(*embedder.batches.lock().unwrap(), vec![3, 3, 3, 1]);
        let lengths: Vec<f32> = out.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }
}
