//! Default values for configuration

use tracing::warn;

/// Vector store address keys, most preferred first
const VECTOR_HOST_KEYS: &[&str] = &["QDRANT_HOST", "CHROMA_HOST"];
const VECTOR_PORT_KEYS: &[&str] = &["QDRANT_PORT", "CHROMA_PORT"];

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, fallback: &str) -> String {
    env_lookup(key).unwrap_or_else(|| fallback.to_string())
}

/// Value of the first key in `keys` that `lookup` finds.
///
/// The `CHROMA_*` keys of older deployments still address the vector store,
/// with a warning.
pub(crate) fn first_env<F>(keys: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| {
        let value = lookup(key)?;
        if key.starts_with("CHROMA_") {
            warn!(
                "{} is set and used as the vector store address; prefer {}",
                key,
                key.replace("CHROMA_", "QDRANT_")
            );
        }
        Some(value)
    })
}

fn env_parse_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Default database user
pub fn default_db_user() -> String {
    env_or("POSTGRES_USER", "user")
}

/// Default database password
pub fn default_db_password() -> String {
    env_or("POSTGRES_PASSWORD", "password")
}

/// Default database host (the compose service name)
pub fn default_db_host() -> String {
    env_or("DB_HOST", "db")
}

/// Default database port
pub fn default_db_port() -> u16 {
    env_parse_or("DB_PORT", 5432)
}

/// Default database name
pub fn default_db_name() -> String {
    env_or("POSTGRES_DB", "ragdb")
}

pub fn default_db_max_connections() -> u32 {
    5
}

/// Rows returned to the agent per executed statement
pub fn default_db_max_result_rows() -> usize {
    100
}

/// Default vector backend kind
pub fn default_vector_backend() -> String {
    env_or("VECTOR_BACKEND", "qdrant")
}

/// Default Qdrant host
pub fn default_vector_host() -> String {
    first_env(VECTOR_HOST_KEYS, env_lookup).unwrap_or_else(|| "qdrant".to_string())
}

/// Default Qdrant gRPC port (6334, not 6333 REST)
pub fn default_vector_port() -> u16 {
    first_env(VECTOR_PORT_KEYS, env_lookup)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(6334)
}

/// Default collection name
pub fn default_collection_name() -> String {
    "schema_embeddings".to_string()
}

/// Default environment variable name for Qdrant API key
pub fn default_vector_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    env_or("EMBEDDING_MODEL", "text-embedding-ada-002")
}

/// Default embedding dimension (matches the default model)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    64
}

/// Default chat model
pub fn default_llm_model() -> String {
    env_or("OPENAI_MODEL", "gpt-3.5-turbo")
}

pub fn default_llm_temperature() -> f32 {
    0.0
}

/// Default OpenAI-compatible API base URL
pub fn default_llm_base_url() -> String {
    env_or("OPENAI_BASE_URL", "https://api.openai.com/v1/")
}

/// Default environment variable name for the OpenAI API key
pub fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default HTTP timeout for model calls
pub fn default_llm_timeout_secs() -> u64 {
    60
}

/// Default tool-use step budget
pub fn default_agent_max_steps() -> usize {
    15
}

/// Default row limit suggested to the model
pub fn default_agent_top_k() -> usize {
    10
}

/// Default per-query deadline
pub fn default_agent_query_timeout_secs() -> u64 {
    180
}

/// Default number of schema documents retrieved per query
pub fn default_retrieval_k() -> usize {
    3
}

/// Default startup attempts for extraction + indexing
pub fn default_startup_max_attempts() -> u32 {
    5
}

/// Default delay between startup attempts
pub fn default_startup_retry_delay_secs() -> u64 {
    10
}

/// Default HTTP bind address
pub fn default_server_bind() -> String {
    env_or("BIND_ADDR", "0.0.0.0:8000")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in<'a>(env: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_chroma_keys_are_fallbacks() {
        let env = HashMap::from([("CHROMA_HOST", "vectors"), ("CHROMA_PORT", "8000")]);
        assert_eq!(
            first_env(VECTOR_HOST_KEYS, lookup_in(&env)).as_deref(),
            Some("vectors")
        );
        assert_eq!(
            first_env(VECTOR_PORT_KEYS, lookup_in(&env)).as_deref(),
            Some("8000")
        );
    }

    #[test]
    fn test_qdrant_keys_win_over_chroma() {
        let env = HashMap::from([("QDRANT_HOST", "qdrant-1"), ("CHROMA_HOST", "chroma")]);
        assert_eq!(
            first_env(VECTOR_HOST_KEYS, lookup_in(&env)).as_deref(),
            Some("qdrant-1")
        );
        assert_eq!(first_env(VECTOR_PORT_KEYS, lookup_in(&env)), None);
    }
}
