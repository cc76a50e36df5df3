//! Configuration management for sqlrag
//!
//! Every field has a default, most of them read from the environment keys
//! the service is deployed with (`POSTGRES_*`, `DB_*`, `QDRANT_*`,
//! `OPENAI_*`). A TOML file can override any of them.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Vector storage service settings
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// SQL agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Startup retry policy
    #[serde(default)]
    pub startup: StartupConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default = "default_db_password")]
    pub password: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Pool size shared by extraction, the agent and health probes
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,

    /// Maximum rows rendered back to the agent per statement
    #[serde(default = "default_db_max_result_rows")]
    pub max_result_rows: usize,
}

/// Vector storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Backend kind: "qdrant" or "memory"
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    #[serde(default = "default_vector_host")]
    pub host: String,

    #[serde(default = "default_vector_port")]
    pub port: u16,

    /// Collection holding the schema documents
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Environment variable name for the Qdrant API key
    #[serde(default = "default_vector_api_key_env")]
    pub api_key_env: String,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// OpenAI-compatible API base URL, shared with the embedding client
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable name for the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// HTTP timeout per model call
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// SQL agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model turns before the run is abandoned
    #[serde(default = "default_agent_max_steps")]
    pub max_steps: usize,

    /// Row limit the model is told to apply unless asked otherwise
    #[serde(default = "default_agent_top_k")]
    pub top_k: usize,

    /// Deadline for one whole agent run
    #[serde(default = "default_agent_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of schema documents joined into the agent context
    #[serde(default = "default_retrieval_k")]
    pub k: usize,
}

/// Startup retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    #[serde(default = "default_startup_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_startup_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            password: default_db_password(),
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            max_connections: default_db_max_connections(),
            max_result_rows: default_db_max_result_rows(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            host: default_vector_host(),
            port: default_vector_port(),
            collection_name: default_collection_name(),
            api_key_env: default_vector_api_key_env(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_agent_max_steps(),
            top_k: default_agent_top_k(),
            query_timeout_secs: default_agent_query_timeout_secs(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_retrieval_k(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_startup_max_attempts(),
            retry_delay_secs: default_startup_retry_delay_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
        }
    }
}

impl DatabaseConfig {
    /// Connection URL with the password in clear; never log this one.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }

    /// Connection URL safe for logs
    pub fn masked_url(&self) -> String {
        format!(
            "postgres://{}:********@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }
}

impl VectorConfig {
    /// gRPC URL of the Qdrant service
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the Qdrant API key from environment
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl LlmConfig {
    /// Resolve an API path (`embeddings`, `chat/completions`) against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", self.base_url, e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AgentConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl StartupConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, or from defaults when no path is given
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                debug!("Loading config from {:?}", path);
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => {
                debug!("No config file given, using environment and defaults");
                Config::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Get the OpenAI API key; its absence is fatal for startup
    pub fn openai_api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} environment variable not set",
                    self.llm.api_key_env
                ))
            })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.k == 0 {
            return Err(Error::Config("retrieval.k must be >= 1".to_string()));
        }

        if self.startup.max_attempts == 0 {
            return Err(Error::Config(
                "startup.max_attempts must be >= 1".to_string(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(Error::Config("agent.max_steps must be >= 1".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be > 0".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be >= 1".to_string(),
            ));
        }

        match self.vector.backend.as_str() {
            "qdrant" | "memory" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown vector backend '{}'; must be qdrant or memory",
                    other
                )))
            }
        }

        Ok(())
    }
}
