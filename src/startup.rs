//! Startup supervisor
//!
//! Builds the components in dependency order. Extraction plus index build is
//! the step that depends on the database and vector store being up, so it
//! runs under a bounded retry with a fixed delay. Exhausting the attempts is
//! fatal: the service never reports ready with a missing index.

use crate::agent::SqlAgent;
use crate::app::AppContext;
use crate::config::{Config, StartupConfig};
use crate::db::{PgDatabase, SqlDatabase};
use crate::embed::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::index::{DocumentIndex, IndexReport};
use crate::llm::{create_chat_model, ChatModel};
use crate::retrieve::ContextRetriever;
use crate::schema::{with_placeholder, SchemaExtractor, SchemaSource};
use crate::store::{create_store, VectorStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&StartupConfig> for RetryPolicy {
    fn from(config: &StartupConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is used up.
///
/// The delay is an async sleep, so dropping the returned future (for example
/// on Ctrl-C) cancels the remaining attempts.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        info!("Attempt {}/{} to {}...", attempt, max, label);
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!("Error during {} (attempt {}): {}", label, attempt, e);
                if e.is_connection() {
                    warn!("A backing service looks unreachable; it may still be starting");
                }
                if attempt >= max {
                    error!("Max retries reached. Failed to {}.", label);
                    return Err(e);
                }
            }
        }
        tokio::time::sleep(policy.delay).await;
        attempt += 1;
    }
}

/// Extract schema documents and build the index, with retries
pub async fn load_schema_index(
    source: &dyn SchemaSource,
    index: &DocumentIndex,
    policy: &RetryPolicy,
) -> Result<IndexReport> {
    retry(policy, "load schema documents", |_| async move {
        let documents = with_placeholder(source.extract().await?);
        info!("Loaded {} schema documents", documents.len());
        index.build(&documents).await
    })
    .await
}

/// Long-lived handles that exist before the schema index is loaded
pub struct Components {
    pub llm: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub database: Arc<dyn SqlDatabase>,
    pub store: Arc<dyn VectorStore>,
}

/// Load the index from `source` and wire retriever and agent around it
pub async fn assemble(
    config: Config,
    components: Components,
    source: &dyn SchemaSource,
) -> Result<AppContext> {
    let Components {
        llm,
        embedder,
        database,
        store,
    } = components;

    let index = Arc::new(DocumentIndex::new(
        embedder.clone(),
        store.clone(),
        config.embedding.batch_size,
    ));
    let policy = RetryPolicy::from(&config.startup);
    load_schema_index(source, &index, &policy).await?;
    info!("Vector store initialized.");

    let retriever = Arc::new(ContextRetriever::new(index, config.retrieval.k));
    info!("Retrieval pipeline initialized (k={}).", retriever.k());

    let agent = Arc::new(SqlAgent::new(llm.clone(), database.clone(), &config.agent));
    info!("SQL agent initialized.");

    Ok(AppContext {
        config,
        llm: Some(llm),
        embedder: Some(embedder),
        database: Some(database),
        store: Some(store),
        retriever: Some(retriever),
        agent: Some(agent),
    })
}

/// Run `work` unless `shutdown` resolves first
pub async fn cancellable<T, W, S>(work: W, shutdown: S) -> Result<T>
where
    W: Future<Output = Result<T>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = shutdown => {
            warn!("Startup cancelled before all components were initialized");
            Err(Error::Cancelled("startup interrupted by shutdown signal".to_string()))
        }
        out = work => out,
    }
}

/// Build every component against the real services
pub async fn initialize(config: Config) -> Result<AppContext> {
    info!("Initializing components...");

    let llm = create_chat_model(&config)?;
    let embedder = create_embedder(&config)?;
    info!(
        "LLM ({}) and embeddings model ({}) initialized.",
        llm.model_name(),
        embedder.model_name()
    );

    info!(
        "Database URL (password masked): {}",
        config.database.masked_url()
    );
    let pg = PgDatabase::connect_lazy(&config.database);
    let extractor = SchemaExtractor::new(pg.pool().clone());
    let database: Arc<dyn SqlDatabase> = Arc::new(pg);
    info!("SQL database engine initialized ({}).", database.dialect());

    info!(
        "Vector store: {} at {}",
        config.vector.backend,
        config.vector.url()
    );
    let store = create_store(&config)?;

    let components = Components {
        llm,
        embedder,
        database,
        store,
    };
    let ctx = assemble(config, components, &extractor).await?;
    info!("All components initialized.");
    Ok(ctx)
}
