//! Application context
//!
//! Every long-lived handle is built once at startup and held here; request
//! handlers receive the context through axum state. A handle that failed to
//! build stays `None`, which the health report and readiness check expose.

use crate::agent::SqlAgent;
use crate::config::Config;
use crate::db::SqlDatabase;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::llm::ChatModel;
use crate::pipeline::QueryPipeline;
use crate::retrieve::ContextRetriever;
use crate::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const INITIALIZED: &str = "Initialized";
const NOT_INITIALIZED: &str = "Not Initialized";

/// Upper bound for each live probe in the health report
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AppContext {
    pub config: Config,
    pub llm: Option<Arc<dyn ChatModel>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub database: Option<Arc<dyn SqlDatabase>>,
    pub store: Option<Arc<dyn VectorStore>>,
    pub retriever: Option<Arc<ContextRetriever>>,
    pub agent: Option<Arc<SqlAgent>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub services: BTreeMap<String, String>,
}

impl AppContext {
    /// Context with nothing built yet
    pub fn empty(config: Config) -> Self {
        Self {
            config,
            llm: None,
            embedder: None,
            database: None,
            store: None,
            retriever: None,
            agent: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.retriever.is_some() && self.agent.is_some() && self.llm.is_some()
    }

    /// The query pipeline, or [`Error::NotReady`] if a core component is missing
    pub fn pipeline(&self) -> Result<QueryPipeline> {
        match (&self.retriever, &self.agent, &self.llm) {
            (Some(retriever), Some(agent), Some(_)) => Ok(QueryPipeline::new(
                retriever.clone(),
                agent.clone(),
                self.config.agent.query_timeout(),
            )),
            _ => Err(Error::NotReady("Please try again later.".to_string())),
        }
    }

    /// Component construction state plus live database and vector store probes
    pub async fn health(&self) -> HealthReport {
        let components = [
            ("llm", self.llm.is_some()),
            ("embeddings_model", self.embedder.is_some()),
            ("sql_database_engine", self.database.is_some()),
            ("vector_store", self.store.is_some()),
            ("retrieval_pipeline", self.retriever.is_some()),
            ("sql_agent", self.agent.is_some()),
        ];

        let mut services: BTreeMap<String, String> = components
            .iter()
            .map(|(name, built)| {
                let state = if *built { INITIALIZED } else { NOT_INITIALIZED };
                (name.to_string(), state.to_string())
            })
            .collect();

        let (db_ok, db_state) = match &self.database {
            Some(db) => probe("PostgreSQL", db.ping()).await,
            None => (false, NOT_INITIALIZED.to_string()),
        };
        services.insert("postgresql_connection".to_string(), db_state);

        let (store_ok, store_state) = match &self.store {
            Some(store) => probe("Vector store", store.heartbeat()).await,
            None => (false, NOT_INITIALIZED.to_string()),
        };
        services.insert("vector_store_connection".to_string(), store_state);

        let built: Vec<bool> = components.iter().map(|(_, b)| *b).collect();
        HealthReport {
            status: overall_status(&built, db_ok && store_ok),
            services,
        }
    }
}

async fn probe<F>(name: &str, check: F) -> (bool, String)
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(Ok(())) => (true, "OK".to_string()),
        Ok(Err(e)) => {
            warn!("Health check: {} connection failed: {}", name, e);
            (false, format!("Error: {}", e))
        }
        Err(_) => {
            warn!("Health check: {} probe timed out", name);
            (
                false,
                format!("Error: no response within {}s", PROBE_TIMEOUT.as_secs()),
            )
        }
    }
}

/// `ok` when everything is built and both probes pass, `error` when nothing
/// is built, `degraded` otherwise
pub fn overall_status(components: &[bool], probes_ok: bool) -> HealthStatus {
    if components.iter().all(|b| *b) && probes_ok {
        HealthStatus::Ok
    } else if !components.iter().any(|b| *b) {
        HealthStatus::Error
    } else {
        HealthStatus::Degraded
    }
}
