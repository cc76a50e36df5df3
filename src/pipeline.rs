//! Query Orchestrator
//!
//! Retrieval strictly precedes the agent: the retrieved context is framed
//! into the agent prompt, then the agent's answer (or error) is shaped into
//! a [`QueryResult`]. Exactly one of `answer` and `error` is set, and the
//! context gathered is returned either way.

use crate::agent::prompt::query_prompt;
use crate::agent::SqlAgent;
use crate::error::Error;
use crate::retrieve::ContextRetriever;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Body of `POST /query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub natural_language_query: String,
}

/// Response of `POST /query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "natural_language_query")]
    pub query: String,

    /// SQL the agent executed, best effort
    #[serde(default)]
    pub sql_query: Option<String>,

    #[serde(rename = "result", default)]
    pub answer: Option<String>,

    /// Retrieved schema context, or the sentinel/error text standing in for it
    #[serde(rename = "context_from_vector_db", default)]
    pub context: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn answered(query: &str, context: String, sql: String, answer: String) -> Self {
        Self {
            query: query.to_string(),
            sql_query: Some(sql),
            answer: Some(answer),
            context: Some(context),
            error: None,
        }
    }

    pub fn failed(query: &str, context: String, error: &Error) -> Self {
        Self {
            query: query.to_string(),
            sql_query: None,
            answer: None,
            context: Some(context),
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct QueryPipeline {
    retriever: Arc<ContextRetriever>,
    agent: Arc<SqlAgent>,
    timeout: Duration,
}

impl QueryPipeline {
    pub fn new(retriever: Arc<ContextRetriever>, agent: Arc<SqlAgent>, timeout: Duration) -> Self {
        Self {
            retriever,
            agent,
            timeout,
        }
    }

    /// Retrieve context, run the agent under the per-query deadline, shape the result
    pub async fn handle_query(&self, query: &str) -> QueryResult {
        info!("Received natural language query: {}", query);

        info!("Step 1: Retrieving context from vector store...");
        let context = self.retriever.retrieve(query).await;

        let prompt = query_prompt(&context, query);
        info!("Step 2: Passing to SQL Agent for SQL generation and execution...");
        info!("Prompt for SQL Agent:\n{}", prompt);

        let outcome = match tokio::time::timeout(self.timeout, self.agent.run(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "SQL agent did not finish within {}s",
                self.timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(outcome) => {
                let sql = outcome.trace.reported_sql();
                info!("SQL Agent generated SQL (best effort extraction): {}", sql);
                info!("SQL Agent final answer: {}", outcome.answer);
                QueryResult::answered(query, context, sql, outcome.answer)
            }
            Err(e) => {
                error!("Error during SQL agent execution: {}", e);
                QueryResult::failed(query, context, &e)
            }
        }
    }
}
