//! In-process fakes shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use sqlrag::app::AppContext;
use sqlrag::config::Config;
use sqlrag::db::SqlDatabase;
use sqlrag::embed::Embedder;
use sqlrag::error::{Error, Result};
use sqlrag::llm::{ChatMessage, ChatModel, Role, ToolCall, ToolSpec};
use sqlrag::schema::{SchemaDocument, SchemaSource, SourceType};
use sqlrag::startup::{assemble, Components};
use sqlrag::store::{InMemoryStore, VectorStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMENSION: usize = 64;

pub const ACTIVE_COUNT_SQL: &str =
    "SELECT COUNT(*) AS count FROM sales.contracts WHERE status = 'Active'";

/// Hashed bag-of-words embedding; shared words mean nearby vectors
pub struct WordEmbedder {
    pub fail: bool,
}

impl WordEmbedder {
    pub fn new() -> Self {
        Self { fail: false }
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(Error::Embedding("embedding service unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "words"
    }
}

fn word_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMENSION];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let slot = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[slot % DIMENSION] += 1.0;
    }
    v
}

/// Fixed catalog with a `sales.contracts` table
pub struct FakeDatabase {
    pub ran: Mutex<Vec<String>>,
    pub reachable: bool,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            ran: Mutex::new(Vec::new()),
            reachable: true,
        }
    }
}

#[async_trait]
impl SqlDatabase for FakeDatabase {
    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn ping(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(Error::Connection("connection refused".to_string()))
        }
    }

    async fn usable_table_names(&self) -> Result<Vec<String>> {
        Ok(vec![
            "public.customers".to_string(),
            "sales.contracts".to_string(),
        ])
    }

    async fn table_info(&self, tables: &[String]) -> Result<String> {
        Ok(tables
            .iter()
            .map(|t| format!("CREATE TABLE {} (\n\tstatus text\n)", t))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String> {
        self.ran.lock().unwrap().push(sql.to_string());
        if sql.contains("status = 'Active'") {
            Ok("[{\"count\":2}]".to_string())
        } else {
            Ok("No rows returned.".to_string())
        }
    }
}

/// Answers contract questions with one SQL call, declines everything else
pub struct ScriptedChatModel {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Llm("chat/completions returned 500".to_string()));
        }

        let last = messages
            .last()
            .ok_or_else(|| Error::Llm("no messages".to_string()))?;

        if last.role == Role::Tool {
            let observation = last.content.clone().unwrap_or_default();
            let count: serde_json::Value = serde_json::from_str(&observation)?;
            return Ok(ChatMessage::assistant(format!(
                "There are {} active contracts.",
                count[0]["count"]
            )));
        }

        let prompt = last.content.clone().unwrap_or_default();
        let question = prompt
            .lines()
            .find(|l| l.starts_with("User query:"))
            .unwrap_or(prompt.as_str());
        if question.contains("active contracts") {
            Ok(ChatMessage::tool_request(
                None,
                vec![ToolCall::new(
                    "call_1",
                    "sql_db_query",
                    &json!({ "query": ACTIVE_COUNT_SQL }),
                )],
            ))
        } else {
            Ok(ChatMessage::assistant(
                "I don't know. The question cannot be answered from the available schema.",
            ))
        }
    }
}

/// Schema source that fails a set number of times before succeeding
pub struct FlakySource {
    pub failures: usize,
    pub attempts: AtomicUsize,
    pub documents: Vec<SchemaDocument>,
}

impl FlakySource {
    pub fn new(failures: usize, documents: Vec<SchemaDocument>) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            documents,
        }
    }
}

#[async_trait]
impl SchemaSource for FlakySource {
    async fn extract(&self) -> Result<Vec<SchemaDocument>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(Error::Connection(format!(
                "Failed to connect to database (attempt {})",
                attempt
            )));
        }
        Ok(self.documents.clone())
    }
}

pub fn sales_schema() -> Vec<SchemaDocument> {
    vec![
        SchemaDocument {
            content: "Table: contracts (Schema: sales)\n\
                      Comment: Stores information about sales contracts.\n\
                      Columns:\n  \
                      - contract_id (integer): Unique identifier for the contract.\n  \
                      - status (character varying): Current status, e.g. Active or Expired."
                .to_string(),
            source_type: SourceType::Table,
            schema_name: "sales".to_string(),
            object_name: "contracts".to_string(),
        },
        SchemaDocument {
            content: "Table: customers (Schema: public)\nColumns:\n  - customer_id (integer)\n  - name (text)"
                .to_string(),
            source_type: SourceType::Table,
            schema_name: "public".to_string(),
            object_name: "customers".to_string(),
        },
        SchemaDocument {
            content: "View: active_contracts_view (Schema: sales)\nDefinition:\n SELECT contract_id FROM sales.contracts WHERE status = 'Active';"
                .to_string(),
            source_type: SourceType::View,
            schema_name: "sales".to_string(),
            object_name: "active_contracts_view".to_string(),
        },
        SchemaDocument {
            content: "Table: invoices (Schema: public)\nColumns:\n  - invoice_id (integer)\n  - amount (numeric)"
                .to_string(),
            source_type: SourceType::Table,
            schema_name: "public".to_string(),
            object_name: "invoices".to_string(),
        },
    ]
}

/// Config with no startup delay and the in-memory backend
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.vector.backend = "memory".to_string();
    config.embedding.dimension = DIMENSION;
    config.startup.retry_delay_secs = 0;
    config.agent.max_steps = 5;
    config.agent.query_timeout_secs = 10;
    config
}

pub struct Harness {
    pub embedder: Arc<WordEmbedder>,
    pub chat: Arc<ScriptedChatModel>,
    pub database: Arc<FakeDatabase>,
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            embedder: Arc::new(WordEmbedder::new()),
            chat: Arc::new(ScriptedChatModel::new()),
            database: Arc::new(FakeDatabase::new()),
            store: Arc::new(InMemoryStore::new(DIMENSION)),
        }
    }

    pub fn components(&self) -> Components {
        let store: Arc<dyn VectorStore> = self.store.clone();
        Components {
            llm: self.chat.clone(),
            embedder: self.embedder.clone(),
            database: self.database.clone(),
            store,
        }
    }

    pub async fn context(&self, source: &dyn SchemaSource) -> Result<AppContext> {
        assemble(test_config(), self.components(), source).await
    }
}
