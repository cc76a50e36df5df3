//! SQL tool definitions and handlers
//!
//! Tool failures never abort the agent: they come back to the model as an
//! `Error: ...` observation so it can correct itself.

use super::prompt::query_checker_prompt;
use crate::db::SqlDatabase;
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel, ToolCall, ToolSpec};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const SQL_DB_QUERY: &str = "sql_db_query";
pub const SQL_DB_SCHEMA: &str = "sql_db_schema";
pub const SQL_DB_LIST_TABLES: &str = "sql_db_list_tables";
pub const SQL_DB_QUERY_CHECKER: &str = "sql_db_query_checker";

/// Result of one tool call, ready for the trace
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub tool: String,
    /// The argument the tool acted on (SQL text, table list, ...)
    pub input: String,
    pub observation: String,
}

/// Get all available tool definitions
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: SQL_DB_QUERY.to_string(),
            description: "Execute a SQL query against the database and get back the result. \
                If the query is not correct, an error message is returned; rewrite the query, \
                check it, and try again. If you get an unknown column error, use sql_db_schema \
                to look up the correct table fields."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A detailed and correct SQL query"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: SQL_DB_SCHEMA.to_string(),
            description: "Get the columns and sample rows for the given tables. Call \
                sql_db_list_tables first to be sure the tables exist."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "Comma-separated list of schema-qualified tables, e.g. sales.contracts, public.invoices"
                    }
                },
                "required": ["table_names"]
            }),
        },
        ToolSpec {
            name: SQL_DB_LIST_TABLES.to_string(),
            description: "List every table in the database as a comma-separated string."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSpec {
            name: SQL_DB_QUERY_CHECKER.to_string(),
            description: "Double check a query for common mistakes before running it with \
                sql_db_query. Always use this before executing a query."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A detailed and correct SQL query to check"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Handlers for the SQL tools, bound to one database and model
pub struct SqlToolkit {
    db: Arc<dyn SqlDatabase>,
    llm: Arc<dyn ChatModel>,
}

impl SqlToolkit {
    pub fn new(db: Arc<dyn SqlDatabase>, llm: Arc<dyn ChatModel>) -> Self {
        Self { db, llm }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        tool_specs()
    }

    /// Run one tool call; failures become observations
    pub async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let name = call.function.name.as_str();
        let args = parse_arguments(&call.function.arguments);

        let (input, result) = match name {
            SQL_DB_QUERY => {
                let query = argument(&args, "query");
                let result = self.db.run(&query).await;
                (query, result)
            }
            SQL_DB_SCHEMA => {
                let raw = argument(&args, "table_names");
                let tables = split_table_names(&raw);
                let result = self.db.table_info(&tables).await;
                (raw, result)
            }
            SQL_DB_LIST_TABLES => {
                let result = self.db.usable_table_names().await.map(|t| t.join(", "));
                (String::new(), result)
            }
            SQL_DB_QUERY_CHECKER => {
                let query = argument(&args, "query");
                let result = self.check_query(&query).await;
                (query, result)
            }
            other => {
                let known: Vec<String> = tool_specs().into_iter().map(|t| t.name).collect();
                let observation = format!(
                    "{} is not a valid tool, try one of [{}].",
                    other,
                    known.join(", ")
                );
                return ToolOutcome {
                    tool: other.to_string(),
                    input: call.function.arguments.clone(),
                    observation,
                };
            }
        };

        let observation = match result {
            Ok(text) => text,
            Err(e) => {
                debug!("Tool {} failed: {}", name, e);
                format!("Error: {}", e)
            }
        };

        ToolOutcome {
            tool: name.to_string(),
            input,
            observation,
        }
    }

    async fn check_query(&self, query: &str) -> Result<String> {
        let prompt = query_checker_prompt(self.db.dialect(), query);
        let reply = self.llm.complete(&[ChatMessage::user(prompt)], &[]).await?;
        reply
            .content
            .map(|c| strip_code_fence(&c))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Llm("query checker returned no text".to_string()))
    }
}

/// Arguments arrive as a JSON object; anything else is kept as a bare string
fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(Value::String(s)) => Value::String(s),
        _ => Value::String(raw.to_string()),
    }
}

fn argument(args: &Value, key: &str) -> String {
    match args {
        Value::Object(map) => match map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `"a.b, c.d"` into `["a.b", "c.d"]`
pub fn split_table_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().trim_matches('"').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // drop an info string such as ```sql
    let body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or(body);
    body.trim_end_matches("```").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedDb {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlDatabase for ScriptedDb {
        fn dialect(&self) -> &str {
            "postgresql"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn usable_table_names(&self) -> Result<Vec<String>> {
            Ok(vec!["public.invoices".to_string(), "sales.contracts".to_string()])
        }

        async fn table_info(&self, tables: &[String]) -> Result<String> {
            if tables.iter().any(|t| t == "sales.missing") {
                return Err(Error::InvalidInput(
                    "table_names [\"sales.missing\"] not found in database".to_string(),
                ));
            }
            Ok(format!("described: {}", tables.join("|")))
        }

        async fn run(&self, sql: &str) -> Result<String> {
            self.ran.lock().unwrap().push(sql.to_string());
            if sql.contains("bogus") {
                return Err(Error::Agent("column \"bogus\" does not exist".to_string()));
            }
            Ok("[{\"count\":2}]".to_string())
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatMessage> {
            let prompt = messages[0].content.clone().unwrap_or_default();
            let query = prompt.lines().next().unwrap_or_default();
            Ok(ChatMessage::assistant(format!("```sql\n{}\n```", query)))
        }
    }

    fn toolkit() -> (SqlToolkit, Arc<ScriptedDb>) {
        let db = Arc::new(ScriptedDb {
            ran: Mutex::new(Vec::new()),
        });
        (SqlToolkit::new(db.clone(), Arc::new(EchoModel)), db)
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new("call_1", name, &args)
    }

    #[tokio::test]
    async fn test_query_tool_runs_sql() {
        let (toolkit, db) = toolkit();
        let sql = "SELECT COUNT(*) FROM sales.contracts WHERE status = 'Active'";
        let outcome = toolkit.invoke(&call(SQL_DB_QUERY, json!({"query": sql}))).await;

        assert_eq!(outcome.input, sql);
        assert_eq!(outcome.observation, "[{\"count\":2}]");
        assert_eq!(*db.ran.lock().unwrap(), vec![sql.to_string()]);
    }

    #[tokio::test]
    async fn test_query_error_becomes_observation() {
        let (toolkit, _) = toolkit();
        let outcome = toolkit
            .invoke(&call(SQL_DB_QUERY, json!({"query": "SELECT bogus FROM sales.contracts"})))
            .await;
        assert!(outcome.observation.starts_with("Error: "));
        assert!(outcome.observation.contains("bogus"));
    }

    #[tokio::test]
    async fn test_schema_and_list_tools() {
        let (toolkit, _) = toolkit();

        let listed = toolkit.invoke(&call(SQL_DB_LIST_TABLES, json!({}))).await;
        assert_eq!(listed.observation, "public.invoices, sales.contracts");

        let schema = toolkit
            .invoke(&call(SQL_DB_SCHEMA, json!({"table_names": "sales.contracts, public.invoices"})))
            .await;
        assert_eq!(schema.observation, "described: sales.contracts|public.invoices");

        let missing = toolkit
            .invoke(&call(SQL_DB_SCHEMA, json!({"table_names": "sales.missing"})))
            .await;
        assert!(missing.observation.contains("not found in database"));
    }

    #[tokio::test]
    async fn test_query_checker_strips_fence() {
        let (toolkit, db) = toolkit();
        let outcome = toolkit
            .invoke(&call(SQL_DB_QUERY_CHECKER, json!({"query": "SELECT 1"})))
            .await;
        assert_eq!(outcome.observation, "SELECT 1");
        assert!(db.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_raw_arguments() {
        let (toolkit, db) = toolkit();

        let unknown = toolkit.invoke(&call("drop_everything", json!({}))).await;
        assert!(unknown.observation.contains("is not a valid tool"));

        let raw = ToolCall {
            id: "call_2".to_string(),
            kind: "function".to_string(),
            function: crate::llm::FunctionCall {
                name: SQL_DB_QUERY.to_string(),
                arguments: "SELECT 2".to_string(),
            },
        };
        let outcome = toolkit.invoke(&raw).await;
        assert_eq!(outcome.input, "SELECT 2");
        assert_eq!(db.ran.lock().unwrap().last().map(String::as_str), Some("SELECT 2"));
    }

    #[test]
    fn test_split_table_names() {
        assert_eq!(
            split_table_names(" sales.contracts,public.invoices , "),
            vec!["sales.contracts".to_string(), "public.invoices".to_string()]
        );
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fence("  SELECT 1  "), "SELECT 1");
    }
}
