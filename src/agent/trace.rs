//! Structured record of one agent run
//!
//! Every tool call becomes an [`AgentStep`]. The SQL reported back to the
//! caller is read from the first `sql_db_query` step; the rendered log line
//! is kept as a fallback source.

use super::tools::SQL_DB_QUERY;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Reported when no executed SQL can be found in the trace
pub const SQL_NOT_EXTRACTED: &str = "SQL not extracted";

/// One tool invocation and its result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub input: String,
    pub observation: String,
    /// Human-readable line, `Invoking "<tool>" with `<input>``
    pub log: String,
}

impl AgentStep {
    pub fn new(
        tool: impl Into<String>,
        input: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let input = input.into();
        let log = format!("Invoking \"{}\" with `{}`", tool, input);
        Self {
            tool,
            input,
            observation: observation.into(),
            log,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentTrace {
    steps: Vec<AgentStep>,
}

impl AgentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First SQL sent to `sql_db_query`, if any
    pub fn executed_sql(&self) -> Option<String> {
        for step in &self.steps {
            if step.tool == SQL_DB_QUERY && !step.input.trim().is_empty() {
                return Some(step.input.clone());
            }
            if let Some(sql) = sql_from_log(&step.log) {
                return Some(sql);
            }
        }
        None
    }

    /// [`Self::executed_sql`] or [`SQL_NOT_EXTRACTED`]
    pub fn reported_sql(&self) -> String {
        self.executed_sql()
            .unwrap_or_else(|| SQL_NOT_EXTRACTED.to_string())
    }
}

fn invocation_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?s)Invoking "sql_db_query" with `([^`]*)`"#).ok())
        .as_ref()
}

/// Pull the backtick-delimited SQL out of an invocation log line
pub fn sql_from_log(log: &str) -> Option<String> {
    invocation_pattern()?
        .captures(log)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|sql| !sql.trim().is_empty())
}
