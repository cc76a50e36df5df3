//! SQL Agent
//!
//! A bounded tool-use loop: the model sees the live table catalog and the SQL
//! tools, and each turn either calls tools (whose observations are fed back)
//! or gives its final answer. Every tool call is recorded in an
//! [`AgentTrace`] so the executed SQL can be reported alongside the answer.

pub mod prompt;
pub mod tools;
pub mod trace;

pub use tools::{SqlToolkit, ToolOutcome};
pub use trace::{AgentStep, AgentTrace, SQL_NOT_EXTRACTED};

use crate::config::AgentConfig;
use crate::db::SqlDatabase;
use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel};
use std::sync::Arc;
use tracing::{debug, info};

/// Answer given when the model finishes with empty text
pub const NO_OUTPUT: &str = "No output from SQL agent.";

/// What one agent run produced
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub trace: AgentTrace,
    pub answer: String,
}

pub struct SqlAgent {
    llm: Arc<dyn ChatModel>,
    db: Arc<dyn SqlDatabase>,
    toolkit: SqlToolkit,
    max_steps: usize,
    top_k: usize,
}

impl SqlAgent {
    pub fn new(llm: Arc<dyn ChatModel>, db: Arc<dyn SqlDatabase>, config: &AgentConfig) -> Self {
        let toolkit = SqlToolkit::new(db.clone(), llm.clone());
        Self {
            llm,
            db,
            toolkit,
            max_steps: config.max_steps,
            top_k: config.top_k,
        }
    }

    /// Run the loop for one prompt.
    ///
    /// Model failures, catalog failures and an exhausted step budget are
    /// returned as [`Error::Agent`]; tool failures are not errors here.
    pub async fn run(&self, prompt: &str) -> Result<AgentOutcome> {
        let catalog = self
            .db
            .usable_table_names()
            .await
            .map_err(|e| Error::Agent(format!("could not read table catalog: {}", e)))?;

        let specs = self.toolkit.specs();
        let mut messages = vec![
            ChatMessage::system(prompt::system_prompt(self.db.dialect(), self.top_k, &catalog)),
            ChatMessage::user(prompt),
        ];
        let mut trace = AgentTrace::new();

        for turn in 1..=self.max_steps {
            debug!("Agent turn {}/{}", turn, self.max_steps);
            let reply = self
                .llm
                .complete(&messages, &specs)
                .await
                .map_err(|e| Error::Agent(e.to_string()))?;

            if reply.tool_calls.is_empty() {
                let answer = reply
                    .content
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| NO_OUTPUT.to_string());
                info!("Agent finished after {} tool calls", trace.len());
                return Ok(AgentOutcome { trace, answer });
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in &calls {
                let outcome = self.toolkit.invoke(call).await;
                let step = AgentStep::new(outcome.tool, outcome.input, outcome.observation);
                info!("{}", step.log);
                debug!("Observation: {}", step.observation);

                messages.push(ChatMessage::tool_result(&call.id, &step.observation));
                trace.push(step);
            }
        }

        Err(Error::Agent(format!(
            "Agent stopped after {} steps without a final answer",
            self.max_steps
        )))
    }
}
