use super::{ChatMessage, ChatModel, ToolSpec};
use crate::api_client::ApiClient;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Chat model behind an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiChatModel {
    client: ApiClient,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(client: ApiClient, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
            tools: tools
                .iter()
                .map(|function| FunctionTool {
                    kind: "function",
                    function,
                })
                .collect(),
        };

        let response: ChatResponse = self
            .client
            .post_json("chat/completions", &request, Error::Llm)
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("model returned no choices".to_string()))?;
        debug!("Completion finished: {:?}", choice.finish_reason);

        Ok(choice.message)
    }
}
