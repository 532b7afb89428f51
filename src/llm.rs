//! Suggestion collaborator over an OpenAI-compatible chat completions endpoint.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::suggestion::{SuggestionCollaborator, SuggestionRequest};

/// Connection settings for the language-model endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Full URL of the chat completions endpoint
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for chat completions with a JSON-schema response format
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

fn build_body(model: &str, request: &SuggestionRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        }],
        response_format: json!({
            "type": "json_schema",
            "json_schema": {
                "name": "replacement_suggestions",
                "schema": request.response_schema,
            }
        }),
    }
}

/// Pull the JSON document out of the first choice's message content
fn parse_completion(text: &str) -> Result<Value> {
    let parsed: ChatCompletionResponse = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("LLM response parse error: {}; body: {}", e, text))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("LLM response has no message content"))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("LLM content is not JSON: {}", e))
}

#[async_trait]
impl SuggestionCollaborator for ChatCompletionsClient {
    async fn invoke(&self, request: &SuggestionRequest) -> Result<Value> {
        let body = build_body(&self.config.model, request);
        let mut req = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "Sending suggestion request");
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("LLM API error {}: {}", status, text));
        }
        parse_completion(&text)
    }
}
