//! OpenAI-compatible chat completions client.
//!
//! Speaks the `/chat/completions` wire format directly over reqwest so the
//! same client works against OpenAI or any compatible endpoint. Tool calls
//! are passed through untouched; retry policy is left to callers' providers,
//! this client performs exactly one request per `complete` call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, LlmClient, LlmConfig, LlmResponse, Role, ToolCall, ToolDefinition};
use crate::error::ScoutError;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Production `LlmClient` backed by an OpenAI-compatible API.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    default_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create from `OPENAI_API_KEY`, targeting the public OpenAI endpoint.
    pub fn from_env(default_model: impl Into<String>) -> Result<Self, ScoutError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ScoutError::Config("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(
            api_key,
            "https://api.openai.com/v1",
            default_model,
        ))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, per the wire format.
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn to_wire(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: role_str(message.role).to_string(),
        content: message.content.clone(),
        tool_call_id: message.tool_call_id.clone(),
        tool_calls: message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect()
        }),
    }
}

fn from_wire_call(call: WireToolCall) -> ToolCall {
    // Malformed argument JSON becomes an empty object; the tool layer
    // reports missing arguments inline rather than aborting the loop.
    let arguments = serde_json::from_str(&call.function.arguments)
        .unwrap_or_else(|_| serde_json::json!({}));
    ToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        config: Option<&LlmConfig>,
    ) -> Result<LlmResponse, ScoutError> {
        let model = config
            .map(|c| c.model.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model);

        let request = WireRequest {
            model,
            messages: messages.iter().map(to_wire).collect(),
            temperature: config.and_then(|c| c.temperature),
            max_tokens: config.and_then(|c| c.max_tokens),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: t,
                })
                .collect(),
        };

        debug!(model, n_messages = messages.len(), n_tools = tools.len(), "LLM request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoutError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::Llm(format!("HTTP {status}: {body}")));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::Llm(format!("invalid response body: {e}")))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ScoutError::Llm("response contained no choices".to_string()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(from_wire_call)
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = if tool_calls.is_empty() {
            ChatMessage::assistant(content)
        } else {
            ChatMessage::assistant_with_tool_calls(content, tool_calls)
        };

        Ok(LlmResponse::new(message))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
