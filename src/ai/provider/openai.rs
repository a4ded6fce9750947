//! OpenAI Chat Completions Client
//!
//! Sends the conversation with tool definitions (`tool_choice: auto`) and maps
//! the first choice back to a `Message`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{LlmClient, ProviderConfig, ProviderKind};
use crate::ai::message::{FunctionCall, Message, Role, ToolCall};
use crate::ai::tools::ToolDefinition;
use crate::types::{DocError, ErrorCategory, ErrorClassifier, LlmError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER: &str = "openai";

/// OpenAI client with secure API key handling
pub struct OpenAiClient {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                DocError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY or llm.api_key in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                LlmError::with_provider(
                    ErrorCategory::Unavailable,
                    format!("Failed to create HTTP client: {}", e),
                    PROVIDER,
                )
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> ChatRequest {
        let tools: Vec<Value> = tools.iter().map(ToolDefinition::to_function_spec).collect();
        ChatRequest {
            model: self.model.clone(),
            messages: wire_messages(messages),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools: (!tools.is_empty()).then_some(tools),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        let start = Instant::now();
        let request = self.build_request(messages, tools);
        let url = format!("{}/chat/completions", self.api_base);

        debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify(&format!("request failed: {}", e), PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let mut err = ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER,
            );
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err.into());
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse OpenAI response: {}", e),
                PROVIDER,
            )
        })?;

        debug!("OpenAI response in {:?}", start.elapsed());

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            LlmError::with_provider(ErrorCategory::ParseError, "No choices in response", PROVIDER)
        })?;

        let calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                call_type: c.call_type.unwrap_or_else(|| "function".to_string()),
                function: FunctionCall {
                    name: c.function.name,
                    arguments: c.function.arguments,
                },
            })
            .collect();

        Ok(Message::assistant_with_calls(choice.message.content, calls))
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Convert the conversation, filling in call ids the API requires.
///
/// Calls without an id get `call_{i}`, and id-less tool results answer those
/// generated ids in order. Results with nothing to answer (calls salvaged from
/// text, or ids the API never issued) are sent back as user turns.
fn wire_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut pending: std::collections::VecDeque<String> = Default::default();
    let mut wire = Vec::with_capacity(messages.len());

    for msg in messages {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            pending.clear();
            calls
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let id = c.id.clone().unwrap_or_else(|| format!("call_{}", i));
                    pending.push_back(id.clone());
                    WireToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: WireFunction {
                            name: c.function.name.clone(),
                            arguments: c.arguments_string(),
                        },
                    }
                })
                .collect::<Vec<_>>()
        });

        let message = match (msg.role, &msg.tool_call_id) {
            (Role::Tool, Some(id)) => match pending.iter().position(|p| p == id) {
                Some(at) => {
                    pending.remove(at);
                    WireMessage {
                        role: Role::Tool,
                        content: msg.content.clone(),
                        tool_calls: None,
                        tool_call_id: Some(id.clone()),
                    }
                }
                None => tool_result_as_user(msg),
            },
            (Role::Tool, None) => match pending.pop_front() {
                Some(id) => WireMessage {
                    role: Role::Tool,
                    content: msg.content.clone(),
                    tool_calls: None,
                    tool_call_id: Some(id),
                },
                None => tool_result_as_user(msg),
            },
            _ => WireMessage {
                role: msg.role,
                content: msg.content.clone(),
                tool_calls,
                tool_call_id: None,
            },
        };
        wire.push(message);
    }
    wire
}

fn tool_result_as_user(msg: &Message) -> WireMessage {
    WireMessage {
        role: Role::User,
        content: Some(format!(
            "Tool result: {}",
            msg.content.as_deref().unwrap_or_default()
        )),
        tool_calls: None,
        tool_call_id: None,
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    #[serde(rename = "type")]
    call_type: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}
