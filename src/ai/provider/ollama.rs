//! Ollama Local Client
//!
//! Uses the `/api/chat` endpoint, which accepts tool definitions in the same
//! function-spec shape as OpenAI but carries arguments as JSON objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{LlmClient, ProviderConfig, ProviderKind};
use crate::ai::message::{Message, Role, ToolCall};
use crate::ai::tools::ToolDefinition;
use crate::types::{DocError, ErrorCategory, ErrorClassifier, LlmError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1:latest";
const PROVIDER: &str = "ollama";

pub struct OllamaClient {
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Self::validate_endpoint(&api_base)?;

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
            api_base,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            client,
        })
    }

    /// Only http/https; warns for non-localhost endpoints
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            DocError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DocError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        Ok(url.to_string().trim_end_matches('/').to_string())
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(ToolDefinition::to_function_spec).collect(),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        let start = Instant::now();
        let request = self.build_request(messages, tools);
        let url = format!("{}/api/chat", self.api_base);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::with_provider(
                        ErrorCategory::Network,
                        format!(
                            "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                            self.api_base
                        ),
                        PROVIDER,
                    )
                } else {
                    ErrorClassifier::classify(&format!("Ollama request failed: {}", e), PROVIDER)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Ollama API error ({}): {}", status, body),
                PROVIDER,
            )
            .into());
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::ParseError,
                format!("Failed to parse Ollama response: {}", e),
                PROVIDER,
            )
        })?;

        debug!("Ollama response in {:?}", start.elapsed());

        let calls = body
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall::new(c.function.name, c.function.arguments))
            .collect();
        let content = Some(body.message.content).filter(|c| !c.is_empty());

        Ok(Message::assistant_with_calls(content, calls))
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls = msg
            .structured_calls()
            .iter()
            .map(|c| {
                json!({
                    "function": {
                        "name": c.name(),
                        "arguments": c.arguments().unwrap_or_else(|_| json!({})),
                    }
                })
            })
            .collect();
        Self {
            role: msg.role,
            content: msg.content.clone().unwrap_or_default(),
            tool_calls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_base: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: ProviderKind::Ollama,
            model: None,
            timeout_secs: 10,
            temperature: 0.0,
            api_key: None,
            api_base: api_base.map(str::to_string),
            max_tokens: 512,
        }
    }

    #[test]
    fn test_default_config() {
        let client = OllamaClient::new(config(None)).unwrap();
        assert_eq!(client.api_base, DEFAULT_API_BASE);
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.kind(), ProviderKind::Ollama);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(OllamaClient::new(config(Some("file:///etc/passwd"))).is_err());
    }

    #[test]
    fn test_wire_message_decodes_string_arguments() {
        let msg = Message::assistant_with_calls(
            None,
            vec![ToolCall::new("t", Value::String("{\"k\":\"v\"}".into()))],
        );
        let wire = serde_json::to_value(WireMessage::from(&msg)).unwrap();
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"]["k"], "v");
        assert_eq!(wire["content"], "");
    }
}
