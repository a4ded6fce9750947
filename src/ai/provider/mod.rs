//! Reasoning Service Clients
//!
//! Defines the `LlmClient` trait: one call takes the whole conversation plus
//! the advertised tool definitions and returns one assistant message. The
//! service is treated as opaque and may ignore the tool protocol entirely.

mod ollama;
mod openai;

#[cfg(test)]
pub mod mock;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::message::Message;
use super::tools::ToolDefinition;
use crate::config::LlmConfig;
use crate::types::{DocError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Ollama,
    /// Any other client, counted and priced generically
    Other,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(DocError::Config(format!(
                "Unknown provider: {}. Supported: openai, ollama",
                s
            ))),
        }
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Connection settings for one client.
///
/// The API key is never serialized and is redacted in debug output; clients
/// move it into a `SecretString` on construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            provider: config.provider.parse()?,
            model: Some(config.model.clone()).filter(|m| !m.is_empty()),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

// =============================================================================
// LLM Client Trait
// =============================================================================

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and available tools, get one assistant message
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Provider family, used for token counting and pricing
    fn kind(&self) -> ProviderKind;
}

pub type SharedClient = Arc<dyn LlmClient>;

/// Create a shared client from configuration
pub fn create_client(config: &ProviderConfig) -> Result<SharedClient> {
    match config.provider {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiClient::new(config.clone())?)),
        ProviderKind::Ollama => Ok(Arc::new(OllamaClient::new(config.clone())?)),
        ProviderKind::Other => Err(DocError::Config(
            "No built-in client for provider 'other'".to_string(),
        )),
    }
}
