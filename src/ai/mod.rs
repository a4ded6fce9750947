//! AI Integration Layer
//!
//! Reasoning-service clients, the tool-calling executor and the accounting
//! around it (token counting, pricing, admission and concurrency).

pub mod executor;
pub mod gate;
pub mod message;
pub mod pricing;
pub mod provider;
pub mod salvage;
pub mod timeout;
pub mod tokenizer;
pub mod tools;

pub use executor::{AgentExecutor, RunOutcome};
pub use gate::{ConcurrencyGate, RetryPolicy};
pub use message::{Conversation, FunctionCall, Message, Role, ToolCall};
pub use pricing::{CostEstimate, ModelRate, PricingTable, estimate_cost};
pub use provider::{
    LlmClient, OllamaClient, OpenAiClient, ProviderConfig, ProviderKind, SharedClient,
    create_client,
};
pub use salvage::{Detected, SalvageSource, detect_tool_calls, extract_json, salvage_from_text};
pub use timeout::with_timeout;
pub use tokenizer::{TRUNCATION_MARKER, TokenCounter};
pub use tools::{
    ParamType, SchemaBuilder, ScopedCatalog, SharedCatalog, Tool, ToolCatalog, ToolDefinition,
    ToolHandler,
};
