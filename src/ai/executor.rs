//! Agent Executor
//!
//! Drives one conversation with the reasoning service: send the history and
//! tool definitions, append the reply, run any tool calls it contains (salvaged
//! from text when the service skipped the structured field), append one tool
//! message per call, and repeat until a plain-text answer or the iteration cap.
//!
//! Tool failures never escape the loop; they come back to the service as
//! `{"error": ...}` results. Only service errors (network, rate limit,
//! timeout) are returned to the caller.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::message::{Conversation, Message, ToolCall};
use super::provider::SharedClient;
use super::salvage::detect_tool_calls;
use super::timeout::with_timeout;
use super::tools::{ScopedCatalog, Tool, ToolDefinition};
use crate::constants::agent::MAX_ITERATIONS_SENTINEL;
use crate::constants::network::DEFAULT_TIMEOUT_SECS;
use crate::events::{EventBus, ThoughtKind};
use crate::types::Result;

/// How a bounded run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reply with text and no tool calls
    Completed(String),
    /// The caller's stop predicate fired after a step
    Stopped,
    /// Cap reached without either of the above
    MaxIterations,
}

impl RunOutcome {
    /// Final text, or the sentinel when the loop did not complete
    pub fn into_text(self) -> String {
        match self {
            Self::Completed(text) => text,
            Self::Stopped | Self::MaxIterations => MAX_ITERATIONS_SENTINEL.to_string(),
        }
    }
}

pub struct AgentExecutor {
    client: SharedClient,
    /// Registered on this executor; resolved before the catalog
    local_tools: Vec<Tool>,
    catalog: ScopedCatalog,
    events: Option<EventBus>,
    request_timeout: Duration,
    label: String,
}

impl AgentExecutor {
    pub fn new(client: SharedClient, catalog: ScopedCatalog) -> Self {
        Self {
            client,
            local_tools: Vec::new(),
            catalog,
            events: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            label: "agent".to_string(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Name attached to emitted events (e.g. `miner:src/app.py`)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Register a tool on this executor only; it shadows a catalog tool of
    /// the same name
    pub fn register(&mut self, tool: Tool) {
        self.local_tools.retain(|t| t.name() != tool.name());
        self.local_tools.push(tool);
    }

    /// Local definitions first, then catalog definitions not shadowed locally
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .local_tools
            .iter()
            .map(|t| t.definition.clone())
            .collect();
        defs.extend(
            self.catalog
                .definitions()
                .into_iter()
                .filter(|d| !self.local_tools.iter().any(|t| t.name() == d.name)),
        );
        defs
    }

    fn resolve(&self, name: &str) -> Option<&Tool> {
        self.local_tools
            .iter()
            .find(|t| t.name() == name)
            .or_else(|| self.catalog.resolve(name))
    }

    fn emit(&self, subtype: ThoughtKind, data: Value) {
        if let Some(events) = &self.events {
            events.thought(subtype, data);
        }
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// One round-trip. Appends the reply, then one tool message per detected
    /// call, and returns the reply.
    pub async fn run_step(&self, conversation: &mut Conversation) -> Result<Message> {
        let definitions = self.definitions();
        self.emit(
            ThoughtKind::LlmRequest,
            json!({
                "agent": self.label,
                "messages": conversation.len(),
                "tools": definitions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            }),
        );

        let reply = with_timeout(
            self.request_timeout,
            self.client.complete(conversation.messages(), &definitions),
            "LLM request",
        )
        .await?;

        conversation.push(reply.clone());
        self.emit(
            ThoughtKind::LlmResponse,
            json!({"agent": self.label, "message": reply.summary()}),
        );

        let detected = detect_tool_calls(&reply);
        if detected.calls.is_empty() {
            return Ok(reply);
        }

        debug!(
            "{}: {} tool call(s) via {:?}",
            self.label,
            detected.calls.len(),
            detected.source
        );
        self.emit(
            ThoughtKind::ToolCalls,
            json!({
                "agent": self.label,
                "source": format!("{:?}", detected.source),
                "calls": detected.calls.iter().map(|c| c.name()).collect::<Vec<_>>(),
            }),
        );

        for call in &detected.calls {
            let result = self.execute(call).await;
            self.emit(
                ThoughtKind::ToolResult,
                json!({"agent": self.label, "tool": call.name(), "result": result}),
            );
            conversation.push(Message::tool_result(call.id.clone(), &result));
        }

        Ok(reply)
    }

    /// Run until a final text answer; the sentinel when the cap is reached.
    /// With `max_iterations == 0` the service is never called.
    pub async fn run_until_complete(
        &self,
        conversation: &mut Conversation,
        max_iterations: usize,
    ) -> Result<String> {
        self.run_until(conversation, max_iterations, || false)
            .await
            .map(RunOutcome::into_text)
    }

    /// Like [`run_until_complete`](Self::run_until_complete), additionally
    /// stopping as soon as `stop` returns true after a step
    pub async fn run_until<F>(
        &self,
        conversation: &mut Conversation,
        max_iterations: usize,
        stop: F,
    ) -> Result<RunOutcome>
    where
        F: Fn() -> bool,
    {
        for iteration in 0..max_iterations {
            let reply = self.run_step(conversation).await?;

            if stop() {
                return Ok(RunOutcome::Stopped);
            }

            if detect_tool_calls(&reply).calls.is_empty()
                && let Some(text) = reply.text()
            {
                debug!("{}: completed after {} step(s)", self.label, iteration + 1);
                return Ok(RunOutcome::Completed(text.to_string()));
            }
        }

        if max_iterations > 0 {
            warn!("{}: reached {} iterations", self.label, max_iterations);
        }
        Ok(RunOutcome::MaxIterations)
    }

    /// Never fails: unknown tools, bad arguments, and tool errors become
    /// `{"error": ...}` results
    async fn execute(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.resolve(call.name()) else {
            warn!("{}: unknown tool '{}'", self.label, call.name());
            return json!({"error": format!("tool {} not found", call.name())});
        };

        let args = match call.arguments() {
            Ok(args) => args,
            Err(msg) => return json!({"error": msg}),
        };

        match tool.invoke(args).await {
            Ok(value) => value,
            Err(e) => {
                warn!("{}: tool '{}' failed: {}", self.label, call.name(), e);
                json!({"error": e.to_string()})
            }
        }
    }
}
