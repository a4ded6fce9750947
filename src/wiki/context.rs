//! Shared state handed to each phase

use serde_json::Value;
use std::sync::Arc;

use crate::ai::executor::AgentExecutor;
use crate::ai::provider::SharedClient;
use crate::ai::salvage::extract_json;
use crate::ai::tokenizer::TokenCounter;
use crate::ai::tools::{ScopedCatalog, SharedCatalog};
use crate::config::Config;
use crate::events::EventBus;
use crate::storage::PhaseCache;

pub struct PhaseContext {
    pub project_id: String,
    pub config: Arc<Config>,
    pub client: SharedClient,
    pub catalog: SharedCatalog,
    pub events: EventBus,
    pub cache: PhaseCache,
    pub tokens: TokenCounter,
}

impl PhaseContext {
    pub fn new(
        project_id: &str,
        config: Arc<Config>,
        client: SharedClient,
        catalog: SharedCatalog,
        events: EventBus,
    ) -> Self {
        let cache = PhaseCache::new(&config.output.cache_dir, project_id);
        let tokens = TokenCounter::for_model(client.kind(), client.model());
        Self {
            project_id: project_id.to_string(),
            config,
            client,
            catalog,
            events,
            cache,
            tokens,
        }
    }

    /// Executor wired to this run's client, events and request timeout
    pub fn executor(&self, label: impl Into<String>, catalog: ScopedCatalog) -> AgentExecutor {
        AgentExecutor::new(self.client.clone(), catalog)
            .with_events(self.events.clone())
            .with_timeout(self.config.llm.request_timeout())
            .with_label(label)
    }
}

/// Tool arguments written into a final text answer instead of a call: the
/// bare payload, or a `{name, arguments}` wrapper (arguments possibly a JSON
/// string)
pub fn submission_from_text(text: &str) -> Option<Value> {
    let value = extract_json(text)?;
    match value.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        Some(args) => Some(args.clone()),
        None => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submission_from_text() {
        assert_eq!(
            submission_from_text(r#"done: {"tree": []}"#),
            Some(json!({"tree": []}))
        );
        assert_eq!(
            submission_from_text(r#"{"name": "submit_page", "arguments": "{\"content\": \"x\"}"}"#),
            Some(json!({"content": "x"}))
        );
        assert_eq!(submission_from_text("plain prose"), None);
    }
}
