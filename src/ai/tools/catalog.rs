//! Tool Catalog
//!
//! An explicitly constructed set of callable tools. Phases share one catalog
//! behind an `Arc` and expose a named subset per conversation via
//! [`ToolCatalog::scoped`].

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::types::{DocError, Result};

/// Declared capability as advertised to the reasoning service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// `{type: function, function: {...}}` entry used by chat-completion APIs
    pub fn to_function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

pub type SyncToolFn = dyn Fn(Value) -> Result<Value> + Send + Sync;
pub type AsyncToolFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// Tool implementation, awaited uniformly whichever kind it is
#[derive(Clone)]
pub enum ToolHandler {
    Sync(Arc<SyncToolFn>),
    Async(Arc<AsyncToolFn>),
}

impl ToolHandler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| f(args).boxed()))
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "ToolHandler::Sync"),
            Self::Async(_) => write!(f, "ToolHandler::Async"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
}

impl Tool {
    pub fn new(definition: ToolDefinition, handler: ToolHandler) -> Self {
        Self {
            definition,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run the implementation. Panics are caught and reported as tool errors.
    pub async fn invoke(&self, args: Value) -> Result<Value> {
        let name = self.name().to_string();
        match &self.handler {
            ToolHandler::Sync(f) => {
                let f = Arc::clone(f);
                std::panic::catch_unwind(AssertUnwindSafe(move || f(args)))
                    .unwrap_or_else(|panic| Err(DocError::tool(name, panic_message(&*panic))))
            }
            ToolHandler::Async(f) => {
                let fut = f(args);
                AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(DocError::tool(name, panic_message(&*panic))))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
}

pub type SharedCatalog = Arc<ToolCatalog>;

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique within the catalog
    pub fn register(&mut self, definition: ToolDefinition, handler: ToolHandler) -> Result<()> {
        if self.resolve(&definition.name).is_some() {
            return Err(DocError::DuplicateTool(definition.name));
        }
        self.tools.push(Tool::new(definition, handler));
        Ok(())
    }

    /// Definitions in registration order, optionally restricted to `names`
    pub fn definitions_for(&self, names: Option<&[String]>) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| names.is_none_or(|n| n.iter().any(|x| x == t.name())))
            .map(|t| t.definition.clone())
            .collect()
    }

    pub fn resolve(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Named subset view over a shared catalog
    pub fn scoped(self: &Arc<Self>, names: &[&str]) -> ScopedCatalog {
        ScopedCatalog {
            catalog: Arc::clone(self),
            names: Some(names.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// View exposing every tool
    pub fn full(self: &Arc<Self>) -> ScopedCatalog {
        ScopedCatalog {
            catalog: Arc::clone(self),
            names: None,
        }
    }
}

/// A per-call view of a catalog restricted to a set of tool names
#[derive(Debug, Clone)]
pub struct ScopedCatalog {
    catalog: SharedCatalog,
    names: Option<Vec<String>>,
}

impl ScopedCatalog {
    pub fn empty() -> Self {
        Self {
            catalog: Arc::new(ToolCatalog::new()),
            names: None,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog.definitions_for(self.names.as_deref())
    }

    /// Resolve only names inside the scope
    pub fn resolve(&self, name: &str) -> Option<&Tool> {
        let in_scope = self
            .names
            .as_ref()
            .is_none_or(|n| n.iter().any(|x| x == name));
        if in_scope {
            self.catalog.resolve(name)
        } else {
            None
        }
    }
}
