//! Scripted client for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{LlmClient, ProviderKind};
use crate::ai::message::Message;
use crate::ai::tools::ToolDefinition;
use crate::types::{DocError, Result};

type Responder = dyn Fn(&[Message], &[ToolDefinition]) -> Result<Message> + Send + Sync;

pub struct ScriptedClient {
    responder: Box<Responder>,
    calls: AtomicUsize,
    /// Number of distinct conversations seen (a call whose history has no
    /// assistant message yet starts a new one)
    conversations: AtomicUsize,
    model: String,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[Message], &[ToolDefinition]) -> Result<Message> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            conversations: AtomicUsize::new(0),
            model: "mock-model".to_string(),
        }
    }

    /// Replay fixed replies in order; errors once exhausted
    pub fn from_replies(replies: Vec<Message>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::new(move |_, _| {
            queue
                .lock()
                .map_err(|_| DocError::Config("poisoned".into()))?
                .pop_front()
                .ok_or_else(|| DocError::Config("script exhausted".into()))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn conversations(&self) -> usize {
        self.conversations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !messages
            .iter()
            .any(|m| m.role == crate::ai::message::Role::Assistant)
        {
            self.conversations.fetch_add(1, Ordering::SeqCst);
        }
        (self.responder)(messages, tools)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Other
    }
}
