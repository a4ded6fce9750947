//! Progress Events
//!
//! Pipeline and agent events go out on a broadcast channel. Emission never
//! blocks: with no subscriber the event is dropped, and a slow subscriber
//! loses the oldest events rather than stalling the pipeline.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::constants::agent::EVENT_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Started,
    Mining,
    Planning,
    Writing,
    Completed,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Mining => write!(f, "mining"),
            Self::Planning => write!(f, "planning"),
            Self::Writing => write!(f, "writing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    LlmRequest,
    LlmResponse,
    ToolCalls,
    ToolResult,
}

/// Wire shape: `{type, stage|subtype, message|data}`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageChange {
        stage: Stage,
        message: String,
    },
    Progress {
        stage: Stage,
        message: String,
        current: usize,
        total: usize,
    },
    AgentThought {
        subtype: ThoughtKind,
        data: Value,
    },
    /// Navigation tree produced (or loaded) by the planning stage
    Navigation {
        stage: Stage,
        data: Value,
    },
    Error {
        stage: Stage,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send without waiting; dropped when nobody listens
    #[inline]
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn stage(&self, stage: Stage, message: impl Into<String>) {
        self.emit(PipelineEvent::StageChange {
            stage,
            message: message.into(),
        });
    }

    pub fn progress(&self, stage: Stage, current: usize, total: usize, message: impl Into<String>) {
        self.emit(PipelineEvent::Progress {
            stage,
            message: message.into(),
            current,
            total,
        });
    }

    pub fn thought(&self, subtype: ThoughtKind, data: Value) {
        self.emit(PipelineEvent::AgentThought { subtype, data });
    }

    pub fn error(&self, stage: Stage, message: impl Into<String>) {
        self.emit(PipelineEvent::Error {
            stage,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new();
        bus.stage(Stage::Mining, "start");
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.progress(Stage::Mining, 1, 3, "a.py");
        match rx.recv().await.unwrap() {
            PipelineEvent::Progress { current, total, .. } => {
                assert_eq!((current, total), (1, 3));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_wire_shape() {
        let ev = PipelineEvent::StageChange {
            stage: Stage::Planning,
            message: "planning".into(),
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"type": "stage_change", "stage": "planning", "message": "planning"})
        );

        let ev = PipelineEvent::AgentThought {
            subtype: ThoughtKind::ToolResult,
            data: json!({"ok": true}),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "agent_thought");
        assert_eq!(v["subtype"], "tool_result");
    }
}
