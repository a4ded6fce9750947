//! Conversation Messages
//!
//! Chat-style message model shared by the executor and every provider.
//! Tool call arguments are kept as raw JSON and normalized on use, since
//! services send them either as an encoded string or as an object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A request from the service to invoke a named tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Arguments as a JSON object.
    ///
    /// String arguments are decoded; empty or null arguments are `{}`.
    pub fn arguments(&self) -> std::result::Result<Value, String> {
        match &self.function.arguments {
            Value::Null => Ok(Value::Object(Map::new())),
            Value::Object(_) => Ok(self.function.arguments.clone()),
            Value::String(raw) if raw.trim().is_empty() => Ok(Value::Object(Map::new())),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => Ok(v),
                Ok(other) => Err(format!("arguments must be a JSON object, got {}", other)),
                Err(e) => Err(format!("invalid JSON arguments: {}", e)),
            },
            other => Err(format!("arguments must be a JSON object, got {}", other)),
        }
    }

    /// Arguments encoded as a JSON string (OpenAI wire format)
    pub fn arguments_string(&self) -> String {
        match &self.function.arguments {
            Value::String(raw) => raw.clone(),
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_content(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_content(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_content(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_content(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
            tool_call_id: None,
        }
    }

    /// Tool result message; `result` is serialized as JSON text
    pub fn tool_result(call_id: Option<String>, result: &Value) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.to_string()),
            tool_calls: None,
            tool_call_id: call_id,
        }
    }

    /// Non-empty text content, if any
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn structured_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Compact JSON view used in progress events
    pub fn summary(&self) -> Value {
        json!({
            "role": self.role,
            "content": self.content,
            "tool_calls": self.structured_calls().iter().map(|c| c.name()).collect::<Vec<_>>(),
        })
    }
}

/// Ordered message history sent verbatim on every turn
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    /// Replace the whole history with a fresh system+user pair
    pub fn reset(&mut self, system: impl Into<String>, user: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system));
        self.messages.push(Message::user(user));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_arguments_decoded() {
        let call = ToolCall::new("x", Value::String(r#"{"a": 1}"#.into()));
        assert_eq!(call.arguments().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_empty_arguments_default_to_object() {
        assert_eq!(ToolCall::new("x", Value::Null).arguments().unwrap(), json!({}));
        assert_eq!(
            ToolCall::new("x", Value::String("  ".into())).arguments().unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_invalid_arguments_are_an_error_not_a_panic() {
        let call = ToolCall::new("x", Value::String("{not json".into()));
        assert!(call.arguments().unwrap_err().contains("invalid JSON"));
        let call = ToolCall::new("x", json!([1, 2]));
        assert!(call.arguments().is_err());
    }

    #[test]
    fn test_wire_shape_deserializes() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "call_1", "type": "function",
                            "function": {"name": "submit_facts", "arguments": "{\"facts\":[]}"}}]
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.structured_calls().len(), 1);
        assert_eq!(msg.structured_calls()[0].id.as_deref(), Some("call_1"));
        assert_eq!(msg.structured_calls()[0].arguments_string(), "{\"facts\":[]}");
    }

    #[test]
    fn test_conversation_reset() {
        let mut conv = Conversation::new("sys", "first");
        conv.push(Message::assistant("hi"));
        conv.reset("sys2", "second");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content.as_deref(), Some("second"));
    }
}
