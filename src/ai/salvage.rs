//! Tool Call Salvage
//!
//! Recovers tool calls from replies that put them in free text instead of the
//! structured `tool_calls` field. Every step is a pure function over the reply;
//! the first step that yields a call wins:
//!
//! | step          | input                          | accepts                      |
//! |---------------|--------------------------------|------------------------------|
//! | structured    | `message.tool_calls`           | any non-empty list           |
//! | fenced block  | first ```` ``` ```` block body | JSON with a `name` key       |
//! | balanced scan | first parseable `{..}`/`[..]`  | JSON with a `name` key       |
//! | give up       |                                | no calls                     |

use serde_json::{Map, Value};

use super::message::{Message, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalvageSource {
    Structured,
    FencedBlock,
    BalancedScan,
    None,
}

#[derive(Debug, Clone)]
pub struct Detected {
    pub calls: Vec<ToolCall>,
    pub source: SalvageSource,
}

/// Detect tool calls in an assistant reply, structured first, then salvaged
pub fn detect_tool_calls(message: &Message) -> Detected {
    let structured = message.structured_calls();
    if !structured.is_empty() {
        return Detected {
            calls: structured.to_vec(),
            source: SalvageSource::Structured,
        };
    }

    match message.text() {
        Some(text) => salvage_from_text(text),
        None => Detected {
            calls: Vec::new(),
            source: SalvageSource::None,
        },
    }
}

/// Run the text-only steps of the decision table
pub fn salvage_from_text(text: &str) -> Detected {
    if let Some(value) = fenced_block(text).and_then(|body| parse_json(body.trim())) {
        let calls = calls_from_value(&value);
        if !calls.is_empty() {
            return Detected {
                calls,
                source: SalvageSource::FencedBlock,
            };
        }
    }

    if let Some(value) = first_balanced_json(text) {
        let calls = calls_from_value(&value);
        if !calls.is_empty() {
            return Detected {
                calls,
                source: SalvageSource::BalancedScan,
            };
        }
    }

    Detected {
        calls: Vec::new(),
        source: SalvageSource::None,
    }
}

/// First JSON value found in free text (fenced block, then balanced scan)
pub fn extract_json(text: &str) -> Option<Value> {
    fenced_block(text)
        .and_then(|body| parse_json(body.trim()))
        .or_else(|| first_balanced_json(text))
}

// =============================================================================
// Steps
// =============================================================================

/// Body of the first fenced code block, language tag removed
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Language tag runs to the end of the opening line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Try each `{` / `[` start in order and return the first balanced span that parses
fn first_balanced_json(text: &str) -> Option<Value> {
    for (start, ch) in text.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        if let Some(end) = balanced_end(&text[start..])
            && let Some(value) = parse_json(&text[start..start + end])
        {
            return Some(value);
        }
    }
    None
}

/// Byte length of the balanced span starting at `s[0]`, tracking strings and escapes
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json(s: &str) -> Option<Value> {
    serde_json::from_str(s).ok()
}

// =============================================================================
// Value → ToolCall
// =============================================================================

/// Accept a mapping with a `name` key, a wire-shaped `{function: {...}}` entry,
/// a `{tool_calls: [...]}` wrapper, or an array of any of those
fn calls_from_value(value: &Value) -> Vec<ToolCall> {
    match value {
        Value::Array(items) => items.iter().filter_map(call_from_object).collect(),
        Value::Object(obj) => {
            if let Some(Value::Array(items)) = obj.get("tool_calls") {
                return items.iter().filter_map(call_from_object).collect();
            }
            call_from_object(value).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn call_from_object(value: &Value) -> Option<ToolCall> {
    let obj = value.as_object()?;
    let (target, id) = match obj.get("function") {
        Some(Value::Object(f)) if f.contains_key("name") => (f, obj.get("id")),
        _ => (obj, None),
    };

    let name = target.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let arguments = target
        .get("arguments")
        .or_else(|| target.get("parameters"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let call = ToolCall::new(name, arguments);
    Some(match id.and_then(Value::as_str) {
        Some(id) => call.with_id(id),
        None => call,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_with_prefix_and_suffix() {
        let text = "prefix ```json\n{\"name\":\"x\",\"arguments\":{\"a\":1}}\n``` suffix";
        let detected = salvage_from_text(text);
        assert_eq!(detected.source, SalvageSource::FencedBlock);
        assert_eq!(detected.calls.len(), 1);
        assert_eq!(detected.calls[0].call_type, "function");
        assert_eq!(detected.calls[0].function.name, "x");
        assert_eq!(detected.calls[0].function.arguments, json!({"a": 1}));
    }

    #[test]
    fn test_balanced_scan_skips_non_json_brackets() {
        let text = r#"I checked [the file] and will call {"name": "submit", "arguments": {"s": "a } b"}} now"#;
        let detected = salvage_from_text(text);
        assert_eq!(detected.source, SalvageSource::BalancedScan);
        assert_eq!(detected.calls[0].name(), "submit");
        assert_eq!(detected.calls[0].function.arguments["s"], "a } b");
    }

    #[test]
    fn test_missing_arguments_default_to_empty_object() {
        let detected = salvage_from_text(r#"{"name": "list_files"}"#);
        assert_eq!(detected.calls[0].function.arguments, json!({}));
    }

    #[test]
    fn test_array_and_wire_shapes() {
        let text = r#"[{"name": "a"}, {"id": "c1", "type": "function", "function": {"name": "b", "arguments": "{}"}}]"#;
        let detected = salvage_from_text(text);
        let names: Vec<&str> = detected.calls.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(detected.calls[1].id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_plain_text_gives_up() {
        let detected = salvage_from_text("All done, the module handles auth.");
        assert!(detected.calls.is_empty());
        assert_eq!(detected.source, SalvageSource::None);

        let detected = salvage_from_text(r#"{"answer": 42}"#);
        assert!(detected.calls.is_empty());
    }

    #[test]
    fn test_structured_calls_take_precedence() {
        let msg = Message::assistant_with_calls(
            Some(r#"{"name": "ignored"}"#.into()),
            vec![ToolCall::new("real", json!({}))],
        );
        let detected = detect_tool_calls(&msg);
        assert_eq!(detected.source, SalvageSource::Structured);
        assert_eq!(detected.calls[0].name(), "real");
    }

    #[test]
    fn test_extract_json_from_final_text() {
        let value = extract_json("Result:\n```\n{\"file\": \"a.py\", \"facts\": []}\n```").unwrap();
        assert_eq!(value["file"], "a.py");
        assert!(extract_json("nothing here").is_none());
    }
}
