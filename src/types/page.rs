use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Written documentation for one navigation page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageContent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    #[serde(default)]
    pub related_files: Vec<String>,
    /// Stored for a page with no matching facts instead of written content
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl PageContent {
    /// Build a page from `submit_page` arguments.
    ///
    /// The id is always `page_id`, whatever the service returned; a missing
    /// title falls back to `fallback_title`. Returns `None` without a body.
    pub fn from_submission(page_id: &str, fallback_title: &str, args: &Value) -> Option<Self> {
        let text = |key: &str| {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let body = text("body").or_else(|| text("content"))?;
        let related_files = args
            .get("related_files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id: page_id.to_string(),
            title: text("title").unwrap_or_else(|| fallback_title.to_string()),
            description: text("description").unwrap_or_default(),
            body,
            diagram: text("diagram"),
            related_files,
            placeholder: false,
        })
    }

    /// Explicit page for a navigation entry with no matching facts
    pub fn no_facts_placeholder(page_id: &str, title: &str) -> Self {
        Self {
            id: page_id.to_string(),
            title: title.to_string(),
            description: "No source facts matched this page.".to_string(),
            body: format!(
                "# {}\n\nNo extracted facts could be matched to this topic, so no content was generated.",
                title
            ),
            diagram: None,
            related_files: Vec::new(),
            placeholder: true,
        }
    }
}
