use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Category,
    #[default]
    Page,
}

/// One entry in the documentation hierarchy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavigationNode>,
}

impl NavigationNode {
    pub fn page(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Page,
            children: Vec::new(),
        }
    }

    pub fn category(
        id: impl Into<String>,
        label: impl Into<String>,
        children: Vec<NavigationNode>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Category,
            children,
        }
    }

    pub fn is_page(&self) -> bool {
        self.kind == NodeKind::Page
    }
}

/// Navigation tree as persisted in `navigation.json` and exported as the sidebar
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationTree {
    pub tree: Vec<NavigationNode>,
}

impl NavigationTree {
    pub fn new(tree: Vec<NavigationNode>) -> Self {
        Self { tree }
    }

    /// Page nodes in depth-first traversal order
    pub fn pages(&self) -> Vec<&NavigationNode> {
        fn walk<'a>(nodes: &'a [NavigationNode], out: &mut Vec<&'a NavigationNode>) {
            for node in nodes {
                if node.is_page() {
                    out.push(node);
                }
                walk(&node.children, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.tree, &mut out);
        out
    }

    /// Parse loosely shaped `submit_navigation` arguments.
    ///
    /// Accepts `{tree: [...]}` or a bare node array. Ids are slugified from the
    /// given id (or the label) and made unique; a node with children is always a
    /// category. Returns `None` when the result contains no pages.
    pub fn from_submission(args: &Value) -> Option<Self> {
        let items = args
            .get("tree")
            .and_then(Value::as_array)
            .or_else(|| args.as_array())?;

        let mut seen = HashSet::new();
        let tree: Vec<NavigationNode> = items
            .iter()
            .filter_map(|item| parse_node(item, &mut seen))
            .collect();

        let nav = Self::new(tree);
        if nav.pages().is_empty() { None } else { Some(nav) }
    }
}

fn parse_node(value: &Value, seen: &mut HashSet<String>) -> Option<NavigationNode> {
    let obj = value.as_object()?;
    let label = obj
        .get("label")
        .or_else(|| obj.get("title"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let raw_id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(label);

    // Labels with no usable characters still get a reachable page
    let mut base = slugify(raw_id);
    if base.is_empty() {
        base = format!("page-{}", seen.len() + 1);
    }
    let id = unique_id(&base, seen);
    let label = if label.is_empty() { id.clone() } else { label.to_string() };

    let children: Vec<NavigationNode> = obj
        .get("children")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|c| parse_node(c, seen)).collect())
        .unwrap_or_default();

    let declared_category = obj
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("category"));

    let kind = if !children.is_empty() || declared_category {
        NodeKind::Category
    } else {
        NodeKind::Page
    };

    Some(NavigationNode {
        id,
        label,
        kind,
        children,
    })
}

fn unique_id(base: &str, seen: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while !seen.insert(candidate.clone()) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    candidate
}

/// Lowercase alphanumerics (any script) joined by single dashes
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}
