use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Module name used for files at the repository root
pub const ROOT_MODULE: &str = "root";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    #[serde(alias = "high", alias = "High")]
    High,
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "low", alias = "Low")]
    Low,
}

impl Impact {
    /// Lenient parse; unrecognized values become `Medium`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" | "CRITICAL" => Self::High,
            "LOW" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// A single atomic observation about one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fact {
    pub topic: String,
    pub impact: Impact,
    pub statement: String,
}

impl Fact {
    pub fn new(topic: impl Into<String>, impact: Impact, statement: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            impact,
            statement: statement.into(),
        }
    }

    /// Build a fact from loosely shaped tool arguments.
    ///
    /// Requires a non-empty `statement`; `topic` falls back to "general".
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let statement = obj
            .get("statement")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let topic = obj
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("general");
        let impact = obj
            .get("impact")
            .and_then(Value::as_str)
            .map(Impact::parse_lenient)
            .unwrap_or(Impact::Medium);

        Some(Self::new(topic, impact, statement))
    }

    /// Normalize a submission payload into a fact list.
    ///
    /// Accepts `{facts: [...]}`, a bare array, or a single flattened fact
    /// `{topic, impact, statement}` which becomes a one-element list.
    pub fn list_from_submission(args: &Value) -> Vec<Fact> {
        if let Some(items) = args.get("facts").and_then(Value::as_array) {
            return items.iter().filter_map(Fact::from_value).collect();
        }
        if let Some(items) = args.as_array() {
            return items.iter().filter_map(Fact::from_value).collect();
        }
        Fact::from_value(args).into_iter().collect()
    }
}

/// All facts extracted from one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFactSet {
    pub file_path: String,
    pub facts: Vec<Fact>,
}

impl FileFactSet {
    pub fn new(file_path: impl Into<String>, facts: Vec<Fact>) -> Self {
        Self {
            file_path: file_path.into(),
            facts,
        }
    }

    /// Parent directory of the file, or `root` for top-level files
    pub fn module(&self) -> String {
        module_of(&self.file_path)
    }
}

pub fn module_of(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    match normalized.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_string(),
        _ => ROOT_MODULE.to_string(),
    }
}

/// Aggregated Miner phase output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MinerOutput {
    pub results: Vec<FileFactSet>,
}

impl MinerOutput {
    pub fn total_facts(&self) -> usize {
        self.results.iter().map(|r| r.facts.len()).sum()
    }

    /// Sort by path so the persisted artifact does not depend on completion order
    pub fn sort(&mut self) {
        self.results.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    }

    /// Group file fact sets by module, in module name order
    pub fn by_module(&self) -> BTreeMap<String, Vec<&FileFactSet>> {
        let mut groups: BTreeMap<String, Vec<&FileFactSet>> = BTreeMap::new();
        for set in &self.results {
            groups.entry(set.module()).or_default().push(set);
        }
        groups
    }
}
