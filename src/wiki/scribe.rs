//! Scribe Phase
//!
//! Writes one page per navigation leaf, in traversal order. Each page is
//! persisted as soon as it is written, so a rerun only writes what is missing.

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use super::context::{PhaseContext, submission_from_text};
use super::modules::{ModuleMatch, PageKind, resolve_modules};
use super::prompts::{self, SUBMIT_PAGE};
use crate::ai::executor::RunOutcome;
use crate::ai::gate::retry_rate_limited;
use crate::ai::message::Conversation;
use crate::ai::tools::{ParamType, SchemaBuilder, Tool, ToolDefinition, ToolHandler};
use crate::events::Stage;
use crate::types::{DocError, MinerOutput, NavigationNode, NavigationTree, PageContent, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Written,
    Cached,
    /// No module matched; a placeholder was stored instead of calling out
    NoFacts,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub id: String,
    pub title: String,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    fn new(node: &NavigationNode, status: PageStatus) -> Self {
        Self {
            id: node.id.clone(),
            title: node.label.clone(),
            status,
            error: None,
        }
    }
}

type Submission = Arc<Mutex<Option<PageContent>>>;

pub struct ScribePhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> ScribePhase<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip_all, fields(project = %self.ctx.project_id))]
    pub async fn run(&self, miner: &MinerOutput, tree: &NavigationTree) -> Vec<PageResult> {
        let pages = tree.pages();
        let total = pages.len();
        let modules: Vec<String> = miner.by_module().into_keys().collect();
        self.ctx
            .events
            .stage(Stage::Writing, format!("Writing {} pages", total));

        let mut results = Vec::with_capacity(total);
        for (i, node) in pages.into_iter().enumerate() {
            let result = self.page(miner, &modules, node).await;
            let note = match result.status {
                PageStatus::Written => format!("Wrote {}", node.label),
                PageStatus::Cached => format!("Cached {}", node.label),
                PageStatus::NoFacts => format!("No facts for {}", node.label),
                PageStatus::Failed => format!("Failed {}", node.label),
            };
            self.ctx.events.progress(Stage::Writing, i + 1, total, note);
            results.push(result);
        }

        let written = results
            .iter()
            .filter(|r| r.status == PageStatus::Written)
            .count();
        info!("Scribe finished: {} of {} pages written this run", written, total);
        results
    }

    async fn page(&self, miner: &MinerOutput, modules: &[String], node: &NavigationNode) -> PageResult {
        if let Ok(Some(cached)) = self.ctx.cache.load_page(&node.id).await {
            debug!("Page '{}' cached", node.id);
            let status = if cached.placeholder {
                PageStatus::NoFacts
            } else {
                PageStatus::Cached
            };
            return PageResult::new(node, status);
        }

        let outcome = match resolve_modules(&node.id, &node.label, modules) {
            ModuleMatch::NoMatch => {
                info!("No modules match page '{}', storing placeholder", node.id);
                let placeholder = PageContent::no_facts_placeholder(&node.id, &node.label);
                self.ctx
                    .cache
                    .save_page(&placeholder)
                    .await
                    .map(|_| PageStatus::NoFacts)
            }
            matched => self.write(miner, node, &matched).await,
        };

        match outcome {
            Ok(status) => PageResult::new(node, status),
            Err(e) => {
                warn!("Scribe failed on page '{}': {}", node.id, e);
                PageResult {
                    error: Some(e.to_string()),
                    ..PageResult::new(node, PageStatus::Failed)
                }
            }
        }
    }

    async fn write(
        &self,
        miner: &MinerOutput,
        node: &NavigationNode,
        matched: &ModuleMatch,
    ) -> Result<PageStatus> {
        let system = match PageKind::detect(&node.id, &node.label) {
            PageKind::ArchitectureOverview => prompts::SCRIBE_ARCHITECTURE_SYSTEM,
            PageKind::ModuleReference => prompts::SCRIBE_REFERENCE_SYSTEM,
        };
        let facts = self.ctx.tokens.truncate(
            &render_facts(miner, matched.modules()),
            self.ctx.config.pipeline.scribe_max_input_tokens,
        );

        let label = format!("scribe:{}", node.id);
        let policy = self.ctx.config.pipeline.retry_policy();
        let page = retry_rate_limited(&policy, &label, || {
            self.converse(&label, system, &facts, node)
        })
        .await?;

        self.ctx.cache.save_page(&page).await?;
        Ok(PageStatus::Written)
    }

    /// One fresh conversation for the page
    async fn converse(
        &self,
        label: &str,
        system: &str,
        facts: &str,
        node: &NavigationNode,
    ) -> Result<PageContent> {
        let submission: Submission = Arc::default();
        let mut executor = self.ctx.executor(label, self.ctx.catalog.full());
        executor.register(submit_page_tool(submission.clone(), &node.id, &node.label));

        let mut conversation = Conversation::new(system, prompts::scribe_user(&node.label, facts));
        let outcome = executor
            .run_until(
                &mut conversation,
                self.ctx.config.pipeline.scribe_max_iterations,
                || submission.lock().map(|s| s.is_some()).unwrap_or(false),
            )
            .await?;

        let page = match submission.lock().ok().and_then(|mut s| s.take()) {
            Some(page) => Some(page),
            None => match outcome {
                RunOutcome::Completed(text) => submission_from_text(&text)
                    .and_then(|v| PageContent::from_submission(&node.id, &node.label, &v)),
                _ => None,
            },
        };
        page.ok_or_else(|| DocError::phase("scribe", "no page content was submitted"))
    }
}

/// Facts of the given modules, grouped by module then file
pub fn render_facts(miner: &MinerOutput, modules: &[String]) -> String {
    let grouped = miner.by_module();
    let mut out = String::new();
    for module in modules {
        let Some(files) = grouped.get(module) else {
            continue;
        };
        let _ = writeln!(out, "=== MODULE: {} ===", module);
        for file in files {
            let _ = writeln!(out, "\nFILE: {}", file.file_path);
            for fact in &file.facts {
                let _ = writeln!(
                    out,
                    "- [{}|{}] {}",
                    fact.topic,
                    fact.impact.as_str(),
                    fact.statement
                );
            }
        }
        out.push('\n');
    }
    out
}

pub fn submit_page_definition() -> ToolDefinition {
    ToolDefinition::new(
        SUBMIT_PAGE,
        "Submit the finished documentation page.",
        SchemaBuilder::object()
            .optional("id", ParamType::String, "Page id")
            .required("title", ParamType::String, "Page title")
            .optional("description", ParamType::String, "One-line summary")
            .required("content", ParamType::String, "Markdown body")
            .optional("diagram", ParamType::String, "Mermaid diagram source")
            .optional(
                "related_files",
                ParamType::Array(json!({"type": "string"})),
                "Source files the page draws on",
            )
            .build(),
    )
}

/// The page id is forced to the navigation id whatever the service sends
fn submit_page_tool(submission: Submission, page_id: &str, title: &str) -> Tool {
    let page_id = page_id.to_string();
    let title = title.to_string();
    Tool::new(
        submit_page_definition(),
        ToolHandler::sync(move |args: Value| {
            let mut slot = submission
                .lock()
                .map_err(|_| DocError::tool(SUBMIT_PAGE, "submission state poisoned"))?;
            if slot.is_some() {
                return Err(DocError::tool(SUBMIT_PAGE, "page was already submitted"));
            }
            let page = PageContent::from_submission(&page_id, &title, &args)
                .ok_or_else(|| DocError::tool(SUBMIT_PAGE, "`content` is required"))?;
            *slot = Some(page);
            Ok(json!({"status": "saved", "id": page_id}))
        }),
    )
}
