//! Architect Phase
//!
//! Condenses the mined facts into a per-module summary and has the service
//! design the navigation tree in one conversation, submitted through
//! `submit_navigation`.

use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use super::context::{PhaseContext, submission_from_text};
use super::prompts::{self, SUBMIT_NAVIGATION};
use crate::ai::executor::RunOutcome;
use crate::ai::gate::retry_rate_limited;
use crate::ai::message::Conversation;
use crate::ai::tools::{ParamType, SchemaBuilder, Tool, ToolDefinition, ToolHandler};
use crate::events::{PipelineEvent, Stage};
use crate::types::{DocError, MinerOutput, NavigationTree, Result};

/// Facts listed per module in the summary
const FACTS_PER_MODULE: usize = 8;

type Submission = Arc<Mutex<Option<NavigationTree>>>;

pub struct ArchitectPhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> ArchitectPhase<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Returns the tree and whether it came from the cache
    #[instrument(skip_all, fields(project = %self.ctx.project_id))]
    pub async fn run(&self, miner: &MinerOutput) -> Result<(NavigationTree, bool)> {
        if let Some(tree) = self.ctx.cache.load_navigation().await? {
            info!("Using cached navigation ({} pages)", tree.pages().len());
            self.ctx
                .events
                .stage(Stage::Planning, "Loaded cached navigation");
            self.broadcast(&tree)?;
            return Ok((tree, true));
        }

        self.ctx.events.stage(
            Stage::Planning,
            format!("Planning navigation over {} modules", miner.by_module().len()),
        );

        let summary = self.ctx.tokens.truncate(
            &module_summary(miner),
            self.ctx.config.pipeline.scribe_max_input_tokens,
        );
        let policy = self.ctx.config.pipeline.retry_policy();
        let tree = retry_rate_limited(&policy, "architect", || self.plan(&summary)).await?;

        self.broadcast(&tree)?;
        self.ctx.cache.save_navigation(&tree).await?;
        info!("Navigation planned: {} pages", tree.pages().len());
        Ok((tree, false))
    }

    /// One fresh planning conversation
    async fn plan(&self, summary: &str) -> Result<NavigationTree> {
        let submission: Submission = Arc::default();
        let mut executor = self.ctx.executor("architect", self.ctx.catalog.full());
        executor.register(submit_navigation_tool(submission.clone()));

        let mut conversation = Conversation::new(
            prompts::ARCHITECT_SYSTEM,
            prompts::architect_user(&self.ctx.project_id, summary),
        );
        let outcome = executor
            .run_until(
                &mut conversation,
                self.ctx.config.pipeline.architect_max_iterations,
                || submission.lock().map(|s| s.is_some()).unwrap_or(false),
            )
            .await?;

        if let Some(tree) = submission.lock().ok().and_then(|mut s| s.take()) {
            return Ok(tree);
        }
        if let RunOutcome::Completed(text) = outcome
            && let Some(tree) =
                submission_from_text(&text).and_then(|v| NavigationTree::from_submission(&v))
        {
            return Ok(tree);
        }

        Err(DocError::phase(
            "architect",
            "no valid navigation tree was submitted",
        ))
    }

    fn broadcast(&self, tree: &NavigationTree) -> Result<()> {
        self.ctx.events.emit(PipelineEvent::Navigation {
            stage: Stage::Planning,
            data: serde_json::to_value(tree)?,
        });
        Ok(())
    }
}

/// One block per module: file count, then its weightiest facts
pub fn module_summary(miner: &MinerOutput) -> String {
    let mut out = String::new();
    for (module, files) in miner.by_module() {
        let _ = writeln!(out, "## {} ({} files)", module, files.len());

        let mut facts: Vec<_> = files.iter().flat_map(|f| f.facts.iter()).collect();
        // High sorts first
        facts.sort_by_key(|f| f.impact);
        for fact in facts.into_iter().take(FACTS_PER_MODULE) {
            let _ = writeln!(out, "- [{}] {}", fact.topic, fact.statement);
        }
        out.push('\n');
    }
    out
}

pub fn submit_navigation_definition() -> ToolDefinition {
    let node = json!({
        "type": "object",
        "properties": {
            "id": {"type": "string", "description": "URL-safe slug"},
            "label": {"type": "string", "description": "Sidebar label"},
            "type": {"type": "string", "enum": ["category", "page"]},
            "children": {"type": "array", "items": {"type": "object"}}
        },
        "required": ["label", "type"]
    });

    ToolDefinition::new(
        SUBMIT_NAVIGATION,
        "Submit the documentation navigation tree.",
        SchemaBuilder::object()
            .required(
                "tree",
                ParamType::Array(node),
                "Top-level nodes; categories hold pages in `children`",
            )
            .build(),
    )
}

fn submit_navigation_tool(submission: Submission) -> Tool {
    Tool::new(
        submit_navigation_definition(),
        ToolHandler::sync(move |args: Value| {
            let mut slot = submission
                .lock()
                .map_err(|_| DocError::tool(SUBMIT_NAVIGATION, "submission state poisoned"))?;
            if slot.is_some() {
                return Err(DocError::tool(
                    SUBMIT_NAVIGATION,
                    "navigation was already submitted",
                ));
            }

            let tree = NavigationTree::from_submission(&args).ok_or_else(|| {
                DocError::tool(
                    SUBMIT_NAVIGATION,
                    "the tree must contain at least one page node",
                )
            })?;
            let pages = tree.pages().len();
            *slot = Some(tree);
            Ok(json!({"status": "saved", "pages": pages}))
        }),
    )
}
