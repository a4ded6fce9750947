//! Miner Phase
//!
//! One isolated conversation per source file, fanned out through the
//! concurrency gate. Each conversation must hand its facts to `submit_facts`;
//! the aggregate is persisted once all files are done.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use super::context::{PhaseContext, submission_from_text};
use super::prompts::{self, SUBMIT_FACTS};
use crate::ai::executor::RunOutcome;
use crate::ai::gate::ConcurrencyGate;
use crate::ai::message::Conversation;
use crate::ai::pricing::{CostEstimate, PricingTable};
use crate::ai::tools::{ParamType, SchemaBuilder, ScopedCatalog, Tool, ToolDefinition, ToolHandler};
use crate::analyzer::{SourceCollector, SourceFile};
use crate::events::Stage;
use crate::types::{DocError, Fact, FileFactSet, MinerOutput, Result};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MinerStats {
    pub total_files: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub total_facts: usize,
    /// Loaded from the phase cache instead of mined
    pub cached: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<String>,
}

pub struct MinerRun {
    pub output: MinerOutput,
    pub stats: MinerStats,
    /// Present when the batch went through admission
    pub estimate: Option<CostEstimate>,
}

type Submission = Arc<Mutex<Option<Vec<Fact>>>>;

pub struct MinerPhase<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> MinerPhase<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip_all, fields(project = %self.ctx.project_id))]
    pub async fn run(&self, root: &Path, collector: &dyn SourceCollector) -> Result<MinerRun> {
        let events = &self.ctx.events;

        if let Some(output) = self.ctx.cache.load_miner().await? {
            info!("Using cached miner output ({} files)", output.results.len());
            events.stage(
                Stage::Mining,
                format!("Loaded cached facts for {} files", output.results.len()),
            );
            let stats = MinerStats {
                total_files: output.results.len(),
                analyzed: output.results.len(),
                total_facts: output.total_facts(),
                cached: true,
                ..MinerStats::default()
            };
            return Ok(MinerRun {
                output,
                stats,
                estimate: None,
            });
        }

        let files = self.prepare(collector.collect(root)?);
        if files.is_empty() {
            return Err(DocError::NoSourceFiles(root.display().to_string()));
        }

        let estimate = self.admit(&files)?;
        events.stage(
            Stage::Mining,
            format!(
                "Mining {} files (estimated ${:.4})",
                files.len(),
                estimate.usd_estimate
            ),
        );

        let (output, stats) = self.mine_all(files).await;
        if stats.analyzed == 0 {
            return Err(DocError::phase(
                "miner",
                format!("no file produced facts ({} failed)", stats.failed),
            ));
        }

        self.ctx.cache.save_miner(&output).await?;
        info!(
            "Miner finished: {} analyzed, {} failed, {} facts",
            stats.analyzed, stats.failed, stats.total_facts
        );

        Ok(MinerRun {
            output,
            stats,
            estimate: Some(estimate),
        })
    }

    /// Truncate every file to the per-file token budget
    fn prepare(&self, files: Vec<SourceFile>) -> Vec<SourceFile> {
        let budget = self.ctx.config.pipeline.miner_max_tokens_per_file;
        files
            .into_iter()
            .map(|file| SourceFile {
                content: self.ctx.tokens.truncate(&file.content, budget),
                path: file.path,
            })
            .collect()
    }

    /// Estimate the batch and refuse it above the ceiling, before any call
    fn admit(&self, files: &[SourceFile]) -> Result<CostEstimate> {
        let pipeline = &self.ctx.config.pipeline;
        let input_tokens: u64 = files
            .iter()
            .map(|f| self.ctx.tokens.count(&f.content) as u64)
            .sum();
        let rates = PricingTable::with_overrides(self.ctx.config.pricing.clone())
            .rate_for(self.ctx.client.kind(), self.ctx.client.model());

        let estimate = CostEstimate::for_batch(
            input_tokens,
            files.len(),
            pipeline.assumed_output_tokens_per_file,
            rates,
        );
        estimate.admit(pipeline.max_cost_usd, files.len())?;
        Ok(estimate)
    }

    async fn mine_all(&self, files: Vec<SourceFile>) -> (MinerOutput, MinerStats) {
        let pipeline = &self.ctx.config.pipeline;
        let gate = ConcurrencyGate::new(
            pipeline.miner_concurrency,
            pipeline.miner_delay(),
            pipeline.retry_policy(),
        );
        let total = files.len();

        let mut stats = MinerStats {
            total_files: total,
            ..MinerStats::default()
        };
        let mut output = MinerOutput::default();

        let gate = &gate;
        let mut results = stream::iter(files)
            .map(|file| async move {
                let label = format!("miner:{}", file.path);
                let result = gate.run(&label, || self.mine_file(&file)).await;
                (file.path, result)
            })
            .buffer_unordered(pipeline.miner_concurrency);

        let mut done = 0;
        while let Some((path, result)) = results.next().await {
            done += 1;
            match result {
                Ok(facts) => {
                    debug!("{}: {} facts", path, facts.len());
                    stats.analyzed += 1;
                    stats.total_facts += facts.len();
                    self.ctx
                        .events
                        .progress(Stage::Mining, done, total, format!("Analyzed {}", path));
                    output.results.push(FileFactSet::new(path, facts));
                }
                Err(e) => {
                    warn!("Miner failed on {}: {}", path, e);
                    stats.failed += 1;
                    self.ctx.events.progress(
                        Stage::Mining,
                        done,
                        total,
                        format!("Failed {}: {}", path, e),
                    );
                    stats.failed_files.push(path);
                }
            }
        }

        output.sort();
        stats.failed_files.sort();
        (output, stats)
    }

    /// One attempt at one file; called afresh on every rate-limit retry
    async fn mine_file(&self, file: &SourceFile) -> Result<Vec<Fact>> {
        let submission: Submission = Arc::default();
        let mut executor = self
            .ctx
            .executor(format!("miner:{}", file.path), ScopedCatalog::empty());
        executor.register(submit_facts_tool(submission.clone()));

        let mut conversation = Conversation::new(
            prompts::MINER_SYSTEM,
            prompts::miner_user(&file.path, &file.content),
        );
        let outcome = executor
            .run_until(
                &mut conversation,
                self.ctx.config.pipeline.miner_max_iterations,
                || submitted(&submission),
            )
            .await?;

        if let Some(facts) = take(&submission) {
            return Ok(facts);
        }

        // No tool call; the final text may still carry the submission
        if let RunOutcome::Completed(text) = outcome
            && let Some(facts) = facts_from_text(&text)
        {
            debug!("{}: facts recovered from final text", file.path);
            return Ok(facts);
        }

        Err(DocError::phase(
            "miner",
            format!("{}: no facts submitted", file.path),
        ))
    }
}

fn submitted(submission: &Submission) -> bool {
    submission.lock().map(|s| s.is_some()).unwrap_or(false)
}

fn take(submission: &Submission) -> Option<Vec<Fact>> {
    submission.lock().ok().and_then(|mut s| s.take())
}

/// `{file, facts}`, a bare list, or a `{name, arguments}` wrapper around either
fn facts_from_text(text: &str) -> Option<Vec<Fact>> {
    let facts = Fact::list_from_submission(&submission_from_text(text)?);
    (!facts.is_empty()).then_some(facts)
}

pub fn submit_facts_definition() -> ToolDefinition {
    let fact_schema = SchemaBuilder::object()
        .required("topic", ParamType::String, "Short domain label")
        .required(
            "impact",
            ParamType::Enum(vec!["HIGH", "MEDIUM", "LOW"]),
            "Architectural weight of the fact",
        )
        .required("statement", ParamType::String, "30-60 word factual statement")
        .build();

    ToolDefinition::new(
        SUBMIT_FACTS,
        "Submit every fact extracted from the file in a single call.",
        SchemaBuilder::object()
            .optional("file", ParamType::String, "Path of the analysed file")
            .required(
                "facts",
                ParamType::Array(fact_schema),
                "All facts for the file",
            )
            .build(),
    )
}

/// Captures the first valid submission; later calls get an error result
fn submit_facts_tool(submission: Submission) -> Tool {
    Tool::new(
        submit_facts_definition(),
        ToolHandler::sync(move |args: Value| {
            let mut slot = submission
                .lock()
                .map_err(|_| DocError::tool(SUBMIT_FACTS, "submission state poisoned"))?;
            if slot.is_some() {
                return Err(DocError::tool(
                    SUBMIT_FACTS,
                    "facts were already submitted for this file",
                ));
            }

            let facts = Fact::list_from_submission(&args);
            if facts.is_empty() {
                return Err(DocError::tool(
                    SUBMIT_FACTS,
                    "no valid facts: each fact needs a statement",
                ));
            }

            let count = facts.len();
            *slot = Some(facts);
            Ok(json!({"status": "saved", "facts": count}))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_submit_facts_accepts_once() {
        let submission: Submission = Arc::default();
        let tool = submit_facts_tool(submission.clone());

        let args = json!({"facts": [{"topic": "API", "impact": "HIGH", "statement": "Routes"}]});
        assert_eq!(tool.invoke(args.clone()).await.unwrap()["facts"], 1);
        assert!(submitted(&submission));
        assert!(tool.invoke(args).await.is_err());
        assert_eq!(take(&submission).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_facts_normalizes_flattened_fact() {
        let submission: Submission = Arc::default();
        let tool = submit_facts_tool(submission.clone());

        tool.invoke(json!({"topic": "Config", "impact": "low", "statement": "Reads env"}))
            .await
            .unwrap();
        let facts = take(&submission).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].topic, "Config");
    }

    #[tokio::test]
    async fn test_submit_facts_rejects_empty() {
        let submission: Submission = Arc::default();
        let tool = submit_facts_tool(submission.clone());
        assert!(tool.invoke(json!({"facts": []})).await.is_err());
        assert!(!submitted(&submission));
    }

    #[test]
    fn test_facts_from_text_variants() {
        let raw = r#"Here you go: {"file": "a.py", "facts": [{"topic": "x", "impact": "LOW", "statement": "s"}]}"#;
        assert_eq!(facts_from_text(raw).unwrap().len(), 1);

        let wrapped = "```json\n{\"name\": \"submit_facts\", \"arguments\": {\"facts\": [{\"statement\": \"s\"}]}}\n```";
        assert_eq!(facts_from_text(wrapped).unwrap()[0].statement, "s");

        assert!(facts_from_text("no json at all").is_none());
    }

    #[test]
    fn test_definition_schema() {
        let def = submit_facts_definition();
        assert_eq!(def.name, SUBMIT_FACTS);
        assert_eq!(def.input_schema["required"], json!(["facts"]));
    }
}
