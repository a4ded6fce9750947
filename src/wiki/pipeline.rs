//! Pipeline Orchestrator
//!
//! Runs Miner → Architect → Scribe over one project:
//!
//! ```text
//! Started → Mining → Planning → Writing → Completed
//!     └─────────┴─────────┴─────────┴──→ Failed
//! ```
//!
//! Every phase resumes from the phase cache, so rerunning after a failure
//! only redoes what is missing. The run always ends in a `PipelineReport`;
//! a phase error becomes status `error` with its message.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::architect::ArchitectPhase;
use super::context::PhaseContext;
use super::miner::{MinerPhase, MinerStats};
use super::scribe::{PageResult, PageStatus, ScribePhase};
use crate::ai::pricing::CostEstimate;
use crate::ai::provider::SharedClient;
use crate::ai::tools::{SharedCatalog, ToolCatalog};
use crate::analyzer::{FileScanner, SourceCollector};
use crate::config::Config;
use crate::events::{EventBus, Stage};
use crate::storage::PhaseCache;
use crate::types::{Result, slugify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub project_id: String,
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_path: Option<PathBuf>,
    pub total_pages: usize,
    pub pages: Vec<PageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<MinerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<CostEstimate>,
}

impl PipelineReport {
    fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            status: RunStatus::Completed,
            message: String::new(),
            docs_path: None,
            total_pages: 0,
            pages: Vec::new(),
            miner: None,
            estimate: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn count(&self, status: PageStatus) -> usize {
        self.pages.iter().filter(|p| p.status == status).count()
    }
}

pub struct PipelineOrchestrator {
    ctx: PhaseContext,
    collector: Box<dyn SourceCollector>,
}

impl PipelineOrchestrator {
    pub fn new(project_id: &str, config: Config, client: SharedClient) -> Self {
        let collector = Box::new(FileScanner::new(config.collection.clone()));
        let catalog: SharedCatalog = Arc::new(ToolCatalog::new());
        Self {
            ctx: PhaseContext::new(
                project_id,
                Arc::new(config),
                client,
                catalog,
                EventBus::new(),
            ),
            collector,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn SourceCollector>) -> Self {
        self.collector = collector;
        self
    }

    /// Shared tools offered to the Architect and Scribe conversations
    pub fn with_catalog(mut self, catalog: SharedCatalog) -> Self {
        self.ctx.catalog = catalog;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.ctx.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn cache(&self) -> &PhaseCache {
        &self.ctx.cache
    }

    #[instrument(skip(self), fields(project = %self.ctx.project_id))]
    pub async fn run(&self, root: &Path) -> PipelineReport {
        let events = &self.ctx.events;
        let mut report = PipelineReport::new(&self.ctx.project_id);
        let mut stage = Stage::Started;

        events.stage(
            Stage::Started,
            format!("Generating documentation for {}", self.ctx.project_id),
        );

        match self.run_phases(root, &mut report, &mut stage).await {
            Ok(()) => {
                report.message = format!(
                    "Documentation generated: {} written, {} cached, {} without facts, {} failed",
                    report.count(PageStatus::Written),
                    report.count(PageStatus::Cached),
                    report.count(PageStatus::NoFacts),
                    report.count(PageStatus::Failed),
                );
                info!("{}", report.message);
                events.stage(Stage::Completed, report.message.clone());
            }
            Err(e) => {
                error!("Pipeline failed during {}: {}", stage, e);
                report.status = RunStatus::Error;
                report.message = e.to_string();
                events.error(stage, report.message.clone());
                events.stage(Stage::Failed, format!("Failed during {}", stage));
            }
        }

        report
    }

    async fn run_phases(
        &self,
        root: &Path,
        report: &mut PipelineReport,
        stage: &mut Stage,
    ) -> Result<()> {
        *stage = Stage::Mining;
        let mined = MinerPhase::new(&self.ctx)
            .run(root, self.collector.as_ref())
            .await?;
        report.miner = Some(mined.stats.clone());
        report.estimate = mined.estimate;

        *stage = Stage::Planning;
        let (tree, _) = ArchitectPhase::new(&self.ctx).run(&mined.output).await?;

        *stage = Stage::Writing;
        report.pages = ScribePhase::new(&self.ctx).run(&mined.output, &tree).await;
        report.total_pages = report.pages.len();

        report.docs_path = Some(
            self.ctx
                .cache
                .export_docs(&self.ctx.config.output.docs_dir, &tree)
                .await?,
        );
        Ok(())
    }
}

/// Project id derived from the directory name
pub fn project_id_for(root: &Path) -> String {
    let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let id = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .map(slugify)
        .unwrap_or_default();
    if id.is_empty() { "project".to_string() } else { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::message::{Message, ToolCall};
    use crate::ai::pricing::ModelRate;
    use crate::ai::provider::mock::ScriptedClient;
    use crate::ai::tools::ToolDefinition;
    use crate::events::PipelineEvent;
    use crate::types::{
        ErrorCategory, Fact, FileFactSet, Impact, LlmError, MinerOutput, NavigationNode,
        NavigationTree, PageContent,
    };
    use crate::wiki::prompts::{SUBMIT_FACTS, SUBMIT_NAVIGATION, SUBMIT_PAGE};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.cache_dir = dir.join("cache");
        config.output.docs_dir = dir.join("docs");
        config.pipeline.miner_delay_ms = 0;
        config.pipeline.retry_base_delay_ms = 1;
        config
            .pricing
            .insert("mock-model".into(), ModelRate::new(0.15, 0.60));
        config
    }

    fn offers(tools: &[ToolDefinition], name: &str) -> bool {
        tools.iter().any(|t| t.name == name)
    }

    /// Answers each phase with its submission tool
    fn reply(tools: &[ToolDefinition], navigation: &Value) -> Result<Message> {
        let call = if offers(tools, SUBMIT_FACTS) {
            // flattened single fact
            ToolCall::new(
                SUBMIT_FACTS,
                json!({"topic": "Entry", "impact": "HIGH", "statement": "Starts the web app"}),
            )
        } else if offers(tools, SUBMIT_NAVIGATION) {
            ToolCall::new(SUBMIT_NAVIGATION, navigation.clone())
        } else if offers(tools, SUBMIT_PAGE) {
            ToolCall::new(
                SUBMIT_PAGE,
                json!({"id": "made-up", "title": "Overview", "content": "# Overview\n\nBody"}),
            )
        } else {
            return Ok(Message::assistant("nothing to do"));
        };
        Ok(Message::assistant_with_calls(None, vec![call.with_id("call_1")]))
    }

    fn scripted(navigation: Value) -> Arc<ScriptedClient> {
        Arc::new(ScriptedClient::new(move |_, tools| reply(tools, &navigation)))
    }

    fn overview_only() -> Value {
        json!({"tree": [{"id": "overview", "label": "Overview", "type": "page"}]})
    }

    fn project_with_app_py(dir: &Path) -> PathBuf {
        let root = dir.join("demo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("app.py"), "from flask import Flask\napp = Flask(__name__)\n")
            .unwrap();
        root
    }

    #[tokio::test]
    async fn test_end_to_end_single_file() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let client = scripted(overview_only());
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());

        let report = pipeline.run(&root).await;
        assert!(report.is_success(), "{}", report.message);
        assert_eq!(report.total_pages, 1);
        assert_eq!(report.pages[0].id, "overview");
        assert_eq!(report.pages[0].status, PageStatus::Written);
        assert_eq!(report.miner.as_ref().unwrap().total_facts, 1);
        assert!(report.estimate.is_some());
        // one conversation per phase
        assert_eq!(client.conversations(), 3);

        let miner = pipeline.cache().load_miner().await.unwrap().unwrap();
        assert_eq!(miner.results[0].file_path, "app.py");
        assert_eq!(miner.results[0].facts[0].impact, Impact::High);

        let page = pipeline.cache().load_page("overview").await.unwrap().unwrap();
        assert_eq!(page.id, "overview");
        assert!(report.docs_path.unwrap().join("sidebar.json").exists());
    }

    #[tokio::test]
    async fn test_second_run_makes_no_calls_and_keeps_artifacts() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let first = PipelineOrchestrator::new("demo", test_config(dir.path()), scripted(overview_only()));
        assert!(first.run(&root).await.is_success());
        let miner_path = first.cache().dir().join("miner_output.json");
        let before = std::fs::read(&miner_path).unwrap();

        let client = scripted(overview_only());
        let second = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());
        let report = second.run(&root).await;

        assert!(report.is_success());
        assert_eq!(client.calls(), 0);
        assert!(report.miner.unwrap().cached);
        assert_eq!(report.pages[0].status, PageStatus::Cached);
        assert_eq!(std::fs::read(&miner_path).unwrap(), before);
    }

    async fn seed(pipeline: &PipelineOrchestrator, tree: &NavigationTree) {
        let miner = MinerOutput {
            results: ["api/routes.py", "auth/login.py", "core/app.py", "storage/pool.py"]
                .iter()
                .map(|p| FileFactSet::new(*p, vec![Fact::new("t", Impact::Medium, "s")]))
                .collect(),
        };
        pipeline.cache().save_miner(&miner).await.unwrap();
        pipeline.cache().save_navigation(tree).await.unwrap();
    }

    #[tokio::test]
    async fn test_scribe_writes_only_missing_pages() {
        let dir = TempDir::new().unwrap();
        let client = scripted(overview_only());
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());

        let tree = NavigationTree::new(
            ["overview", "api", "core", "storage", "auth"]
                .iter()
                .map(|id| NavigationNode::page(*id, *id))
                .collect(),
        );
        seed(&pipeline, &tree).await;
        for id in ["overview", "api", "core"] {
            let page = PageContent::from_submission(id, id, &json!({"content": "written"})).unwrap();
            pipeline.cache().save_page(&page).await.unwrap();
        }

        let report = pipeline.run(dir.path()).await;
        assert!(report.is_success(), "{}", report.message);
        assert_eq!(client.conversations(), 2);
        assert_eq!(report.count(PageStatus::Cached), 3);
        assert_eq!(report.count(PageStatus::Written), 2);
        // traversal order is kept
        let ids: Vec<&str> = report.pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["overview", "api", "core", "storage", "auth"]);
    }

    #[tokio::test]
    async fn test_unmatched_page_gets_placeholder_without_call() {
        let dir = TempDir::new().unwrap();
        let client = scripted(overview_only());
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());
        seed(
            &pipeline,
            &NavigationTree::new(vec![NavigationNode::page("billing", "Billing")]),
        )
        .await;

        let report = pipeline.run(dir.path()).await;
        assert!(report.is_success());
        assert_eq!(report.pages[0].status, PageStatus::NoFacts);
        assert_eq!(client.calls(), 0);
        assert!(pipeline.cache().has_page("billing").await);

        // the stored placeholder still reports as a gap on the next run
        let again = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());
        let rerun = again.run(dir.path()).await;
        assert_eq!(rerun.pages[0].status, PageStatus::NoFacts);
        assert_eq!(rerun.count(PageStatus::Cached), 0);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_page_is_retried() {
        let dir = TempDir::new().unwrap();
        let failures = Arc::new(AtomicUsize::new(0));
        let client = {
            let failures = failures.clone();
            let navigation = overview_only();
            Arc::new(ScriptedClient::new(move |_, tools| {
                if offers(tools, SUBMIT_PAGE) && failures.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(LlmError::new(ErrorCategory::RateLimit, "429").into());
                }
                reply(tools, &navigation)
            }))
        };
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());
        seed(
            &pipeline,
            &NavigationTree::new(vec![NavigationNode::page("api", "API")]),
        )
        .await;

        let report = pipeline.run(dir.path()).await;
        assert!(report.is_success(), "{}", report.message);
        assert_eq!(report.pages[0].status, PageStatus::Written, "{:?}", report.pages[0].error);
        assert_eq!(client.calls(), 2);
        assert!(pipeline.cache().has_page("api").await);
    }

    #[tokio::test]
    async fn test_rate_limited_architect_is_retried() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let failures = Arc::new(AtomicUsize::new(0));
        let client = {
            let failures = failures.clone();
            let navigation = overview_only();
            Arc::new(ScriptedClient::new(move |_, tools| {
                if offers(tools, SUBMIT_NAVIGATION) && failures.fetch_add(1, Ordering::SeqCst) == 0
                {
                    return Err(LlmError::new(ErrorCategory::RateLimit, "429").into());
                }
                reply(tools, &navigation)
            }))
        };
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client);

        let report = pipeline.run(&root).await;
        assert!(report.is_success(), "{}", report.message);
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert!(pipeline.cache().load_navigation().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_miner_artifact_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let client = scripted(overview_only());
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client.clone());
        let miner_path = pipeline.cache().dir().join("miner_output.json");
        std::fs::create_dir_all(pipeline.cache().dir()).unwrap();
        std::fs::write(&miner_path, r#"{"results": ["#).unwrap();

        let report = pipeline.run(&root).await;
        assert!(report.is_success(), "{}", report.message);
        assert!(!report.miner.as_ref().unwrap().cached);
        assert_eq!(client.conversations(), 3);
        let rewritten: MinerOutput =
            serde_json::from_str(&std::fs::read_to_string(&miner_path).unwrap()).unwrap();
        assert_eq!(rewritten.results[0].file_path, "app.py");
    }

    #[tokio::test]
    async fn test_cost_ceiling_aborts_before_any_call() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let mut config = test_config(dir.path());
        config.pipeline.max_cost_usd = 0.000_001;
        let client = scripted(overview_only());
        let pipeline = PipelineOrchestrator::new("demo", config, client.clone());
        let mut rx = pipeline.events().subscribe();

        let report = pipeline.run(&root).await;
        assert_eq!(report.status, RunStatus::Error);
        assert!(report.message.contains("exceeds ceiling"), "{}", report.message);
        assert_eq!(client.calls(), 0);
        assert!(pipeline.cache().load_miner().await.unwrap().is_none());

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Error { stage, .. } = event {
                assert_eq!(stage, Stage::Mining);
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_rate_limited_file_is_retried() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let failures = Arc::new(AtomicUsize::new(0));
        let client = {
            let failures = failures.clone();
            let navigation = overview_only();
            Arc::new(ScriptedClient::new(move |_, tools| {
                if offers(tools, SUBMIT_FACTS) && failures.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(LlmError::new(ErrorCategory::RateLimit, "429").into());
                }
                reply(tools, &navigation)
            }))
        };

        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client);
        let report = pipeline.run(&root).await;
        assert!(report.is_success(), "{}", report.message);
        assert_eq!(report.miner.unwrap().analyzed, 1);
        assert!(failures.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_architect_without_submission_fails_run() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let client = scripted(json!({"tree": []}));
        let pipeline = PipelineOrchestrator::new("demo", test_config(dir.path()), client);

        let report = pipeline.run(&root).await;
        assert_eq!(report.status, RunStatus::Error);
        assert!(report.message.contains("navigation"), "{}", report.message);
        // mined facts survive for the next run
        assert!(pipeline.cache().load_miner().await.unwrap().is_some());
        assert!(pipeline.cache().load_navigation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_events_per_unit() {
        let dir = TempDir::new().unwrap();
        let root = project_with_app_py(dir.path());
        let pipeline =
            PipelineOrchestrator::new("demo", test_config(dir.path()), scripted(overview_only()));
        let mut rx = pipeline.events().subscribe();
        assert!(pipeline.run(&root).await.is_success());

        let mut stages = Vec::new();
        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::StageChange { stage, .. } => stages.push(stage),
                PipelineEvent::Progress {
                    stage,
                    current,
                    total,
                    ..
                } => progress.push((stage, current, total)),
                _ => {}
            }
        }
        assert_eq!(
            stages,
            vec![
                Stage::Started,
                Stage::Mining,
                Stage::Planning,
                Stage::Writing,
                Stage::Completed
            ]
        );
        assert!(progress.contains(&(Stage::Mining, 1, 1)));
        assert!(progress.contains(&(Stage::Writing, 1, 1)));
    }

    #[test]
    fn test_project_id_from_dir_name() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("My Service");
        std::fs::create_dir_all(&root).unwrap();
        assert_eq!(project_id_for(&root), "my-service");
    }
}
