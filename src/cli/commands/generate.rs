//! Generate Command
//!
//! Runs the Miner, Architect and Scribe phases for one project and prints
//! the run report.

use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::ai::provider::{ProviderConfig, create_client};
use crate::cli::progress::ConsoleRenderer;
use crate::cli::ui::Output;
use crate::types::{DocError, Result};
use crate::wiki::{PageStatus, PipelineOrchestrator, PipelineReport};

#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub path: PathBuf,
    pub project_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_cost: Option<f64>,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub verbose: bool,
}

/// Returns the report; an errored run is turned into `Err` after printing
pub fn run(options: GenerateOptions) -> Result<PipelineReport> {
    let (root, project_id, mut config) = super::project_context(&options.path, options.project_id)?;

    // CLI flags win over every file and environment source
    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = options.model {
        config.llm.model = model;
    }
    if let Some(max_cost) = options.max_cost {
        config.pipeline.max_cost_usd = max_cost;
    }
    if let Some(concurrency) = options.concurrency {
        config.pipeline.miner_concurrency = concurrency;
    }
    if let Some(output) = options.output {
        config.output.docs_dir = output;
    }
    config.validate()?;

    let client = create_client(&ProviderConfig::from_llm_config(&config.llm)?)?;
    let orchestrator = PipelineOrchestrator::new(&project_id, config, client);

    let rt = Runtime::new()?;
    let report = rt.block_on(async {
        let renderer = if options.json {
            None
        } else {
            Some(ConsoleRenderer::new(options.verbose).spawn(orchestrator.events()))
        };
        let report = orchestrator.run(&root).await;
        if let Some(handle) = renderer {
            let _ = handle.await;
        }
        report
    });

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.is_success() {
        Ok(report)
    } else {
        Err(DocError::phase("pipeline", report.message.clone()))
    }
}

fn print_report(report: &PipelineReport) {
    let out = Output::new();
    out.header(&format!("Project {}", report.project_id));

    if let Some(miner) = &report.miner {
        out.field(
            "Files",
            format!(
                "{} analysed, {} failed, {} facts{}",
                miner.analyzed,
                miner.failed,
                miner.total_facts,
                if miner.cached { " (cached)" } else { "" }
            ),
        );
        for path in &miner.failed_files {
            out.warning(&format!("Not analysed: {}", path));
        }
    }
    if let Some(estimate) = &report.estimate {
        out.field(
            "Estimate",
            format!(
                "${:.4} ({} input tokens)",
                estimate.usd_estimate, estimate.input_tokens
            ),
        );
    }

    if report.total_pages > 0 {
        out.field(
            "Pages",
            format!(
                "{} total: {} written, {} cached, {} without facts, {} failed",
                report.total_pages,
                report.count(PageStatus::Written),
                report.count(PageStatus::Cached),
                report.count(PageStatus::NoFacts),
                report.count(PageStatus::Failed),
            ),
        );
        for page in report.pages.iter().filter(|p| p.status == PageStatus::Failed) {
            out.warning(&format!(
                "{}: {}",
                page.id,
                page.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    if let Some(path) = &report.docs_path {
        out.field("Docs", path.display());
    }

    println!();
    if report.is_success() {
        out.success(&report.message);
    } else {
        out.error(&report.message);
    }
}
