//! Status Command
//!
//! Shows which phase artifacts are cached for a project.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::storage::PhaseCache;
use crate::types::Result;

pub fn run(path: &Path, project_id: Option<String>, format: &str) -> Result<()> {
    let (_, project_id, config) = super::project_context(path, project_id)?;
    let cache = PhaseCache::new(&config.output.cache_dir, &project_id);
    let status = Runtime::new()?.block_on(cache.status())?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Project {}", status.project_id));
    out.field("Cache", cache.dir().display());

    match (status.miner_files, status.miner_facts) {
        (Some(files), Some(facts)) => out.field("Miner", format!("{} files, {} facts", files, facts)),
        _ => out.field("Miner", "not cached"),
    }
    match status.navigation_pages {
        Some(pages) => out.field("Architect", format!("{} pages planned", pages)),
        None => out.field("Architect", "not cached"),
    }
    out.field("Scribe", format!("{} pages written", status.written_pages));
    Ok(())
}
