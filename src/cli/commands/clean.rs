//! Clean Command
//!
//! Removes cached phase artifacts so the next run recomputes them.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::storage::{Phase, PhaseCache};
use crate::types::Result;

/// `phase` of `None` clears every phase
pub fn run(path: &Path, project_id: Option<String>, phase: Option<&str>) -> Result<()> {
    let phase = phase.map(|p| p.parse::<Phase>()).transpose()?;
    let (_, project_id, config) = super::project_context(path, project_id)?;
    let cache = PhaseCache::new(&config.output.cache_dir, &project_id);

    let removed = Runtime::new()?.block_on(cache.clear(phase))?;

    let out = Output::new();
    let scope = phase.map_or_else(|| "all phases".to_string(), |p| format!("{} phase", p));
    if removed > 0 {
        out.success(&format!("Cleared {} artifact(s) for {} of {}", removed, scope, project_id));
    } else {
        out.info(&format!("Nothing cached for {} of {}", scope, project_id));
    }
    Ok(())
}
