pub mod clean;
pub mod config;
pub mod generate;
pub mod status;

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigLoader};
use crate::types::Result;
use crate::wiki::project_id_for;

/// Resolved project root, its id and the effective configuration.
///
/// Relative cache and docs directories are anchored at the project root so
/// the commands behave the same from any working directory.
pub(crate) fn project_context(
    path: &Path,
    project_id: Option<String>,
) -> Result<(PathBuf, String, Config)> {
    let root = path.to_path_buf();
    let mut config = ConfigLoader::load_for(&root)?;
    if config.output.cache_dir.is_relative() {
        config.output.cache_dir = root.join(&config.output.cache_dir);
    }
    if config.output.docs_dir.is_relative() {
        config.output.docs_dir = root.join(&config.output.docs_dir);
    }
    let id = project_id.unwrap_or_else(|| project_id_for(&root));
    Ok((root, id, config))
}
