//! Config Command
//!
//! Usage:
//!   triadoc config show [-f json]
//!   triadoc config path
//!   triadoc config init [--force]

use std::path::Path;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(path: &Path, format: &str) -> Result<()> {
    let config = ConfigLoader::load_for(path)?;
    ConfigLoader::show_config(&config, format == "json")
}

pub fn path(path: &Path) -> Result<()> {
    ConfigLoader::show_path(path);
    Ok(())
}

pub fn init(path: &Path, force: bool) -> Result<()> {
    let file = ConfigLoader::init_project(path, force)?;
    Output::new().success(&format!("Project configuration: {}", file.display()));
    Ok(())
}
