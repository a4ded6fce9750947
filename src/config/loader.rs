//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/triadoc/config.toml)
//! 3. Project config (<project>/.triadoc/config.toml)
//! 4. Environment variables (TRIADOC_ prefix, `__` between nested keys)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::Config;
use crate::types::{DocError, Result};

const ENV_PREFIX: &str = "TRIADOC_";
const APP_DIR: &str = "triadoc";
const PROJECT_DIR: &str = ".triadoc";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Full resolution chain for the current directory
    pub fn load() -> Result<Config> {
        Self::load_for(Path::new("."))
    }

    /// Full resolution chain for a project rooted at `project_root`
    pub fn load_for(project_root: &Path) -> Result<Config> {
        let figment = Self::figment(Self::global_config_path().as_deref(), project_root);
        Self::extract(figment)
    }

    /// Defaults plus one file, no environment
    pub fn load_from_file(path: &Path) -> Result<Config> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file(path)),
        )
    }

    fn figment(global: Option<&Path>, project_root: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        let project_path = Self::project_config_path(project_root);
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // TRIADOC_PIPELINE__MAX_COST_USD -> pipeline.max_cost_usd
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| DocError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// `~/.config/triadoc` (platform config dir)
    pub fn global_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    pub fn show_path(project_root: &Path) {
        println!("Configuration paths:");
        println!();

        match Self::global_config_path() {
            Some(global) => {
                let exists = if global.exists() { "✓" } else { "✗" };
                println!("  Global:  {} {}", exists, global.display());
            }
            None => println!("  Global:  (not available)"),
        }

        let project = Self::project_config_path(project_root);
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Print the effective configuration
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        if as_json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| DocError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    /// Write a commented default config into `<project>/.triadoc/config.toml`
    pub fn init_project(project_root: &Path, force: bool) -> Result<PathBuf> {
        let path = Self::project_config_path(project_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() && !force {
            info!("Project config exists: {}", path.display());
            return Ok(path);
        }

        fs::write(&path, Self::default_project_config())?;
        info!("Created project config: {}", path.display());
        Ok(path)
    }

    fn default_project_config() -> String {
        r#"# triadoc project configuration
# Environment variables override these, e.g. TRIADOC_LLM__MODEL=gpt-4o

version = "1.0"

[llm]
provider = "openai"
model = "gpt-4o-mini"
timeout_secs = 300

[pipeline]
# Abort before mining when the estimated cost is above this (USD)
max_cost_usd = 1.0
miner_concurrency = 3
miner_delay_ms = 1500

[collection]
max_files = 300
max_file_size_bytes = 100000

[output]
cache_dir = ".triadoc/cache"
docs_dir = ".triadoc/docs"
"#
        .to_string()
    }
}
