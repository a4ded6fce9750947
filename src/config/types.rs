//! Configuration Types
//!
//! All configuration structures with defaults. Every section is
//! `#[serde(default)]`, so a config file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::gate::RetryPolicy;
use crate::ai::pricing::ModelRate;
use crate::constants::{collection, miner, network, pricing, retry, writer};
use crate::types::{DocError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub collection: CollectionConfig,
    pub output: OutputConfig,
    /// Per-model rate overrides, keyed by exact model name
    pub pricing: HashMap<String, ModelRate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            collection: CollectionConfig::default(),
            output: OutputConfig::default(),
            pricing: HashMap::new(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(DocError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_cost_usd < 0.0 || !self.pipeline.max_cost_usd.is_finite() {
            return Err(DocError::Config(format!(
                "pipeline.max_cost_usd must be a non-negative number, got {}",
                self.pipeline.max_cost_usd
            )));
        }

        if self.pipeline.miner_concurrency == 0 {
            return Err(DocError::Config(
                "pipeline.miner_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.miner_max_tokens_per_file == 0 || self.pipeline.scribe_max_input_tokens == 0
        {
            return Err(DocError::Config(
                "pipeline token budgets must be greater than 0".to_string(),
            ));
        }

        if self.collection.max_files == 0 {
            return Err(DocError::Config(
                "collection.max_files must be greater than 0".to_string(),
            ));
        }

        for (model, rate) in &self.pricing {
            if rate.input_per_million < 0.0 || rate.output_per_million < 0.0 {
                return Err(DocError::Config(format!(
                    "pricing for '{}' must not be negative",
                    model
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai` or `ollama`
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    /// Never written back out; prefer the provider's environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// 0.0 keeps documentation consistent between runs
    pub temperature: f32,
    /// Maximum tokens to generate per reply
    pub max_tokens: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ceiling for the estimated Miner cost; above it no file is analysed
    pub max_cost_usd: f64,
    pub miner_concurrency: usize,
    /// Delay before each Miner gate acquisition
    pub miner_delay_ms: u64,
    pub miner_max_tokens_per_file: usize,
    pub scribe_max_input_tokens: usize,
    pub assumed_output_tokens_per_file: u64,
    pub miner_max_iterations: usize,
    pub architect_max_iterations: usize,
    pub scribe_max_iterations: usize,
    /// Retries for rate-limited units
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_cost_usd: pricing::DEFAULT_MAX_COST_USD,
            miner_concurrency: miner::CONCURRENCY,
            miner_delay_ms: miner::RATE_DELAY_MS,
            miner_max_tokens_per_file: miner::MAX_TOKENS_PER_FILE,
            scribe_max_input_tokens: writer::SCRIBE_MAX_INPUT_TOKENS,
            assumed_output_tokens_per_file: pricing::ASSUMED_OUTPUT_TOKENS_PER_FILE,
            miner_max_iterations: miner::MAX_ITERATIONS,
            architect_max_iterations: writer::ARCHITECT_MAX_ITERATIONS,
            scribe_max_iterations: writer::SCRIBE_MAX_ITERATIONS,
            max_retries: retry::MAX_RETRIES,
            retry_base_delay_ms: retry::BASE_DELAY_MS,
        }
    }
}

impl PipelineConfig {
    pub fn miner_delay(&self) -> Duration {
        Duration::from_millis(self.miner_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

// =============================================================================
// Collection Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub max_file_size_bytes: u64,
    pub max_files: usize,
    /// Honour `.gitignore` and other ignore files
    pub respect_gitignore: bool,
    pub skip_dirs: Vec<String>,
    pub ignore_extensions: Vec<String>,
    pub ignore_filenames: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            max_file_size_bytes: collection::MAX_FILE_SIZE_BYTES,
            max_files: collection::MAX_FILES,
            respect_gitignore: true,
            skip_dirs: owned(collection::SKIP_DIRS),
            ignore_extensions: owned(collection::IGNORE_EXTENSIONS),
            ignore_filenames: owned(collection::IGNORE_FILENAMES),
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of per-project phase artifacts
    pub cache_dir: PathBuf,
    /// Root of exported documentation (`<docs_dir>/<project>/sidebar.json`)
    pub docs_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".triadoc/cache"),
            docs_dir: PathBuf::from(".triadoc/docs"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
