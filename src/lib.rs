//! Triadoc - Three-Phase Codebase Documentation Generator
//!
//! Turns a source tree into a navigable documentation site with a
//! tool-calling language model, in three resumable phases.
//!
//! ## Core Features
//!
//! - **Miner / Architect / Scribe**: facts per file, a navigation tree, then pages
//! - **Tool Calling with Salvage**: tool calls recovered from plain-text replies
//! - **Admission Control**: token counting and cost ceiling before any spend
//! - **Phase Cache**: every phase artifact persisted, reruns skip finished work
//!
//! ## Quick Start
//!
//! ```ignore
//! use triadoc::{Config, PipelineOrchestrator};
//! use triadoc::ai::{ProviderConfig, create_client};
//!
//! let config = Config::default();
//! let client = create_client(&ProviderConfig::from_llm_config(&config.llm)?)?;
//! let report = PipelineOrchestrator::new("my-project", config, client)
//!     .run(&project_path)
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: clients, executor, tool catalog, tokens and pricing
//! - [`analyzer`]: gitignore-aware source collection
//! - [`storage`]: per-phase JSON cache and docs export
//! - [`config`]: layered configuration
//! - [`wiki`]: the three phases and their orchestrator

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod events;
pub mod storage;
pub mod types;
pub mod wiki;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use events::{EventBus, PipelineEvent, Stage};
pub use types::error::{DocError, ErrorCategory, Result};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use storage::{Phase, PhaseCache};
pub use wiki::{PageStatus, PipelineOrchestrator, PipelineReport, RunStatus};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    AgentExecutor, ConcurrencyGate, LlmClient, SharedClient, Tool, ToolCatalog, TokenCounter,
};
