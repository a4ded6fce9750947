//! Documentation Pipeline
//!
//! Three phases over one project, each resumable from the phase cache:
//!
//! ```text
//! Miner ──facts──▶ Architect ──navigation──▶ Scribe ──pages──▶ docs
//! ```
//!
//! - **Miner**: one conversation per source file, submitted via `submit_facts`
//! - **Architect**: one conversation over a module summary, via `submit_navigation`
//! - **Scribe**: one conversation per page, via `submit_page`

pub mod architect;
pub mod context;
pub mod miner;
pub mod modules;
pub mod pipeline;
pub mod prompts;
pub mod scribe;

pub use architect::ArchitectPhase;
pub use context::PhaseContext;
pub use miner::{MinerPhase, MinerRun, MinerStats};
pub use modules::{ModuleMatch, PageKind, resolve_modules};
pub use pipeline::{PipelineOrchestrator, PipelineReport, RunStatus, project_id_for};
pub use scribe::{PageResult, PageStatus, ScribePhase};
