//! Phase Artifact Storage
//!
//! Per-project JSON artifacts that make every phase resumable, plus the
//! documentation export.

pub mod phase_cache;

pub use phase_cache::{CacheStatus, Phase, PhaseCache};
