//! Configuration Management
//!
//! Hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/triadoc/config.toml)
//! 3. Project config (.triadoc/config.toml)
//! 4. Environment variables (TRIADOC_*)
//! 5. CLI arguments (highest priority, applied by the command)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
