//! Source Collection
//!
//! Walks a project tree (gitignore-aware) and yields the text files the
//! Miner analyses.

pub mod scanner;

pub use scanner::{FileScanner, SourceCollector, SourceFile};
