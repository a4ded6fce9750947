//! Global Constants
//!
//! Centralized defaults for collection, pricing and pacing.
//! Config values override most of these at runtime.

/// Source collection constants
pub mod collection {
    /// Files larger than this are skipped (100KB)
    pub const MAX_FILE_SIZE_BYTES: u64 = 100_000;

    /// Hard limit on number of files collected per project
    pub const MAX_FILES: usize = 300;

    /// Directories never descended into
    pub const SKIP_DIRS: &[&str] = &[
        "node_modules",
        ".git",
        "__pycache__",
        ".venv",
        "venv",
        "env",
        "dist",
        "build",
        ".next",
        ".nuxt",
        ".output",
        ".cache",
        ".turbo",
        "coverage",
        ".pytest_cache",
        ".mypy_cache",
        ".ruff_cache",
        ".idea",
        ".vscode",
        "tmp",
        "temp",
        "logs",
        "public",
        "assets",
        "static",
        "vendor",
        "target",
        ".gradle",
        ".cargo",
        "bin",
        "obj",
    ];

    /// Suffixes of files that are binary, generated, or not source code.
    /// Matched against the end of the file name, so `.min.js` works.
    pub const IGNORE_EXTENSIONS: &[&str] = &[
        // lockfiles and generated
        ".lock", ".map", ".log",
        // prose
        ".md", ".txt", ".rst", ".csv",
        // images
        ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".bmp", ".tiff",
        // fonts
        ".woff", ".woff2", ".ttf", ".eot", ".otf",
        // media
        ".mp4", ".mp3", ".wav", ".avi", ".mov", ".webm",
        // archives
        ".zip", ".tar", ".gz", ".bz2", ".7z", ".rar",
        // compiled
        ".pyc", ".pyo", ".class", ".o", ".obj", ".dll", ".exe", ".so", ".dylib", ".a", ".lib",
        ".jar", ".war", ".wasm",
        // documents
        ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
        // minified
        ".min.js", ".min.css",
        // databases
        ".db", ".sqlite", ".sqlite3",
        // environment
        ".env", ".env.local",
    ];

    /// File names skipped regardless of extension
    pub const IGNORE_FILENAMES: &[&str] = &[
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "poetry.lock",
        "Pipfile.lock",
        "composer.lock",
        "Cargo.lock",
        "Gemfile.lock",
        ".DS_Store",
        "Thumbs.db",
        ".gitattributes",
        ".editorconfig",
        ".prettierrc",
        ".eslintcache",
    ];
}

/// Cost constants (USD per million tokens)
pub mod pricing {
    use crate::ai::pricing::ModelRate;

    /// Default ceiling for the estimated Miner cost
    pub const DEFAULT_MAX_COST_USD: f64 = 1.00;

    /// Output tokens assumed per analysed file when estimating cost
    pub const ASSUMED_OUTPUT_TOKENS_PER_FILE: u64 = 500;

    /// (model prefix, input rate, output rate)
    pub const MODEL_RATES: &[(&str, f64, f64)] = &[
        ("gpt-4o", 2.50, 10.00),
        ("gpt-4o-mini", 0.15, 0.60),
        ("gpt-4-turbo", 10.00, 30.00),
        ("gpt-3.5-turbo", 0.50, 1.50),
        ("gemini-1.5-flash", 0.075, 0.30),
        ("gemini-1.5-flash-8b", 0.0375, 0.15),
        ("gemini-1.5-pro", 1.25, 5.00),
        ("gemini-2.0-flash", 0.10, 0.40),
        ("gemini-pro-latest", 0.50, 1.50),
    ];

    /// Rate assumed for models missing from the table
    pub const UNKNOWN_MODEL_RATE: ModelRate = ModelRate::new(2.50, 10.00);
}

/// Miner phase constants
pub mod miner {
    /// Maximum concurrent file analyses
    pub const CONCURRENCY: usize = 3;

    /// Minimum delay before each gate acquisition (milliseconds)
    pub const RATE_DELAY_MS: u64 = 1500;

    /// Per-file content budget
    pub const MAX_TOKENS_PER_FILE: usize = 3000;

    pub const MAX_ITERATIONS: usize = 3;
}

/// Architect and Scribe phase constants
pub mod writer {
    pub const ARCHITECT_MAX_ITERATIONS: usize = 2;

    pub const SCRIBE_MAX_ITERATIONS: usize = 2;

    /// Source material budget for one page
    pub const SCRIBE_MAX_INPUT_TOKENS: usize = 100_000;

    /// Maximum modules matched to a single page
    pub const MAX_MODULES_PER_PAGE: usize = 5;

    /// Keyword fragments shorter than this are ignored when matching modules
    pub const MIN_KEYWORD_LEN: usize = 3;
}

/// Retry constants for rate-limited units
pub mod retry {
    pub const MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 2000;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;
}

/// Token counting constants
pub mod tokens {
    /// Characters per token for providers without an exact tokenizer
    pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;
}

/// Agent loop constants
pub mod agent {
    /// Default iteration cap for `run_until_complete`
    pub const DEFAULT_MAX_ITERATIONS: usize = 5;

    /// Returned when the loop hits its cap without a final answer
    pub const MAX_ITERATIONS_SENTINEL: &str = "Max iterations reached without a final answer.";

    /// Capacity of the progress event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
}
