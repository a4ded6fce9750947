use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triadoc::cli::commands::{self, generate::GenerateOptions};

#[derive(Parser)]
#[command(name = "triadoc")]
#[command(
    version,
    about = "Three-phase documentation generator for codebases (Miner, Architect, Scribe)"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Show debug logs and agent thoughts")]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate documentation for a project
    Generate {
        #[arg(default_value = ".", help = "Project root")]
        path: PathBuf,
        #[arg(long, help = "Project id (default: directory name)")]
        project_id: Option<String>,
        #[arg(long, help = "LLM provider (openai, ollama)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Abort before mining above this estimated cost (USD)")]
        max_cost: Option<f64>,
        #[arg(long, help = "Files analysed in parallel")]
        concurrency: Option<usize>,
        #[arg(long, short, help = "Docs output directory")]
        output: Option<PathBuf>,
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },

    /// Show cached phase artifacts
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Clear cached phase artifacts
    Clean {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long, help = "Only this phase: miner, architect, scribe")]
        phase: Option<String>,
    },

    /// Manage configuration
    Config {
        #[arg(long, default_value = ".", help = "Project root")]
        path: PathBuf,
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a default project configuration
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mtriadoc encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "triadoc=debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            path,
            project_id,
            provider,
            model,
            max_cost,
            concurrency,
            output,
            json,
        } => {
            commands::generate::run(GenerateOptions {
                path,
                project_id,
                provider,
                model,
                max_cost,
                concurrency,
                output,
                json,
                verbose: cli.verbose,
            })?;
        }
        Commands::Status {
            path,
            project_id,
            format,
        } => {
            commands::status::run(&path, project_id, &format)?;
        }
        Commands::Clean {
            path,
            project_id,
            phase,
        } => {
            commands::clean::run(&path, project_id, phase.as_deref())?;
        }
        Commands::Config { path, action } => match action {
            ConfigAction::Show { format } => commands::config::show(&path, &format)?,
            ConfigAction::Path => commands::config::path(&path)?,
            ConfigAction::Init { force } => commands::config::init(&path, force)?,
        },
    }

    Ok(())
}
