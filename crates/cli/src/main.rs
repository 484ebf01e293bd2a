//! Stepwright CLI — the main entry point.
//!
//! Commands:
//! - `run`        — Execute a JSON plan against a DOM snapshot
//! - `substitute` — Resolve `{{NAME}}` placeholders in text
//! - `cache`      — Inspect or clear the response cache
//! - `onboard`    — Write a default config
//! - `doctor`     — Diagnose configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod page;

#[derive(Parser)]
#[command(
    name = "stepwright",
    about = "Stepwright — natural-language browser test steps, resolved by an LLM",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan of steps against a DOM snapshot
    Run {
        /// JSON plan: [{"type", "params", "optional"?}]
        plan: PathBuf,

        /// File holding the DOM snapshot
        #[arg(long)]
        dom: PathBuf,

        /// PNG screenshot for discover and visual_check steps
        #[arg(long)]
        screenshot: Option<PathBuf>,

        /// Variable as NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,

        /// Write step results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bypass the response and action caches
        #[arg(long)]
        no_cache: bool,
    },

    /// Substitute variables into text
    Substitute {
        text: String,

        /// Variable as NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Initialize configuration
    Onboard,

    /// Diagnose configuration and connectivity
    Doctor,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show entry counts per partition
    Stats,

    /// Delete every cached entry
    Clear {
        /// Required to actually delete
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so step results on stdout stay machine-readable
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run {
            plan,
            dom,
            screenshot,
            vars,
            output,
            no_cache,
        } => {
            commands::run::run(commands::run::RunArgs {
                plan,
                dom,
                screenshot,
                variables: vars.into_iter().collect(),
                output,
                no_cache,
            })
            .await?
        }
        Commands::Substitute { text, vars } => {
            commands::substitute::run(&text, &vars.into_iter().collect())?
        }
        Commands::Cache { action } => match action {
            CacheCommands::Stats => commands::cache::stats().await?,
            CacheCommands::Clear { confirm } => commands::cache::clear(confirm).await?,
        },
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
